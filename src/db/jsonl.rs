//! Append-only JSON lines conversation store
//!
//! Each line is one serialized [`Turn`]. The file is replayed into memory on
//! open; appends go to both. Deleting a conversation rewrites the file.

use crate::db::memory::InMemoryStore;
use crate::db::traits::ConversationStore;
use crate::types::{AppError, ConversationSummary, Result, Turn, TurnId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct JsonlStore {
    path: PathBuf,
    cache: InMemoryStore,
    writer: Mutex<Writer>,
}

#[derive(Default)]
struct Writer {
    file: Option<File>,
    /// The file ends in a torn line; start the next write on a fresh one.
    needs_newline: bool,
}

impl JsonlStore {
    /// Open (or lazily create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = InMemoryStore::new();
        let mut writer = Writer::default();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let mut loaded = 0usize;
                for (line_no, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Turn>(line) {
                        Ok(turn) => {
                            let conversation_id = turn.conversation_id.clone();
                            cache.append_turn(&conversation_id, turn).await?;
                            loaded += 1;
                        }
                        Err(e) => warn!(
                            "Skipping unreadable line {} in {:?}: {}",
                            line_no + 1,
                            path,
                            e
                        ),
                    }
                }
                writer.needs_newline = !content.is_empty() && !content.ends_with('\n');
                debug!("Loaded {} turns from {:?}", loaded, path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AppError::Database(format!(
                    "Failed to read {:?}: {}",
                    path, e
                )));
            }
        }

        Ok(Self {
            path,
            cache,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_for_append(&self) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Database(format!("Failed to create {:?}: {}", parent, e)))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open {:?}: {}", self.path, e)))
    }

    /// Replace the file with the cached turns.
    async fn rewrite(&self) -> Result<()> {
        let mut content = String::new();
        for turn in self.cache.all_turns() {
            let line = serde_json::to_string(&turn)
                .map_err(|e| AppError::Database(format!("Failed to encode turn: {}", e)))?;
            content.push_str(&line);
            content.push('\n');
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| AppError::Database(format!("Failed to write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| AppError::Database(format!("Failed to replace {:?}: {}", self.path, e)))
    }
}

/// Write one line, cutting the file back to `start` if the write fails.
async fn write_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    let start = file.metadata().await?.len();
    let written = async {
        file.write_all(line).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        if let Err(rollback) = file.set_len(start).await {
            warn!("Failed to roll back partial write: {}", rollback);
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl ConversationStore for JsonlStore {
    async fn load_recent_turns(&self, conversation_id: &str, limit: usize) -> Result<Vec<Turn>> {
        self.cache.load_recent_turns(conversation_id, limit).await
    }

    async fn append_turn(&self, conversation_id: &str, mut turn: Turn) -> Result<TurnId> {
        turn.conversation_id = conversation_id.to_string();
        let mut line = serde_json::to_string(&turn)
            .map_err(|e| AppError::Database(format!("Failed to encode turn: {}", e)))?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        let mut file = match writer.file.take() {
            Some(file) => file,
            None => self.open_for_append().await?,
        };
        if writer.needs_newline {
            line.insert(0, '\n');
        }

        if let Err(e) = write_line(&mut file, line.as_bytes()).await {
            // Reopen on the next append; the handle's position is unknown.
            writer.needs_newline = true;
            return Err(AppError::Database(format!("Failed to write turn: {}", e)));
        }
        writer.file = Some(file);
        writer.needs_newline = false;

        self.cache.append_turn(conversation_id, turn).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.cache.list_conversations().await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        let mut writer = self.writer.lock().await;
        if !self.cache.delete_conversation(conversation_id).await? {
            return Ok(false);
        }

        writer.file = None;
        self.rewrite().await?;
        writer.needs_newline = false;
        debug!("Deleted conversation {} from {:?}", conversation_id, self.path);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_turns_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("turns.jsonl");

        {
            let store = JsonlStore::open(&path).await.unwrap();
            store.append_turn("c1", Turn::user("c1", "what is attention?")).await.unwrap();
            store
                .append_turn("c1", Turn::assistant("c1", "A weighting mechanism."))
                .await
                .unwrap();
        }

        let reopened = JsonlStore::open(&path).await.unwrap();
        let turns = reopened.load_recent_turns("c1", 10).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, "A weighting mechanism.");
    }

    #[tokio::test]
    async fn test_corrupt_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("turns.jsonl");
        let good = serde_json::to_string(&Turn::user("c", "ok")).unwrap();
        tokio::fs::write(&path, format!("{{not json\n{}\n\n", good))
            .await
            .unwrap();

        let store = JsonlStore::open(&path).await.unwrap();
        assert_eq!(store.load_recent_turns("c", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = JsonlStore::open(dir.path().join("absent.jsonl")).await.unwrap();
        assert!(!store.conversation_exists("c").await.unwrap());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_append_after_torn_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("turns.jsonl");
        let good = serde_json::to_string(&Turn::user("c", "before")).unwrap();
        tokio::fs::write(&path, format!("{}\n{{\"id\": \"torn", good))
            .await
            .unwrap();

        let store = JsonlStore::open(&path).await.unwrap();
        store.append_turn("c", Turn::assistant("c", "after")).await.unwrap();

        let reopened = JsonlStore::open(&path).await.unwrap();
        let turns = reopened.load_recent_turns("c", 10).await.unwrap();
        assert_eq!(
            turns.iter().map(|t| t.content.as_str()).collect::<Vec<_>>(),
            vec!["before", "after"]
        );
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("turns.jsonl");
        tokio::fs::write(&path, "kept\n").await.unwrap();

        // A read-only handle fails every write.
        let mut file = OpenOptions::new().read(true).open(&path).await.unwrap();
        assert!(write_line(&mut file, b"lost\n").await.is_err());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "kept\n");
    }

    #[tokio::test]
    async fn test_delete_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("turns.jsonl");

        let store = JsonlStore::open(&path).await.unwrap();
        store.append_turn("keep", Turn::user("keep", "stay")).await.unwrap();
        store.append_turn("drop", Turn::user("drop", "go")).await.unwrap();
        assert!(store.delete_conversation("drop").await.unwrap());
        assert!(!store.delete_conversation("drop").await.unwrap());
        store.append_turn("keep", Turn::assistant("keep", "still here")).await.unwrap();

        let reopened = JsonlStore::open(&path).await.unwrap();
        let listed = reopened.list_conversations().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "keep");
        assert_eq!(listed[0].turn_count, 2);
    }
}
