//! Command handlers for `ask`, `chat`, `history`, `recommend`, `config` and `agents`.

use super::DEFAULT_CONFIG;
use super::HistoryAction;
use super::output::Output;
use anyhow::{Context, Result, bail};
use scholar::agents::AgentRegistry;
use scholar::db::{ConversationStore, StoreProvider};
use scholar::research::{ResearchCoordinator, StatusHandle, StepName, TurnResponse};
use scholar::types::{AppError, Turn};
use scholar::utils::toml_config::{PipelinePhase, ProviderConfig, ScholarConfig, ScholarConfigManager};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Turns printed by `history show`.
const SHOW_TURNS: usize = 1000;

/// Load `path`, or built-in defaults when the default file is absent.
pub fn load_config(path: &Path, output: &Output) -> Result<ScholarConfigManager> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        output.info("No scholar.toml found, using built-in defaults (run `scholar init` to create one)");
        return Ok(ScholarConfigManager::from_config(ScholarConfig::default()));
    }
    ScholarConfigManager::new(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

pub async fn open_store(config: &ScholarConfig) -> Result<Arc<dyn ConversationStore>> {
    let provider = StoreProvider::from_path(config.store.path.as_deref());
    provider
        .create_store()
        .await
        .context("Failed to open conversation store")
}

pub async fn build_coordinator(
    config: &ScholarConfig,
    store: Arc<dyn ConversationStore>,
) -> Result<ResearchCoordinator> {
    ResearchCoordinator::from_config(config, store)
        .await
        .context("Failed to set up the research pipeline")
}

/// Store the user's message, run the turn and print progress while it runs.
pub async fn run_turn(
    coordinator: &ResearchCoordinator,
    store: &dyn ConversationStore,
    message: &str,
    conversation_id: &str,
    output: &Output,
) -> Result<(TurnResponse, StatusHandle)> {
    store
        .append_turn(conversation_id, Turn::user(conversation_id, message))
        .await
        .context("Failed to store message")?;

    let handle = coordinator.register_turn();
    let turn = coordinator.process_tracked(handle, message, Some(conversation_id.to_string()));
    tokio::pin!(turn);

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut last_seen: Option<(usize, Option<StepName>)> = None;
    let result = loop {
        tokio::select! {
            result = &mut turn => break result,
            _ = ticker.tick() => {
                if let Some(status) = coordinator.get_status(handle) {
                    let key = (status.steps_completed.len(), status.current_step);
                    if last_seen != Some(key) && status.current_step.is_some() {
                        output.progress(&status);
                    }
                    last_seen = Some(key);
                }
            }
        }
    };

    match result {
        Ok(response) => Ok((response, handle)),
        Err(e) => {
            if let Some(status) = coordinator.get_status(handle) {
                output.status(&status);
            }
            Err(e).context("The turn failed")
        }
    }
}

fn print_response(response: &TurnResponse, output: &Output) {
    output.answer(&response.answer);
    output.sources(&response.sources);
    output.recommendations(&response.recommendations);
}

pub async fn ask(
    manager: &ScholarConfigManager,
    message: &str,
    conversation: Option<String>,
    show_status: bool,
    output: &Output,
) -> Result<()> {
    let config = manager.config();
    let store = open_store(&config).await?;
    let coordinator = build_coordinator(&config, store.clone()).await?;
    let conversation_id = conversation.unwrap_or_else(|| Uuid::new_v4().to_string());

    let (response, handle) =
        run_turn(&coordinator, store.as_ref(), message, &conversation_id, output).await?;
    print_response(&response, output);

    if show_status {
        if let Some(status) = coordinator.get_status(handle) {
            output.status(&status);
        }
    }
    output.hint(&format!("conversation: {}", response.conversation_id));
    Ok(())
}

pub async fn chat(
    manager: &ScholarConfigManager,
    conversation: Option<String>,
    output: &Output,
) -> Result<()> {
    let store = open_store(&manager.config()).await?;
    let mut coordinator = build_coordinator(&manager.config(), store.clone()).await?;
    let conversation_id = conversation.unwrap_or_else(|| Uuid::new_v4().to_string());

    output.banner();
    output.kv("conversation", &conversation_id);
    output.hint("Type /status for the last turn's steps, /reload to re-read the config, /exit to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_handle: Option<StatusHandle> = None;

    loop {
        output.prompt();
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let message = line.trim();

        match message {
            "" => continue,
            "/exit" | "/quit" | "exit" | "quit" => break,
            "/status" => {
                match last_handle.and_then(|handle| coordinator.get_status(handle)) {
                    Some(status) => output.status(&status),
                    None => output.info("No turn yet"),
                }
                continue;
            }
            "/reload" => {
                match manager.reload() {
                    Ok(()) => match build_coordinator(&manager.config(), store.clone()).await {
                        Ok(rebuilt) => {
                            coordinator = rebuilt;
                            output.success("Configuration reloaded");
                        }
                        Err(e) => output.error(&format!("{:#}", e)),
                    },
                    Err(e) => output.error(&format!("Reload failed, keeping current config: {}", e)),
                }
                continue;
            }
            _ => {}
        }

        match run_turn(&coordinator, store.as_ref(), message, &conversation_id, output).await {
            Ok((response, handle)) => {
                last_handle = Some(handle);
                print_response(&response, output);
            }
            Err(e) => output.error(&format!("{:#}", e)),
        }
    }

    output.hint(&format!("Resume with: scholar chat --conversation {}", conversation_id));
    Ok(())
}

pub async fn history(
    manager: &ScholarConfigManager,
    action: Option<HistoryAction>,
    output: &Output,
) -> Result<()> {
    let config = manager.config();
    if config.store.path.is_none() {
        output.warning("No [store] path configured, history only lives for one run");
    }
    let store = open_store(&config).await?;

    match action.unwrap_or(HistoryAction::List) {
        HistoryAction::List => {
            let conversations = store
                .list_conversations()
                .await
                .context("Failed to list conversations")?;
            output.header("Conversations");
            if conversations.is_empty() {
                output.info("No stored conversations");
                return Ok(());
            }
            output.table_header(&["Id", "Turns", "Updated", "Title"]);
            for conversation in conversations {
                output.table_row(&[
                    conversation.id.as_str(),
                    &conversation.turn_count.to_string(),
                    &conversation.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                    conversation.title.as_deref().unwrap_or("-"),
                ]);
            }
        }
        HistoryAction::Show { id } => {
            let turns = store
                .load_recent_turns(&id, SHOW_TURNS)
                .await
                .context("Failed to load conversation")?;
            if turns.is_empty() {
                bail!("conversation {} not found", id);
            }
            output.header(&format!("Conversation {}", id));
            for turn in &turns {
                output.turn(turn);
            }
        }
        HistoryAction::Delete { id } => {
            let deleted = store
                .delete_conversation(&id)
                .await
                .context("Failed to delete conversation")?;
            if !deleted {
                bail!("conversation {} not found", id);
            }
            output.success(&format!("Deleted conversation {}", id));
        }
    }
    Ok(())
}

pub async fn recommend(
    manager: &ScholarConfigManager,
    conversation: &str,
    output: &Output,
) -> Result<()> {
    let config = manager.config();
    let store = open_store(&config).await?;
    let coordinator = build_coordinator(&config, store).await?;

    match coordinator.recommendations_for(conversation).await {
        Ok(recommendations) => {
            output.recommendations(&recommendations);
            Ok(())
        }
        Err(AppError::NotFound(_)) => bail!("conversation {} not found", conversation),
        Err(e) => Err(e).context("Failed to get recommendations"),
    }
}

pub fn show_config(
    manager: &ScholarConfigManager,
    full: bool,
    validate: bool,
    output: &Output,
) -> Result<()> {
    let config = manager.config();

    if validate {
        match config.validate() {
            Ok(()) => output.success("Configuration is valid"),
            Err(e) => {
                output.error(&e.to_string());
                bail!("invalid configuration");
            }
        }
    }

    if full {
        let rendered = toml::to_string_pretty(&*config)
            .context("Failed to render configuration")?;
        println!("{}", rendered);
        return Ok(());
    }

    output.header("Configuration");
    output.kv(
        "file",
        &manager
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built-in defaults)".to_string()),
    );

    output.subheader("Providers");
    let mut providers: Vec<_> = config.providers.iter().collect();
    providers.sort_by_key(|(name, _)| name.as_str());
    for (name, provider) in providers {
        let line = match provider {
            ProviderConfig::Ollama { base_url, .. } => format!("{} (ollama at {})", name, base_url),
            ProviderConfig::OpenAI { api_base, .. } => format!("{} (openai at {})", name, api_base),
        };
        output.list_item(&line);
    }

    output.subheader("Pipeline models");
    for phase in PipelinePhase::ALL {
        output.kv(phase.config_key(), config.pipeline.model_for(phase));
    }

    output.subheader("Limits");
    let pipeline = &config.pipeline;
    output.kv("history_window", &pipeline.history_window.to_string());
    output.kv("agent_timeout_secs", &pipeline.agent_timeout_secs.to_string());
    output.kv("max_plan_steps", &pipeline.max_plan_steps.to_string());
    output.kv("default_agent", &pipeline.default_agent);
    output.kv(
        "store",
        config.store.path.as_deref().unwrap_or("(in memory)"),
    );
    Ok(())
}

pub fn list_agents(config: &ScholarConfig, output: &Output) {
    let registry = AgentRegistry::from_config(config);
    output.header("Agents");
    if registry.is_empty() {
        output.warning("No agents are enabled");
        return;
    }

    output.table_header(&["Agent", "Aliases", "Description"]);
    for (id, description) in registry.descriptors() {
        let aliases = registry
            .get(&id)
            .map(|agent| agent.aliases().join(", "))
            .unwrap_or_default();
        output.table_row(&[id.as_str(), &aliases, &description]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let manager = load_config(Path::new(DEFAULT_CONFIG), &Output::no_color());
        // The working directory of the test run may hold a real scholar.toml.
        if !Path::new(DEFAULT_CONFIG).exists() {
            assert!(manager.unwrap().path().is_none());
        }
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(load_config(&path, &Output::no_color()).is_err());
    }

    #[tokio::test]
    async fn test_open_store_in_memory_by_default() {
        let store = open_store(&ScholarConfig::default()).await.unwrap();
        assert!(store.load_recent_turns("c", 5).await.unwrap().is_empty());
    }

    #[test]
    fn test_show_config_validates() {
        let manager = ScholarConfigManager::from_config(ScholarConfig::default());
        show_config(&manager, false, true, &Output::no_color()).unwrap();
        show_config(&manager, true, false, &Output::no_color()).unwrap();
    }

    #[tokio::test]
    async fn test_history_on_file_store() {
        let dir = TempDir::new().unwrap();
        let mut config = ScholarConfig::default();
        config.store.path = Some(dir.path().join("turns.jsonl").display().to_string());
        let manager = ScholarConfigManager::from_config(config);
        let output = Output::no_color();

        let store = open_store(&manager.config()).await.unwrap();
        store.append_turn("c1", Turn::user("c1", "what is attention?")).await.unwrap();
        drop(store);

        history(&manager, None, &output).await.unwrap();
        history(&manager, Some(HistoryAction::Show { id: "c1".to_string() }), &output)
            .await
            .unwrap();
        history(&manager, Some(HistoryAction::Delete { id: "c1".to_string() }), &output)
            .await
            .unwrap();
        assert!(
            history(&manager, Some(HistoryAction::Show { id: "c1".to_string() }), &output)
                .await
                .is_err()
        );
    }
}
