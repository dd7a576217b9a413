//! Init command implementation
//!
//! Writes a starter `scholar.toml` and `.env.example` into a directory.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    Success,
    /// scholar.toml already exists and `--force` was not given
    AlreadyExists,
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    pub path: PathBuf,
    pub force: bool,
    /// ollama, openai, or both
    pub provider: String,
}

pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Scholar");

    let base_path = &config.path;
    let config_path = base_path.join("scholar.toml");
    if config_path.exists() && !config.force {
        output.warning("scholar.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    if !base_path.exists() {
        if let Err(e) = fs::create_dir_all(base_path) {
            output.error(&format!("Failed to create {}: {}", base_path.display(), e));
            return InitResult::Error(e.to_string());
        }
        output.created_dir(&base_path.display().to_string());
    }

    let toml_content = generate_scholar_toml(&config.provider);
    if let Err(e) = write_file(&config_path, &toml_content, config.force) {
        output.error(&format!("Failed to create scholar.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "scholar.toml");

    let env_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_path, &generate_env_example(), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    output.complete("Scholar initialized");
    output.header("Next Steps");
    if config.provider != "openai" {
        output.info("Start Ollama and pull the configured model:");
        output.command("ollama serve");
        output.command("ollama pull llama3.2");
    }
    if config.provider != "ollama" {
        output.info("Set your API key:");
        output.command("cp .env.example .env  # then edit OPENAI_API_KEY");
    }
    output.info("Ask a question:");
    output.command("scholar ask \"Compare transformer and RNN architectures\"");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

pub fn generate_scholar_toml(provider: &str) -> String {
    let providers = match provider {
        "openai" => OPENAI_PROVIDER.to_string(),
        "both" => format!("{}\n{}", OLLAMA_PROVIDER, OPENAI_PROVIDER),
        _ => OLLAMA_PROVIDER.to_string(),
    };
    let (model_provider, model_name) = if provider == "openai" {
        ("openai", "gpt-4o-mini")
    } else {
        ("ollama-local", "llama3.2")
    };

    format!(
        r#"# Scholar configuration
# Every section is optional.

{providers}
[models.default]
provider = "{model_provider}"
model = "{model_name}"
temperature = 0.7
max_tokens = 1024

# Deterministic classification and planning
[models.precise]
provider = "{model_provider}"
model = "{model_name}"
temperature = 0.0
max_tokens = 512

[pipeline]
default_model = "default"
router_model = "precise"
planner_model = "precise"
history_window = 10
prompt_history_window = 5
agent_timeout_secs = 30
max_plan_steps = 5
max_sources_in_prompt = 10
max_tracked_turns = 256
default_agent = "web_search"

[agents.web_search]
enabled = true
max_results = 5

[agents.academic_search]
enabled = true
max_results = 5
timeout_secs = 45

[store]
# JSON lines file; remove to keep conversations in memory only
path = "data/conversations.jsonl"

[logging]
level = "info"
json = false
"#
    )
}

const OLLAMA_PROVIDER: &str = r#"# Ollama - local inference (no API key required)
[providers.ollama-local]
type = "ollama"
base_url = "http://localhost:11434"
default_model = "llama3.2"
"#;

const OPENAI_PROVIDER: &str = r#"# OpenAI API (set OPENAI_API_KEY in .env)
[providers.openai]
type = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
default_model = "gpt-4o-mini"
"#;

fn generate_env_example() -> String {
    r#"# Scholar environment
# Copy to .env and fill in the values you need.

# Required when an openai provider is configured
OPENAI_API_KEY=

# Log filter, overrides [logging] level
# RUST_LOG=scholar=debug,info
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar::utils::toml_config::ScholarConfig;
    use tempfile::TempDir;

    fn init_config(dir: &TempDir, force: bool) -> InitConfig {
        InitConfig {
            path: dir.path().to_path_buf(),
            force,
            provider: "ollama".to_string(),
        }
    }

    #[test]
    fn test_generated_config_parses() {
        for provider in ["ollama", "openai", "both"] {
            let content = generate_scholar_toml(provider);
            let config = ScholarConfig::parse(&content).unwrap();
            assert_eq!(config.pipeline.router_model.as_deref(), Some("precise"));
            assert!(config.models.contains_key("default"));
        }
    }

    #[test]
    fn test_generated_ollama_config_validates() {
        let config = ScholarConfig::parse(&generate_scholar_toml("ollama")).unwrap();
        config.validate().unwrap();
        assert_eq!(
            config.store.path.as_deref(),
            Some("data/conversations.jsonl")
        );
    }

    #[test]
    fn test_init_writes_files() {
        let dir = TempDir::new().unwrap();
        let result = run(init_config(&dir, false), &Output::no_color());
        assert_eq!(result, InitResult::Success);
        assert!(dir.path().join("scholar.toml").exists());
        assert!(dir.path().join(".env.example").exists());
    }

    #[test]
    fn test_init_refuses_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("scholar.toml"), "# mine").unwrap();

        let result = run(init_config(&dir, false), &Output::no_color());
        assert_eq!(result, InitResult::AlreadyExists);
        assert_eq!(
            fs::read_to_string(dir.path().join("scholar.toml")).unwrap(),
            "# mine"
        );

        let result = run(init_config(&dir, true), &Output::no_color());
        assert_eq!(result, InitResult::Success);
        assert!(
            fs::read_to_string(dir.path().join("scholar.toml"))
                .unwrap()
                .contains("[pipeline]")
        );
    }
}
