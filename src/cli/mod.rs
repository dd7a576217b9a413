//! CLI module for Scholar
//!
//! Provides command-line interface parsing and handling for the scholar binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod commands;
pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG: &str = "scholar.toml";

/// Scholar - a multi-agent research assistant
///
/// Routes each question to a quick conversational reply or a research run
/// across web and academic search, then writes a cited answer.
#[derive(Parser, Debug)]
#[command(
    name = "scholar",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Scholar - a multi-agent research assistant",
    long_about = "Answers research questions by planning searches across web and academic\n\
                  agents, running them concurrently and synthesizing a cited answer.",
    after_help = "EXAMPLES:\n    \
                  scholar init                                  # Write a starter scholar.toml\n    \
                  scholar ask \"What is beam search?\"            # One question\n    \
                  scholar ask --status \"Compare BERT and GPT\"   # Also print each pipeline step\n    \
                  scholar chat                                  # Interactive session\n    \
                  scholar history                               # List stored conversations\n    \
                  scholar --config my.toml agents               # List agents from a custom config"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG, global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter scholar.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure (ollama, openai, or both)
        #[arg(long, default_value = "ollama")]
        provider: String,
    },

    /// Ask one question
    Ask {
        /// The question; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Print the processing status after the answer
        #[arg(short, long)]
        status: bool,
    },

    /// Interactive session on one conversation
    Chat {
        /// Resume an existing conversation
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Show configuration information
    Config {
        /// Show the full configuration as TOML
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// List registered research agents
    Agents,

    /// Browse or delete stored conversations
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Suggest follow-up topics for a conversation
    Recommend {
        /// Conversation to recommend for
        conversation: String,
    },
}

/// `scholar history` actions; `list` when omitted
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum HistoryAction {
    /// List conversations, most recent first
    List,
    /// Print every turn of a conversation
    Show {
        /// Conversation id
        id: String,
    },
    /// Delete a conversation and its turns
    Delete {
        /// Conversation id
        id: String,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_joins_words() {
        let cli = Cli::try_parse_from(["scholar", "ask", "what", "is", "attention?", "--status"]).unwrap();
        match cli.command {
            Commands::Ask {
                message, status, ..
            } => {
                assert_eq!(message.join(" "), "what is attention?");
                assert!(status);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["scholar", "agents", "--config", "other.toml", "--no-color"]).unwrap();
        assert!(matches!(cli.command, Commands::Agents));
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert!(cli.no_color);
    }

    #[test]
    fn test_ask_requires_message() {
        assert!(Cli::try_parse_from(["scholar", "ask"]).is_err());
    }

    #[test]
    fn test_history_defaults_to_list() {
        let cli = Cli::try_parse_from(["scholar", "history"]).unwrap();
        assert!(matches!(cli.command, Commands::History { action: None }));

        let cli = Cli::try_parse_from(["scholar", "history", "delete", "conv-1"]).unwrap();
        match cli.command {
            Commands::History { action } => {
                assert_eq!(action, Some(HistoryAction::Delete { id: "conv-1".to_string() }));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["scholar", "history", "show"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
