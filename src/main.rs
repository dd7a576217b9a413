mod cli;

use anyhow::Result;
use cli::commands;
use cli::init::{self, InitConfig, InitResult};
use cli::output::Output;
use cli::{Cli, Commands};
use scholar::utils::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Commands::Init {
        path,
        force,
        provider,
    } = &cli.command
    {
        let result = init::run(
            InitConfig {
                path: path.clone(),
                force: *force,
                provider: provider.clone(),
            },
            &output,
        );
        return match result {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => Err(anyhow::anyhow!(e)),
        };
    }

    let manager = commands::load_config(&cli.config, &output)?;
    init_tracing(&manager.config().logging, cli.verbose)?;
    tracing::debug!(config = ?manager.path(), "configuration loaded");

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Ask {
            message,
            conversation,
            status,
        } => commands::ask(&manager, &message.join(" "), conversation, status, &output).await,
        Commands::Chat { conversation } => commands::chat(&manager, conversation, &output).await,
        Commands::Config { full, validate } => {
            commands::show_config(&manager, full, validate, &output)
        }
        Commands::History { action } => commands::history(&manager, action, &output).await,
        Commands::Recommend { conversation } => {
            commands::recommend(&manager, &conversation, &output).await
        }
        Commands::Agents => {
            commands::list_agents(&manager.config(), &output);
            Ok(())
        }
    }
}
