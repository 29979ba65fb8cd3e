mod commands;

use clap::{Parser, Subcommand};
use flotilla_client::ClientConfig;
use tracing_appender::{non_blocking::WorkerGuard, rolling};

#[derive(Parser)]
#[command(name = "flotilla")]
#[command(about = "Operator console for a fleet of per-branch CI/CD environments")]
#[command(version)]
struct Cli {
    /// Backend base URL, e.g. https://ci.example.com/cicd
    #[arg(short, long)]
    url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive console (the default)
    Console {
        /// Include archived instances in the fleet view
        #[arg(short, long)]
        archived: bool,
    },
    /// Print the fleet summary and exit
    Sites {
        /// Include archived instances
        #[arg(short, long)]
        archived: bool,
        /// Only show the instance with this name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List available database dumps and exit
    Dumps,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging();

    let cli = Cli::parse();
    let config = ClientConfig::new(cli.url);

    match cli.command.unwrap_or(Commands::Console { archived: false }) {
        Commands::Console { archived } => {
            commands::console(config, archived).await?;
        }
        Commands::Sites { archived, name } => {
            commands::sites(&config, name.as_deref(), archived).await?;
        }
        Commands::Dumps => {
            commands::dumps(&config).await?;
        }
    }

    Ok(())
}

fn flotilla_log_dir() -> anyhow::Result<std::path::PathBuf> {
    let state_dir = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .ok_or_else(|| anyhow::anyhow!("state directory not found"))?;
    Ok(state_dir.join("flotilla").join("logs"))
}

/// File logging keeps the terminal clean for the TUI; stderr is only a
/// fallback when no writable state directory exists.
fn init_logging() -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if let Ok(log_dir) = flotilla_log_dir()
        && std::fs::create_dir_all(&log_dir).is_ok()
    {
        let log_path = log_dir.join("flotilla.log");
        if std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .is_ok()
        {
            let file_appender = rolling::never(&log_dir, "flotilla.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(non_blocking)
                .init();
            return Some(guard);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();
    None
}
