mod backend;
mod queue_commands;
mod session_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "crispy", about = "CRISPy session and job queue tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Look for crispy.{toml,yaml,yml,json} only in this directory.
    #[arg(long, global = true, env = "CRISPY_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Session records.
    Session {
        #[command(subcommand)]
        action: session_commands::SessionAction,
    },
    /// Job queues.
    Queue {
        #[command(subcommand)]
        action: queue_commands::QueueAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file path in use (or the one `init` would write).
    Path,
    /// Write the current (or default) config as TOML.
    Init,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // Logs go to stderr so command output stays pipeable.
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(dir) = &cli.config_dir {
        crispy_config::set_config_dir(dir.clone());
    }
    let config = crispy_config::discover_and_load();
    debug!(version = env!("CARGO_PKG_VERSION"), ?config, "crispy starting");

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Path => {
                println!("{}", crispy_config::find_or_default_config_path().display());
                Ok(())
            },
            ConfigAction::Init => {
                let path = crispy_config::save_config(&config)?;
                info!(path = %path.display(), "wrote config");
                println!("{}", path.display());
                Ok(())
            },
        },
        Commands::Session { action } => {
            let store = backend::open_store(&config).await?;
            let sessions = backend::sessions(&config, store);
            session_commands::handle_session(&sessions, action).await
        },
        Commands::Queue { action } => {
            let store = backend::open_store(&config).await?;
            let sessions = backend::sessions(&config, store);
            queue_commands::handle_queue(&sessions, action).await
        },
    }
}
