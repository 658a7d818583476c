//! Autoattend Bot - Telegram front end for automatic attendance check-in
//!
//! Runs the long-polling bot, or writes and validates its configuration.

use anyhow::Context;
use autoattend_bot::{Controller, Dispatcher, ProcessLauncher, TelegramClient};
use autoattend_core::{init_logging, log_operation_error, AppConfig};
use autoattend_session::TelegramNotifier;
use autoattend_store::Database;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "autoattend-bot")]
#[command(about = "Telegram bot that checks users in on the attendance portal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (default)
    Run,

    /// Write the default configuration as TOML
    InitConfig {
        /// Output file
        #[arg(short, long, default_value = "autoattend.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(cli.config, cli.verbose).await,
        Commands::InitConfig { output, force } => init_config(&output, force).await,
        Commands::CheckConfig => check_config(cli.config.as_deref()),
    }
}

/// The explicit `--config`, else the first default location that exists
fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }

    [
        Some(PathBuf::from("autoattend.toml")),
        dirs::config_dir().map(|d| d.join("autoattend").join("config.toml")),
    ]
    .into_iter()
    .flatten()
    .find(|path| path.exists())
}

fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<(AppConfig, Option<PathBuf>)> {
    let path = resolve_config_path(explicit);
    let config = AppConfig::load(path.as_deref()).context("loading configuration")?;
    Ok((config, path))
}

async fn run(config_path: Option<PathBuf>, verbose: bool) -> anyhow::Result<()> {
    let (mut config, config_path) = load_config(config_path)?;
    if verbose {
        config.logging.level = "debug".to_string();
    }

    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting autoattend-bot v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!(path = %path.display(), "Loaded configuration"),
        None => info!("No configuration file found, using defaults and environment"),
    }

    if let Err(e) = config.validate_for_bot() {
        log_operation_error!("validate_config", e);
        return Err(e.into());
    }

    let database = Database::connect(&config.storage.database_url)
        .await
        .context("opening database")?;

    let notifier = Arc::new(
        TelegramNotifier::new(&config.telegram, &config.telegram.api_token)
            .context("creating notifier")?,
    );
    let launcher = ProcessLauncher::from_config(&config, config_path);
    info!(worker = %launcher.program().display(), "Session workers will be launched from here");

    let controller = Controller::new(&config, &database, launcher, notifier);
    let client = TelegramClient::new(&config.telegram).context("creating Bot API client")?;

    let mut dispatcher = Dispatcher::new(client, controller);
    dispatcher
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;

    database.close().await;
    info!("Bot stopped");
    Ok(())
}

async fn init_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite",
            output.display()
        );
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let contents = AppConfig::default().to_toml()?;
    tokio::fs::write(output, contents)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    println!("Configuration written to {}", output.display());
    println!("Set telegram.api_token and access.operator_id before running the bot.");
    Ok(())
}

fn check_config(explicit: Option<&Path>) -> anyhow::Result<()> {
    let (config, path) = load_config(explicit.map(Path::to_path_buf))?;
    match &path {
        Some(path) => println!("Loaded {}", path.display()),
        None => println!("No configuration file found, checking defaults and environment"),
    }

    config.validate_for_bot()?;
    println!("Configuration is valid");
    Ok(())
}
