//! Autoattend session worker
//!
//! Runs one attendance session and exits. Started by the bot with the
//! stdin pipe attached; closing that pipe asks the worker to stop.

use anyhow::Context;
use autoattend_core::{
    init_logging, log_operation_error, log_operation_start, AppConfig, ChatId, Secret,
    SessionSpec,
};
use autoattend_session::{AttendanceLoop, TelegramNotifier, WebDriverBrowser};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::info;

#[derive(Parser)]
#[command(name = "autoattend-session")]
#[command(about = "Log into the attendance portal and check in until the duration elapses")]
#[command(version)]
struct Args {
    /// Portal login
    username: String,

    /// Portal password
    secret: String,

    /// Session length in minutes
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    duration_minutes: u32,

    /// Chat id or @channel that receives progress messages
    notify_target: String,

    /// Bot API token used for notifications
    api_token: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop when stdin reaches end of file
    #[arg(long)]
    watch_stdin: bool,
}

#[tokio::main]
async fn main() {
    let code = match run(Args::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("autoattend-session: {:#}", e);
            1
        }
    };

    // A pending stdin read would otherwise hold up runtime shutdown
    std::process::exit(code);
}

async fn run(args: Args) -> anyhow::Result<i32> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    config.validate().context("validating configuration")?;

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let notify_target: ChatId = args
        .notify_target
        .parse()
        .context("parsing notify target")?;

    let session = SessionSpec {
        identity: notify_target.as_identity().unwrap_or_default(),
        username: args.username,
        secret: Secret::new(args.secret),
        duration_minutes: args.duration_minutes,
        notify_target,
    };

    let notifier = Arc::new(
        TelegramNotifier::new(&config.telegram, &args.api_token)
            .context("creating notifier")?,
    );
    let attendance = AttendanceLoop::from_config(&config, notifier);

    log_operation_start!(
        "session",
        identity = session.identity,
        duration_minutes = session.duration_minutes
    );

    let report = attendance
        .run(
            &session,
            WebDriverBrowser::connect(&config.browser),
            shutdown_signal(args.watch_stdin),
        )
        .await;

    match &report.failure {
        Some(failure) => {
            log_operation_error!("session", failure, cycles = report.cycles);
            Ok(1)
        }
        None => {
            info!(
                cycles = report.cycles,
                clicked = report.clicked,
                cancelled = report.cancelled,
                "Session worker exiting"
            );
            Ok(0)
        }
    }
}

/// Resolves on ctrl-c, or on stdin EOF when `watch_stdin` is set
async fn shutdown_signal(watch_stdin: bool) {
    let stdin_closed = async {
        if !watch_stdin {
            return std::future::pending::<()>().await;
        }

        let mut stdin = tokio::io::stdin();
        let mut buffer = [0u8; 64];
        loop {
            match stdin.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    };

    tokio::select! {
        _ = stdin_closed => info!("Control pipe closed"),
        _ = tokio::signal::ctrl_c() => info!("Interrupt received"),
    }
}
