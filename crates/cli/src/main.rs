//! CLI entrypoint and subcommand orchestration.

mod config;
mod daemon;
mod tasks;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use proto::{CallbackKind, Notification};

#[cfg(not(test))]
use std::sync::Arc;

#[cfg(not(test))]
use config::Config;
#[cfg(not(test))]
use gateway::{DispatchService, HttpServer};
#[cfg(not(test))]
use tokio::io::{AsyncBufReadExt, BufReader};
#[cfg(not(test))]
use tracing::{info, warn};
#[cfg(not(test))]
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level command-line arguments.
#[derive(Parser)]
#[command(name = "steward")]
#[command(about = "Human-in-the-loop agent task server", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Also write debug logs to ~/.steward/logs/
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dispatch API over HTTP until SIGINT/SIGTERM
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one task in-process, answering callbacks on stdin
    Run {
        /// Task kind (echo, browser, assistant)
        #[arg(short, long, default_value = "assistant")]
        kind: String,

        /// Instruction for the agent
        #[arg(short = 'e', long)]
        exec: String,
    },
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // Dropping the guard flushes buffered file writes, so it lives until main returns.
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>;
    let debug_writer = match Config::home_dir().filter(|_| cli.debug) {
        Some(home) => {
            let log_dir = home.join("logs");
            std::fs::create_dir_all(&log_dir).ok();
            let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            _file_guard = Some(guard);
            Some(writer)
        }
        None => {
            _file_guard = None;
            None
        }
    };

    match debug_writer {
        Some(writer) => {
            let console = fmt::layer().with_target(false).with_filter(console_filter);
            let file = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .with_filter(EnvFilter::new(
                    "debug,hyper_util=info,rustls=info,reqwest=info,chromiumoxide=info,tungstenite=info",
                ));
            tracing_subscriber::registry()
                .with(console)
                .with(file)
                .init();
        }
        None => {
            fmt()
                .with_env_filter(console_filter)
                .with_target(false)
                .init();
        }
    }

    if cli.debug {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            log_level = %cli.log_level,
            "========== steward start =========="
        );
    }

    let config = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Failed to load config ({e}), using defaults");
        Config::default()
    });

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(config, host, port).await,
        Commands::Run { kind, exec } => cmd_run(config, kind, exec).await,
    }
}

#[cfg(not(test))]
async fn cmd_serve(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let service = Arc::new(DispatchService::new(tasks::build_catalog(&config)));
    info!(kinds = ?service.catalog().kinds(), "Task catalog ready");

    let pid_file = daemon::PidFile::new(daemon::PidFile::default_path());
    if let Err(e) = pid_file.write().await {
        warn!("Could not write PID file: {e}");
    }

    let result = HttpServer::new(host, port)
        .run(service, daemon::wait_for_shutdown())
        .await;
    pid_file.remove().await;
    result?;
    Ok(())
}

#[cfg(not(test))]
async fn cmd_run(config: Config, kind: String, exec: String) -> anyhow::Result<()> {
    let service = DispatchService::new(tasks::build_catalog(&config));
    let session_id = service.start_task(&kind, &exec)?;
    println!("{}", format_run_header(&kind, &exec));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut last_message = String::new();
    loop {
        match service.fetch(&session_id).await? {
            Notification::Message { text } => {
                println!("{text}");
                last_message = text;
            }
            Notification::ActionRequired {
                kind,
                prompt,
                callback_id,
            } => {
                println!("{}", format_callback_prompt(kind, &prompt));
                let answer = stdin.next_line().await?.unwrap_or_default();
                service.submit_answer(&session_id, &callback_id, answer.trim())?;
            }
            Notification::Finished { result } => {
                if result != last_message {
                    println!("{result}");
                }
                return Ok(());
            }
            Notification::Failed { message } => {
                eprintln!("Error: {message}");
                std::process::exit(1);
            }
        }
    }
}

fn format_run_header(kind: &str, exec: &str) -> String {
    format!("[{kind}] {exec}")
}

/// Renders a callback for the terminal, with the reply hint per kind.
fn format_callback_prompt(kind: CallbackKind, prompt: &serde_json::Value) -> String {
    let text = match prompt {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match kind {
        CallbackKind::Message => format!("{text}\n(press Enter to continue)"),
        CallbackKind::InformationRequest => format!("? {text}\n> "),
        CallbackKind::ConfirmationRequest => format!("? {text} [y/N]"),
    }
}
