use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tandem::config::{TandemSettings, load_settings};
use tandem::server::{FsContentSource, NoopEngine, serve_stream};
use tokio::io::{stdin, stdout};
use tokio_util::sync::CancellationToken;

/// Working copy server: mirrors editor buffers and reconciles them
#[derive(Parser)]
#[command(name = "tandem")]
#[command(version)]
#[command(about = "Working copy server: mirrors editor buffers and reconciles them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve one client over stdio (Content-Length framed JSON-RPC notifications)
    Serve {
        /// Workspace root that file paths are resolved against
        #[arg(long)]
        root: Option<PathBuf>,

        /// Endpoint id of the connected client
        #[arg(long, default_value = "client")]
        peer: String,
    },
    /// Print the effective settings as TOML
    Config {
        /// Workspace root holding tandem.toml
        #[arg(long)]
        root: Option<PathBuf>,

        /// Override quietPeriodMs on top of the config files
        #[arg(long)]
        quiet_period_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    // stdout carries protocol frames; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { root, peer } => {
            let outcome = load_settings(root.as_deref(), None);
            for event in &outcome.events {
                event.log();
            }

            let workspace_root = root
                .or(outcome.settings.workspace_root.clone())
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| {
                    eprintln!("Error: Could not determine workspace root. Please specify --root.");
                    std::process::exit(1);
                });

            log::info!(target: "tandem::service", "Workspace root {}", workspace_root.display());

            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    shutdown.cancel();
                }
            });

            serve_stream(
                stdin(),
                stdout(),
                &peer,
                Arc::new(FsContentSource::new(workspace_root)),
                Arc::new(NoopEngine),
                cancel,
            )
            .await;
        }
        Commands::Config { root, quiet_period_ms } => {
            let overrides = TandemSettings {
                quiet_period_ms,
                ..TandemSettings::default()
            };
            let outcome = load_settings(root.as_deref(), Some(overrides));
            for event in &outcome.events {
                event.log();
            }
            match toml::to_string(&outcome.settings) {
                Ok(text) => print!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
