//! Easel agent entry point.
//!
//! ```text
//! easel-agent                  Run in the foreground with the stdin console
//! easel-agent --config <path>  Load a custom config TOML
//! easel-agent --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use easel_agent::config::AgentConfig;
use easel_agent::console;
use easel_agent::tokens::TokenIssuer;
use easel_core::{Agent, AgentHandle, HttpBoard, ImageFileLoader, Report, WsConnector};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "easel-agent", about = "Keeps a target image painted on the shared canvas")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "easel-agent.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&AgentConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Init tracing before loading so config notices are visible.
    let level = std::fs::read_to_string(&cli.config)
        .ok()
        .and_then(|text| toml::from_str::<AgentConfig>(&text).ok())
        .map(|cfg| cfg.logging.level)
        .unwrap_or_else(|| "info".into());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AgentConfig::load(&cli.config);

    let connector = WsConnector::new(config.server.ws_url.clone());
    let board = HttpBoard::from_api_base(&config.server.api_base);

    info!("easel-agent v{}", env!("CARGO_PKG_VERSION"));
    info!("socket: {}", connector.url());
    info!("board: {}", board.url());
    info!("tokens: {}", config.storage.tokens_file.display());
    info!("images: {}", config.storage.images_dir.display());

    let (handle, agent) = Agent::spawn(
        Arc::new(connector),
        Arc::new(board),
        Arc::new(ImageFileLoader),
        config.to_options(),
    );

    tokio::spawn(log_reports(handle.clone()));

    // Ctrl-C handler.
    let ctrl_c = handle.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        let _ = ctrl_c.shutdown().await;
    });

    let issuer = TokenIssuer::new(config.token_url(), config.storage.tokens_file.clone());
    tokio::spawn(console::run(handle, issuer));

    agent.await?;
    Ok(())
}

/// Write every report as JSON under the `report` target.
async fn log_reports(handle: AgentHandle) {
    let mut reports = handle.subscribe_reports();
    loop {
        match reports.recv().await {
            Ok(report) => {
                let json = match serde_json::to_string(&report) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("report not serializable: {e}");
                        continue;
                    }
                };
                match report {
                    Report::Rates(_) => info!(target: "report", "{json}"),
                    Report::Progress { .. } => debug!(target: "report", "{json}"),
                }
            }
            Err(RecvError::Lagged(n)) => debug!("skipped {n} reports"),
            Err(RecvError::Closed) => break,
        }
    }
}
