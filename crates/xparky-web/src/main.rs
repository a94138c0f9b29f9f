//! XParky - points dashboard for the cadet program.
//!
//! Reads achievements from Google Drive and Sheets and serves a ranked
//! leaderboard over HTTP.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use xparky_core::auth::ServiceAccountKey;
use xparky_core::cache::CacheManager;
use xparky_core::{Config, GoogleClient, Leaderboard, Settings, Sources, SubmissionStore, XpProcessor};
use xparky_web::{init_logging, router, AppState, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Logs go to stderr, so the dump below stays parseable
    let _guard = init_logging(&LoggingConfig::from_env());

    let settings = Settings::from_env()?;
    let config = Config::load_from(&settings.config_path()?)?;

    let key = ServiceAccountKey::from_env_value(&settings.credentials)
        .context("GOOGLE_SHEETS_CREDENTIALS is not a usable service account key")?;
    let client = GoogleClient::new(key)?;
    let processor = XpProcessor::new(client, Sources::from_settings(&settings), config.roster.clone());

    let data_dir = settings.data_dir()?;
    let submissions = SubmissionStore::open(&data_dir)?;

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--dump-leaderboard" {
        return dump_leaderboard(&processor, &submissions, &config).await;
    }

    info!(data_dir = %data_dir.display(), "XParky starting");

    let cache = match settings.cache_dir().and_then(CacheManager::new) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Snapshot cache disabled");
            None
        }
    };

    let state = AppState::new(processor, config, settings.admin_token.clone(), submissions, cache);
    if state.admin_token().is_none() {
        warn!("XPARKY_ADMIN_TOKEN not set, admin endpoints are disabled");
    }

    // Warm the leaderboard in the background so the first visitor does not wait
    let warm = state.clone();
    tokio::spawn(async move {
        if let Err(e) = warm.leaderboard().await {
            warn!(error = %format!("{:#}", e), "Initial leaderboard load failed");
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("XParky stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Fetch everything once and print the leaderboard as JSON
async fn dump_leaderboard(processor: &XpProcessor, submissions: &SubmissionStore, config: &Config) -> Result<()> {
    let snapshot = processor.snapshot().await?;
    let board = Leaderboard::build(&snapshot, submissions.all(), &config.points);

    for warning in &board.warnings {
        warn!(warning = %warning, "Partial data");
    }
    board.summary().log();

    println!("{}", serde_json::to_string_pretty(&board.entries)?);
    Ok(())
}
