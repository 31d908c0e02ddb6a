//! Runs a single country refresh pass without starting the HTTP server.

use country_cache::config::Config;
use country_cache::db::Database;
use country_cache::handlers::AppState;
use country_cache::refresh::run_refresh;

/// Main entry point for the refresh script.
///
/// Loads the same configuration as the server, refreshes the store once and
/// prints the resulting summary as JSON. Exits non-zero if the pass fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;
    let state = AppState::new(config, db.pool.clone())?;

    tracing::info!("Connected to database. Starting refresh...");

    let summary = run_refresh(&state)
        .await
        .map_err(|e| anyhow::anyhow!("Refresh failed: {}", e))?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    tracing::info!(
        "Refresh complete. {} countries written, {} skipped.",
        summary.total_processed,
        summary.skipped.len()
    );

    Ok(())
}
