//! Refresh pass: pull both sources, merge on currency code, upsert the batch.
//!
//! 1. Fetch the country list and the exchange rates (concurrently)
//! 2. Turn every usable country row into a `CountryRecord`
//! 3. Upsert all records inside one transaction stamped with one timestamp
//! 4. Commit, then regenerate the summary image
use crate::db_storage::CountryStorage;
use crate::errors::{AppError, ResultExt};
use crate::gdp::GdpEstimator;
use crate::handlers::AppState;
use crate::models::{
    CountryRecord, ExchangeRates, RefreshSummary, SkippedCountry, SourceCountry, UpsertOutcome,
};
use crate::summary_image::{SummaryData, TOP_COUNT};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Runs one full synchronization pass.
///
/// Refreshes are serialized through `AppState::refresh_lock`. Any upstream
/// failure returns before the transaction is opened; any storage failure
/// drops the transaction, so the store is never partially updated.
pub async fn run_refresh(state: &AppState) -> Result<RefreshSummary, AppError> {
    let _guard = state.refresh_lock.lock().await;

    let refreshed_at = Utc::now();
    tracing::info!("Starting country refresh (batch timestamp {})", refreshed_at);

    let (rows, rates) = tokio::try_join!(
        state.countries_api.fetch_countries(),
        state.rates_api.fetch_rates()
    )?;

    let mut estimator = GdpEstimator::new(state.config.gdp_seed);
    let mut inserted = 0;
    let mut updated = 0;
    let mut skipped = Vec::new();

    let mut tx = state
        .storage
        .begin()
        .await
        .context("opening refresh transaction")?;
    for (index, raw) in rows.into_iter().enumerate() {
        let record = match prepare_record(index, raw, &rates, &mut estimator) {
            Ok(record) => record,
            Err(skip) => {
                tracing::warn!(
                    "Skipping country #{} ({}): {}",
                    skip.index,
                    skip.name.as_deref().unwrap_or("unnamed"),
                    skip.reason
                );
                skipped.push(skip);
                continue;
            }
        };

        let outcome = CountryStorage::upsert_by_name(&mut tx, &record, refreshed_at)
            .await
            .with_context(|| format!("upserting country '{}'", record.name))?;
        match outcome {
            UpsertOutcome::Inserted(_) => inserted += 1,
            UpsertOutcome::Updated(_) => updated += 1,
        }
    }
    tx.commit().await.context("committing refresh batch")?;

    tracing::info!(
        "Country refresh committed: {} inserted, {} updated, {} skipped",
        inserted,
        updated,
        skipped.len()
    );

    if let Err(e) = render_summary(state, refreshed_at)
        .await
        .context("rendering summary image")
    {
        tracing::warn!("Summary image not updated: {}", e);
    }

    Ok(RefreshSummary {
        total_processed: inserted + updated,
        inserted,
        updated,
        skipped,
        last_refreshed_at: refreshed_at,
    })
}

/// Builds the record for one source row, or explains why it is unusable.
///
/// `currency_code` is the code of the first listed currency, the rate is
/// looked up by that code, and the GDP estimate is derived from both.
pub fn prepare_record(
    index: usize,
    raw: Value,
    rates: &ExchangeRates,
    estimator: &mut GdpEstimator,
) -> Result<CountryRecord, SkippedCountry> {
    let raw_name = raw
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);

    let source: SourceCountry = serde_json::from_value(raw).map_err(|e| SkippedCountry {
        index,
        name: raw_name.clone(),
        reason: format!("malformed record: {}", e),
    })?;

    let name = source
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SkippedCountry {
            index,
            name: None,
            reason: "missing name".to_string(),
        })?;

    let population = source.population.unwrap_or(0);
    let currency_code = source
        .currencies
        .as_ref()
        .and_then(|currencies| currencies.first())
        .and_then(|currency| currency.code.clone());
    let exchange_rate = currency_code
        .as_ref()
        .and_then(|code| rates.get(code).copied());
    let estimated_gdp = estimator.estimate(population, exchange_rate, currency_code.as_deref());

    Ok(CountryRecord {
        name,
        capital: source.capital,
        region: source.region,
        population,
        currency_code,
        exchange_rate,
        estimated_gdp,
        flag_url: source.flag,
    })
}

/// Regenerates the summary image from the committed store.
pub async fn render_summary(state: &AppState, refreshed_at: DateTime<Utc>) -> Result<(), AppError> {
    let total = state.storage.count().await?;
    let top = state.storage.top_by_gdp(TOP_COUNT as i64).await?;
    let data = SummaryData::new(total, &top, refreshed_at);
    state.renderer.render(&data).await
}
