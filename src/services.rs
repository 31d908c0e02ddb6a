use crate::config::Config;
use crate::errors::{AppError, UpstreamFailure, UpstreamSource};
use crate::models::{ExchangeRates, ExchangeRatesPayload};
use axum::body::Bytes;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

fn build_client(config: &Config, source: UpstreamSource) -> Result<Client, AppError> {
    Client::builder()
        .timeout(config.api_timeout)
        .build()
        .map_err(|e| AppError::InternalError(format!("Failed to create {} client: {}", source, e)))
}

/// Sends a GET to `url` and returns the response once it has a success status.
async fn fetch(
    client: &Client,
    source: UpstreamSource,
    url: &str,
) -> Result<reqwest::Response, AppError> {
    tracing::info!("Fetching {}: {}", source, url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::from_upstream(source, e))?;

    if !response.status().is_success() {
        let status = response.status();
        tracing::error!("{} returned status {}", source, status);
        return Err(AppError::upstream(
            source,
            UpstreamFailure::Status(status.as_u16()),
        ));
    }

    Ok(response)
}

/// Reads the whole body. Transfer errors, including a connection dropped
/// mid-body, count against the source.
async fn read_body(response: reqwest::Response, source: UpstreamSource) -> Result<Bytes, AppError> {
    response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            AppError::upstream(source, UpstreamFailure::Timeout)
        } else {
            AppError::upstream(source, UpstreamFailure::Transport(e.to_string()))
        }
    })
}

fn parse_body<T: DeserializeOwned>(body: &[u8], source: UpstreamSource) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::InternalError(format!("Failed to parse {} response: {}", source, e)))
}

/// Client for the country list source.
#[derive(Clone)]
pub struct CountriesApiService {
    client: Client,
    url: String,
}

impl CountriesApiService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(config, UpstreamSource::Countries)?,
            url: config.countries_api_url.clone(),
        })
    }

    /// Fetches the raw country rows.
    ///
    /// Rows stay undecoded so that one malformed entry can be skipped by the
    /// caller instead of failing the whole payload.
    pub async fn fetch_countries(&self) -> Result<Vec<Value>, AppError> {
        let source = UpstreamSource::Countries;
        let response = fetch(&self.client, source, &self.url).await?;

        let bytes = read_body(response, source).await?;
        let body: Value = parse_body(&bytes, source)?;

        match body {
            Value::Array(rows) => {
                tracing::info!("{} returned {} countries", source, rows.len());
                Ok(rows)
            }
            other => Err(AppError::InternalError(format!(
                "{} returned a non-array payload ({})",
                source,
                json_kind(&other)
            ))),
        }
    }
}

/// Client for the currency code to USD rate source.
#[derive(Clone)]
pub struct ExchangeRateService {
    client: Client,
    url: String,
}

impl ExchangeRateService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(config, UpstreamSource::ExchangeRates)?,
            url: config.exchange_rate_api_url.clone(),
        })
    }

    pub async fn fetch_rates(&self) -> Result<ExchangeRates, AppError> {
        let source = UpstreamSource::ExchangeRates;
        let response = fetch(&self.client, source, &self.url).await?;

        let bytes = read_body(response, source).await?;
        let payload: ExchangeRatesPayload = parse_body(&bytes, source)?;

        if let Some(result) = payload.result.as_deref() {
            if result != "success" {
                let reason = payload
                    .error_type
                    .clone()
                    .unwrap_or_else(|| result.to_string());
                return Err(AppError::upstream(source, UpstreamFailure::Rejected(reason)));
            }
        }

        let rates = payload.rates.ok_or_else(|| {
            AppError::InternalError(format!("{} response has no rates", source))
        })?;

        tracing::info!(
            "{} returned {} rates (base {})",
            source,
            rates.len(),
            payload.base_code.as_deref().unwrap_or("unknown")
        );
        Ok(rates)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
