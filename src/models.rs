use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

// ============ Database Models ============

/// A cached country, enriched with its exchange rate and estimated GDP.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Country {
    /// System-assigned identifier, stable across refreshes.
    pub id: i64,
    /// Display name as last reported by the countries source.
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    /// Code of the first currency listed by the source.
    pub currency_code: Option<String>,
    /// Units of `currency_code` per USD.
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    /// Batch timestamp of the refresh that last wrote this row.
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Field values written by one upsert; everything except the identity.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRecord {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
}

/// Whether an upsert created a row or rewrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated(i64),
}

// ============ Query Models ============

/// Query string accepted by `GET /countries`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryListParams {
    pub region: Option<String>,
    pub currency: Option<String>,
    pub sort: Option<String>,
}

/// AND-combined equality filters for listing countries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryFilter {
    pub region: Option<String>,
    pub currency_code: Option<String>,
}

/// Supported list orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    GdpAsc,
    GdpDesc,
    PopulationAsc,
    PopulationDesc,
    NameAsc,
    NameDesc,
}

impl SortOrder {
    /// Parses a `sort` query value. Unknown keys yield `None` and the
    /// listing falls back to its default order.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gdp_asc" => Some(SortOrder::GdpAsc),
            "gdp_desc" => Some(SortOrder::GdpDesc),
            "population_asc" => Some(SortOrder::PopulationAsc),
            "population_desc" => Some(SortOrder::PopulationDesc),
            "name_asc" => Some(SortOrder::NameAsc),
            "name_desc" => Some(SortOrder::NameDesc),
            _ => None,
        }
    }
}

impl CountryListParams {
    /// Splits the raw query into a filter and an optional ordering.
    /// Empty parameters (`?region=`) are treated as absent.
    pub fn into_query(self) -> (CountryFilter, Option<SortOrder>) {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let sort = self.sort.as_deref().and_then(SortOrder::parse);
        (
            CountryFilter {
                region: non_empty(self.region),
                currency_code: non_empty(self.currency),
            },
            sort,
        )
    }
}

// ============ Upstream Payloads ============

/// One entry of the countries source (restcountries v2 shape).
#[derive(Debug, Clone, Deserialize)]
pub struct SourceCountry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: Option<i64>,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub currencies: Option<Vec<SourceCurrency>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceCurrency {
    #[serde(default)]
    pub code: Option<String>,
}

/// Body of the exchange-rate source (open.er-api shape).
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRatesPayload {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub base_code: Option<String>,
    #[serde(rename = "error-type", default)]
    pub error_type: Option<String>,
    pub rates: Option<HashMap<String, f64>>,
}

/// Currency code to USD rate.
pub type ExchangeRates = HashMap<String, f64>;

// ============ API Response Models ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub total_countries: i64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// A source row the refresh pass could not use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCountry {
    /// Position in the countries payload.
    pub index: usize,
    pub name: Option<String>,
    pub reason: String,
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub total_processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: Vec<SkippedCountry>,
    pub last_refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub message: String,
    #[serde(flatten)]
    pub summary: RefreshSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("gdp_desc"), Some(SortOrder::GdpDesc));
        assert_eq!(SortOrder::parse("GDP_ASC"), Some(SortOrder::GdpAsc));
        assert_eq!(SortOrder::parse("name_desc"), Some(SortOrder::NameDesc));
        assert_eq!(SortOrder::parse("population_asc"), Some(SortOrder::PopulationAsc));
        assert_eq!(SortOrder::parse("capital_asc"), None);
        assert_eq!(SortOrder::parse(""), None);
    }

    #[test]
    fn test_list_params_ignore_blank_and_unknown() {
        let params = CountryListParams {
            region: Some("".to_string()),
            currency: Some("EUR".to_string()),
            sort: Some("by_vibes".to_string()),
        };
        let (filter, sort) = params.into_query();
        assert_eq!(filter.region, None);
        assert_eq!(filter.currency_code.as_deref(), Some("EUR"));
        assert_eq!(sort, None);
    }

    #[test]
    fn test_source_country_tolerates_missing_fields() {
        let raw = serde_json::json!({
            "name": "Antarctica",
            "region": "Polar",
            "population": 1000
        });
        let country: SourceCountry = serde_json::from_value(raw).unwrap();
        assert_eq!(country.name.as_deref(), Some("Antarctica"));
        assert!(country.capital.is_none());
        assert!(country.currencies.is_none());
    }

    #[test]
    fn test_country_serializes_timestamp_as_iso8601() {
        let country = Country {
            id: 1,
            name: "France".to_string(),
            capital: Some("Paris".to_string()),
            region: Some("Europe".to_string()),
            population: 67_000_000,
            currency_code: Some("EUR".to_string()),
            exchange_rate: Some(0.92),
            estimated_gdp: None,
            flag_url: None,
            last_refreshed_at: Some("2025-01-02T03:04:05Z".parse().unwrap()),
        };
        let value = serde_json::to_value(&country).unwrap();
        assert_eq!(value["last_refreshed_at"], "2025-01-02T03:04:05Z");
        assert!(value["estimated_gdp"].is_null());
    }
}
