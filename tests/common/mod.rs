//! Shared fixtures for integration tests: mocked sources and an in-memory store.
#![allow(dead_code)]

use country_cache::config::Config;
use country_cache::db::Database;
use country_cache::handlers::AppState;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const COUNTRIES_PATH: &str = "/v2/all";
pub const RATES_PATH: &str = "/v6/latest/USD";

/// Helper function to create test config
pub fn create_test_config(source_base_url: &str, image_path: &Path) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        countries_api_url: format!(
            "{}{}?fields=name,capital,region,population,flag,currencies",
            source_base_url, COUNTRIES_PATH
        ),
        exchange_rate_api_url: format!("{}{}", source_base_url, RATES_PATH),
        api_timeout: Duration::from_millis(500),
        image_path: image_path.to_path_buf(),
        gdp_seed: Some(2024),
    }
}

pub async fn create_test_state(config: Config) -> Arc<AppState> {
    let db = Database::new(&config.database_url).await.unwrap();
    Arc::new(AppState::new(config, db.pool.clone()).unwrap())
}

pub fn countries_payload() -> Value {
    json!([
        {
            "name": "Nigeria",
            "capital": "Abuja",
            "region": "Africa",
            "population": 206139589,
            "flag": "https://flagcdn.com/ng.svg",
            "currencies": [{"code": "NGN", "name": "Nigerian naira", "symbol": "₦"}]
        },
        {
            "name": "France",
            "capital": "Paris",
            "region": "Europe",
            "population": 67391582,
            "flag": "https://flagcdn.com/fr.svg",
            "currencies": [{"code": "EUR", "name": "Euro", "symbol": "€"}]
        },
        {
            "name": "Germany",
            "capital": "Berlin",
            "region": "Europe",
            "population": 83240525,
            "flag": "https://flagcdn.com/de.svg",
            "currencies": [{"code": "EUR", "name": "Euro", "symbol": "€"}]
        },
        {
            "name": "Antarctica",
            "region": "Polar",
            "population": 1000,
            "flag": "https://flagcdn.com/aq.svg"
        },
        {
            "name": "Unknownia",
            "capital": "Nowhere City",
            "region": "Oceania",
            "population": 500,
            "currencies": [{"code": "QQQ", "name": "Quux", "symbol": "q"}]
        },
        {
            "capital": "Nameless",
            "region": "Europe",
            "population": 10
        }
    ])
}

pub fn rates_payload() -> Value {
    json!({
        "result": "success",
        "base_code": "USD",
        "rates": {"USD": 1.0, "NGN": 1600.5, "EUR": 0.92}
    })
}

pub async fn mount_countries(server: &MockServer, body: &Value) {
    Mock::given(method("GET"))
        .and(path(COUNTRIES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_rates(server: &MockServer, body: &Value) {
    Mock::given(method("GET"))
        .and(path(RATES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_sources(server: &MockServer) {
    mount_countries(server, &countries_payload()).await;
    mount_rates(server, &rates_payload()).await;
}
