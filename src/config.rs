use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_COUNTRIES_API_URL: &str =
    "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies";
pub const DEFAULT_EXCHANGE_RATE_API_URL: &str = "https://open.er-api.com/v6/latest/USD";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub countries_api_url: String,
    pub exchange_rate_api_url: String,
    /// Upper bound for each upstream fetch.
    pub api_timeout: Duration,
    /// Where the refresh pass writes the summary PNG.
    pub image_path: PathBuf,
    /// Fixes the GDP multiplier sequence of every refresh when set.
    pub gdp_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://countries.db".to_string())
                .trim()
                .to_string(),
            host: std::env::var("API_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string())
                .trim()
                .to_string(),
            port: std::env::var("PORT")
                .or_else(|_| std::env::var("API_PORT"))
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            countries_api_url: std::env::var("COUNTRIES_API_URL")
                .unwrap_or_else(|_| DEFAULT_COUNTRIES_API_URL.to_string())
                .trim()
                .to_string(),
            exchange_rate_api_url: std::env::var("EXCHANGE_RATE_API_URL")
                .unwrap_or_else(|_| DEFAULT_EXCHANGE_RATE_API_URL.to_string())
                .trim()
                .to_string(),
            api_timeout: std::env::var("API_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| anyhow::anyhow!("API_TIMEOUT must be a positive number of seconds"))?,
            image_path: std::env::var("SUMMARY_IMAGE_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cache/summary.png")),
            gdp_seed: match std::env::var("GDP_SEED") {
                Ok(seed) if !seed.trim().is_empty() => Some(
                    seed.trim()
                        .parse()
                        .map_err(|_| anyhow::anyhow!("GDP_SEED must be an unsigned integer"))?,
                ),
                _ => None,
            },
        };

        config.validate()?;

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}", config.database_url);
        tracing::debug!("Countries API: {}", config.countries_api_url);
        tracing::debug!("Exchange rate API: {}", config.exchange_rate_api_url);
        tracing::debug!("Upstream timeout: {:?}", config.api_timeout);
        tracing::debug!("Summary image path: {}", config.image_path.display());
        if let Some(seed) = config.gdp_seed {
            tracing::info!("GDP multiplier seeded with {}", seed);
        }

        Ok(config)
    }

    /// Checks the invariants `from_env` cannot express through parsing alone.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.database_url.starts_with("sqlite:") {
            anyhow::bail!("DATABASE_URL must start with sqlite:");
        }
        if self.host.is_empty() {
            anyhow::bail!("API_HOST cannot be empty");
        }
        validate_http_url("COUNTRIES_API_URL", &self.countries_api_url)?;
        validate_http_url("EXCHANGE_RATE_API_URL", &self.exchange_rate_api_url)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn validate_http_url(var: &str, value: &str) -> anyhow::Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", var, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", var);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            countries_api_url: DEFAULT_COUNTRIES_API_URL.to_string(),
            exchange_rate_api_url: DEFAULT_EXCHANGE_RATE_API_URL.to_string(),
            api_timeout: Duration::from_secs(30),
            image_path: PathBuf::from("cache/summary.png"),
            gdp_seed: None,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_sqlite_database() {
        let mut config = sample();
        config.database_url = "postgres://localhost/countries".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_http_source() {
        let mut config = sample();
        config.exchange_rate_api_url = "ftp://rates.example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.countries_api_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_addr() {
        assert_eq!(sample().bind_addr(), "127.0.0.1:8000");
    }
}
