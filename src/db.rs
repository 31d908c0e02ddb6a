use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Country table. `name_key` holds the lowercased name and carries the
/// uniqueness constraint, so two source names differing only in case map
/// to the same row.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS countries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL UNIQUE,
    capital TEXT,
    region TEXT,
    population INTEGER NOT NULL DEFAULT 0,
    currency_code TEXT,
    exchange_rate REAL,
    estimated_gdp REAL,
    flag_url TEXT,
    last_refreshed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_countries_region ON countries(region);
CREATE INDEX IF NOT EXISTS idx_countries_currency_code ON countries(currency_code);
"#;

pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = is_in_memory(database_url);
        let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to `:memory:` opens a fresh database, so keep exactly one alive.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;
        tracing::debug!("Country schema applied");

        Ok(Self { pool })
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:countries?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://countries.db"));
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        sqlx::query(SCHEMA_SQL).execute(&db.pool).await.unwrap();

        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name='countries'")
                .fetch_all(&db.pool)
                .await
                .unwrap();
        assert_eq!(tables.len(), 1);
    }

    #[tokio::test]
    async fn test_name_key_is_unique() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        sqlx::query("INSERT INTO countries (name, name_key, population) VALUES ('France', 'france', 1)")
            .execute(&db.pool)
            .await
            .unwrap();
        let duplicate =
            sqlx::query("INSERT INTO countries (name, name_key, population) VALUES ('FRANCE', 'france', 2)")
                .execute(&db.pool)
                .await;
        assert!(duplicate.is_err());
    }
}
