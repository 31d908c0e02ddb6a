use crate::errors::AppError;
use crate::models::{Country, CountryFilter, CountryRecord, SortOrder, StatusResponse, UpsertOutcome};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction};

const COUNTRY_COLUMNS: &str = "id, name, capital, region, population, currency_code, \
     exchange_rate, estimated_gdp, flag_url, last_refreshed_at";

/// Lookup key shared by every name-addressed operation.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Storage for the country table.
#[derive(Clone)]
pub struct CountryStorage {
    pool: SqlitePool,
}

impl CountryStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the transaction a refresh batch writes through.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    /// Insert-or-overwrite keyed by case-insensitive name.
    ///
    /// An existing row keeps its `id` and has every other field replaced,
    /// including `name` itself, so the stored spelling follows the latest
    /// source.
    pub async fn upsert_by_name(
        conn: &mut SqliteConnection,
        record: &CountryRecord,
        refreshed_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome, AppError> {
        let key = name_key(&record.name);

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM countries WHERE name_key = ?")
            .bind(&key)
            .fetch_optional(&mut *conn)
            .await?;

        match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE countries
                    SET name = ?, capital = ?, region = ?, population = ?,
                        currency_code = ?, exchange_rate = ?, estimated_gdp = ?,
                        flag_url = ?, last_refreshed_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&record.name)
                .bind(&record.capital)
                .bind(&record.region)
                .bind(record.population)
                .bind(&record.currency_code)
                .bind(record.exchange_rate)
                .bind(record.estimated_gdp)
                .bind(&record.flag_url)
                .bind(refreshed_at)
                .bind(id)
                .execute(&mut *conn)
                .await?;

                Ok(UpsertOutcome::Updated(id))
            }
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO countries (
                        name, name_key, capital, region, population, currency_code,
                        exchange_rate, estimated_gdp, flag_url, last_refreshed_at
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&record.name)
                .bind(&key)
                .bind(&record.capital)
                .bind(&record.region)
                .bind(record.population)
                .bind(&record.currency_code)
                .bind(record.exchange_rate)
                .bind(record.estimated_gdp)
                .bind(&record.flag_url)
                .bind(refreshed_at)
                .execute(&mut *conn)
                .await?;

                Ok(UpsertOutcome::Inserted(result.last_insert_rowid()))
            }
        }
    }

    /// All countries matching `filter`, ordered by `sort` or by `id`.
    ///
    /// GDP orderings put rows without an estimate last in both directions.
    pub async fn list(
        &self,
        filter: &CountryFilter,
        sort: Option<SortOrder>,
    ) -> Result<Vec<Country>, AppError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM countries WHERE 1 = 1", COUNTRY_COLUMNS));

        if let Some(region) = &filter.region {
            query.push(" AND region = ").push_bind(region.clone());
        }
        if let Some(code) = &filter.currency_code {
            query.push(" AND currency_code = ").push_bind(code.clone());
        }

        query.push(match sort {
            Some(SortOrder::GdpAsc) => " ORDER BY estimated_gdp IS NULL, estimated_gdp ASC, id ASC",
            Some(SortOrder::GdpDesc) => " ORDER BY estimated_gdp IS NULL, estimated_gdp DESC, id ASC",
            Some(SortOrder::PopulationAsc) => " ORDER BY population ASC, id ASC",
            Some(SortOrder::PopulationDesc) => " ORDER BY population DESC, id ASC",
            Some(SortOrder::NameAsc) => " ORDER BY name_key ASC, id ASC",
            Some(SortOrder::NameDesc) => " ORDER BY name_key DESC, id ASC",
            None => " ORDER BY id ASC",
        });

        let countries = query
            .build_query_as::<Country>()
            .fetch_all(&self.pool)
            .await?;

        Ok(countries)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Country, AppError> {
        sqlx::query_as::<_, Country>(&format!(
            "SELECT {} FROM countries WHERE name_key = ?",
            COUNTRY_COLUMNS
        ))
        .bind(name_key(name))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(name.to_string()))
    }

    pub async fn delete_by_name(&self, name: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM countries WHERE name_key = ?")
            .bind(name_key(name))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(name.to_string()));
        }

        tracing::info!("Deleted country '{}'", name);
        Ok(())
    }

    /// Row count and the most recent batch timestamp (`None` when empty).
    pub async fn stats(&self) -> Result<StatusResponse, AppError> {
        let (total_countries, last_refreshed_at): (i64, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT COUNT(*), MAX(last_refreshed_at) FROM countries")
                .fetch_one(&self.pool)
                .await?;

        Ok(StatusResponse {
            total_countries,
            last_refreshed_at,
        })
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM countries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Highest estimated GDPs first; rows without an estimate are left out.
    pub async fn top_by_gdp(&self, limit: i64) -> Result<Vec<Country>, AppError> {
        let countries = sqlx::query_as::<_, Country>(&format!(
            "SELECT {} FROM countries WHERE estimated_gdp IS NOT NULL \
             ORDER BY estimated_gdp DESC, id ASC LIMIT ?",
            COUNTRY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(countries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn storage() -> CountryStorage {
        let db = Database::new("sqlite::memory:").await.unwrap();
        CountryStorage::new(db.pool)
    }

    fn record(name: &str, region: &str, code: Option<&str>, gdp: Option<f64>) -> CountryRecord {
        CountryRecord {
            name: name.to_string(),
            capital: None,
            region: Some(region.to_string()),
            population: 1_000,
            currency_code: code.map(str::to_string),
            exchange_rate: code.map(|_| 1.0),
            estimated_gdp: gdp,
            flag_url: None,
        }
    }

    async fn seed(storage: &CountryStorage, records: &[CountryRecord]) -> DateTime<Utc> {
        let at = Utc::now();
        let mut tx = storage.begin().await.unwrap();
        for r in records {
            CountryStorage::upsert_by_name(&mut tx, r, at).await.unwrap();
        }
        tx.commit().await.unwrap();
        at
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_case_insensitive_name() {
        let storage = storage().await;
        seed(&storage, &[record("France", "Europe", Some("EUR"), Some(10.0))]).await;

        let mut renamed = record("FRANCE", "Western Europe", None, Some(0.0));
        renamed.capital = Some("Paris".to_string());
        let at = Utc::now();
        let mut tx = storage.begin().await.unwrap();
        let outcome = CountryStorage::upsert_by_name(&mut tx, &renamed, at).await.unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(outcome, UpsertOutcome::Updated(_)));
        assert_eq!(storage.count().await.unwrap(), 1);

        let stored = storage.get_by_name("france").await.unwrap();
        assert_eq!(stored.name, "FRANCE");
        assert_eq!(stored.region.as_deref(), Some("Western Europe"));
        assert_eq!(stored.currency_code, None);
        assert_eq!(stored.capital.as_deref(), Some("Paris"));
        assert_eq!(stored.last_refreshed_at, Some(at));
    }

    #[tokio::test]
    async fn test_uncommitted_batch_is_invisible() {
        let storage = storage().await;
        {
            let mut tx = storage.begin().await.unwrap();
            CountryStorage::upsert_by_name(&mut tx, &record("Chad", "Africa", None, None), Utc::now())
                .await
                .unwrap();
            tx.rollback().await.unwrap();
        }
        assert_eq!(storage.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_filters_are_exact_and_combined() {
        let storage = storage().await;
        seed(
            &storage,
            &[
                record("France", "Europe", Some("EUR"), Some(3.0)),
                record("Germany", "Europe", Some("EUR"), Some(4.0)),
                record("Sweden", "Europe", Some("SEK"), Some(2.0)),
                record("Senegal", "Africa", Some("XOF"), Some(1.0)),
                record("Lowercase", "europe", Some("EUR"), Some(1.0)),
            ],
        )
        .await;

        let europe = storage
            .list(
                &CountryFilter {
                    region: Some("Europe".to_string()),
                    currency_code: None,
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(europe.len(), 3);
        assert!(europe.iter().all(|c| c.region.as_deref() == Some("Europe")));

        let euro_europe = storage
            .list(
                &CountryFilter {
                    region: Some("Europe".to_string()),
                    currency_code: Some("EUR".to_string()),
                },
                None,
            )
            .await
            .unwrap();
        let names: Vec<_> = euro_europe.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["France", "Germany"]);
    }

    #[tokio::test]
    async fn test_gdp_sorts_put_nulls_last() {
        let storage = storage().await;
        seed(
            &storage,
            &[
                record("A", "R", Some("USD"), None),
                record("B", "R", Some("USD"), Some(5.0)),
                record("C", "R", None, Some(0.0)),
                record("D", "R", Some("USD"), Some(9.0)),
            ],
        )
        .await;

        let desc = storage
            .list(&CountryFilter::default(), Some(SortOrder::GdpDesc))
            .await
            .unwrap();
        let names: Vec<_> = desc.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["D", "B", "C", "A"]);

        let asc = storage
            .list(&CountryFilter::default(), Some(SortOrder::GdpAsc))
            .await
            .unwrap();
        let names: Vec<_> = asc.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "D", "A"]);
    }

    #[tokio::test]
    async fn test_name_and_population_sorts() {
        let storage = storage().await;
        let mut small = record("beta", "R", None, None);
        small.population = 10;
        let mut large = record("Alpha", "R", None, None);
        large.population = 1_000_000;
        let mut mid = record("Gamma", "R", None, None);
        mid.population = 500;
        seed(&storage, &[small, large, mid]).await;

        let by_name = storage
            .list(&CountryFilter::default(), Some(SortOrder::NameAsc))
            .await
            .unwrap();
        let names: Vec<_> = by_name.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta", "Gamma"]);

        let by_pop = storage
            .list(&CountryFilter::default(), Some(SortOrder::PopulationDesc))
            .await
            .unwrap();
        let pops: Vec<_> = by_pop.iter().map(|c| c.population).collect();
        assert_eq!(pops, vec![1_000_000, 500, 10]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let storage = storage().await;
        seed(&storage, &[record("Peru", "Americas", Some("PEN"), Some(1.0))]).await;

        let err = storage.delete_by_name("Atlantis").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref n) if n == "Atlantis"));
        assert_eq!(storage.count().await.unwrap(), 1);

        storage.delete_by_name("PERU").await.unwrap();
        assert_eq!(storage.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stats_on_empty_and_populated_store() {
        let storage = storage().await;
        let empty = storage.stats().await.unwrap();
        assert_eq!(empty.total_countries, 0);
        assert_eq!(empty.last_refreshed_at, None);

        let at = seed(&storage, &[record("Fiji", "Oceania", Some("FJD"), Some(1.0))]).await;
        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.total_countries, 1);
        assert_eq!(stats.last_refreshed_at, Some(at));
    }

    #[tokio::test]
    async fn test_top_by_gdp_skips_unknown_estimates() {
        let storage = storage().await;
        seed(
            &storage,
            &[
                record("A", "R", Some("USD"), Some(1.0)),
                record("B", "R", Some("USD"), None),
                record("C", "R", Some("USD"), Some(3.0)),
                record("D", "R", Some("USD"), Some(2.0)),
            ],
        )
        .await;

        let top = storage.top_by_gdp(2).await.unwrap();
        let names: Vec<_> = top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "D"]);
    }
}
