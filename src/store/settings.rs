use sqlx::SqlitePool;
use std::collections::HashMap;

pub const DEFAULT_RELEVANCY_THRESHOLD: i64 = 60;
pub const RELEVANCY_THRESHOLD_KEY: &str = "relevancy_threshold";

/// Key/value settings in `system_config`.
pub struct ConfigRepository;

impl ConfigRepository {
    pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM system_config WHERE key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.0))
    }

    pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO system_config (key, value) VALUES ($1, $2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn all(pool: &SqlitePool) -> Result<HashMap<String, String>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM system_config")
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// Stored threshold, or the default when unset or unparsable.
    pub async fn relevancy_threshold(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let value = Self::get(pool, RELEVANCY_THRESHOLD_KEY).await?;
        Ok(value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_RELEVANCY_THRESHOLD))
    }

    pub async fn set_relevancy_threshold(pool: &SqlitePool, value: i64) -> Result<(), sqlx::Error> {
        Self::set(pool, RELEVANCY_THRESHOLD_KEY, &value.to_string()).await
    }
}
