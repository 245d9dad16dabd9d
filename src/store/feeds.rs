use sqlx::SqlitePool;
use time::OffsetDateTime;

use super::models::{Feed, NewFeed};

const SELECT_FEED: &str = "SELECT id, name, url, access_key, active FROM feeds";

pub struct FeedRepository;

impl FeedRepository {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Feed>, sqlx::Error> {
        let query = format!("{SELECT_FEED} ORDER BY id");
        sqlx::query_as::<_, Feed>(&query).fetch_all(pool).await
    }

    pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Feed>, sqlx::Error> {
        let query = format!("{SELECT_FEED} WHERE active = TRUE ORDER BY id");
        sqlx::query_as::<_, Feed>(&query).fetch_all(pool).await
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Feed>, sqlx::Error> {
        let query = format!("{SELECT_FEED} WHERE id = $1");
        sqlx::query_as::<_, Feed>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, data: &NewFeed) -> Result<i64, sqlx::Error> {
        let access_key = data
            .access_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        let result = sqlx::query(
            r#"
            INSERT INTO feeds (name, url, access_key, active, created_at)
            VALUES ($1, $2, $3, TRUE, $4)
            "#,
        )
        .bind(data.name.trim())
        .bind(data.url.trim())
        .bind(access_key)
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Flip the active flag; false when the feed does not exist.
    pub async fn toggle(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE feeds SET active = NOT active WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
