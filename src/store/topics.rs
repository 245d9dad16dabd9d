use sqlx::SqlitePool;

use super::models::{Topic, TopicInput};

const SELECT_TOPIC: &str = r#"
    SELECT
        t.id, t.name, t.keywords, t.category_id, c.name AS category_name, t.active
    FROM topics t
    LEFT JOIN categories c ON c.id = t.category_id
"#;

pub struct TopicRepository;

impl TopicRepository {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Topic>, sqlx::Error> {
        let query = format!("{SELECT_TOPIC} ORDER BY t.name");
        sqlx::query_as::<_, Topic>(&query).fetch_all(pool).await
    }

    pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Topic>, sqlx::Error> {
        let query = format!("{SELECT_TOPIC} WHERE t.active = TRUE ORDER BY t.name");
        sqlx::query_as::<_, Topic>(&query).fetch_all(pool).await
    }

    pub async fn create(pool: &SqlitePool, data: &TopicInput) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO topics (name, keywords, category_id, active) VALUES ($1, $2, $3, TRUE)",
        )
        .bind(data.name.trim())
        .bind(data.keywords.trim())
        .bind(data.category_id)
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(pool: &SqlitePool, id: i64, data: &TopicInput) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE topics SET name = $1, keywords = $2, category_id = $3 WHERE id = $4",
        )
        .bind(data.name.trim())
        .bind(data.keywords.trim())
        .bind(data.category_id)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn toggle(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE topics SET active = NOT active WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
