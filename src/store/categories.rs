use sqlx::SqlitePool;

use super::models::{Category, CategoryInput};

const SELECT_CATEGORY: &str = "SELECT id, name, description, color, active FROM categories";

pub struct CategoryRepository;

impl CategoryRepository {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Category>, sqlx::Error> {
        let query = format!("{SELECT_CATEGORY} ORDER BY name");
        sqlx::query_as::<_, Category>(&query).fetch_all(pool).await
    }

    pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Category>, sqlx::Error> {
        let query = format!("{SELECT_CATEGORY} WHERE active = TRUE ORDER BY name");
        sqlx::query_as::<_, Category>(&query).fetch_all(pool).await
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Category>, sqlx::Error> {
        let query = format!("{SELECT_CATEGORY} WHERE id = $1");
        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, data: &CategoryInput) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO categories (name, description, color, active) VALUES ($1, $2, $3, TRUE)",
        )
        .bind(data.name.trim())
        .bind(data.description.trim())
        .bind(data.color.trim())
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        data: &CategoryInput,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE categories SET name = $1, description = $2, color = $3 WHERE id = $4",
        )
        .bind(data.name.trim())
        .bind(data.description.trim())
        .bind(data.color.trim())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn toggle(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE categories SET active = NOT active WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Topics pointing at the category become uncategorised.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("UPDATE topics SET category_id = NULL WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
