use sqlx::SqlitePool;
use time::OffsetDateTime;

use super::models::{Article, Feedback, NewArticle};
use super::to_datetime;

const SELECT_ARTICLE: &str = r#"
    SELECT
        a.id, a.title, a.url, a.content, a.summary, a.author, a.feed_id,
        f.name AS feed_name, a.published_at, a.created_at,
        a.category_name, a.category_color, a.relevancy_score, a.user_feedback
    FROM articles a
    LEFT JOIN feeds f ON f.id = a.feed_id
"#;

/// Dashboard shows at most this many articles.
pub const DASHBOARD_LIMIT: i64 = 200;

pub struct ArticleRepository;

impl ArticleRepository {
    /// Highest scoring first, newest first among equal scores.
    pub async fn list_dashboard(pool: &SqlitePool, limit: i64) -> Result<Vec<Article>, sqlx::Error> {
        let query = format!(
            "{SELECT_ARTICLE} ORDER BY a.relevancy_score DESC, a.published_at DESC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Article>, sqlx::Error> {
        let query = format!("{SELECT_ARTICLE} WHERE a.id = $1");
        let row = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(Into::into))
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// When the newest stored article was saved.
    pub async fn latest_created_at(pool: &SqlitePool) -> Result<Option<OffsetDateTime>, sqlx::Error> {
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(created_at) FROM articles")
            .fetch_one(pool)
            .await?;
        Ok(row.0.map(to_datetime))
    }

    pub async fn exists_by_url(pool: &SqlitePool, url: &str) -> Result<bool, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles WHERE url = $1")
            .bind(url)
            .fetch_one(pool)
            .await?;
        Ok(row.0 > 0)
    }

    pub async fn insert(pool: &SqlitePool, data: &NewArticle) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (
                title, url, content, summary, author, feed_id, published_at, created_at,
                category_name, category_color, relevancy_score
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&data.title)
        .bind(&data.url)
        .bind(&data.content)
        .bind(&data.summary)
        .bind(&data.author)
        .bind(data.feed_id)
        .bind(data.published_at.unix_timestamp())
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .bind(&data.category_name)
        .bind(&data.category_color)
        .bind(data.relevancy_score)
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn delete_created_before(
        pool: &SqlitePool,
        cutoff: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM articles WHERE created_at < $1")
            .bind(cutoff.unix_timestamp())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_all(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM articles").execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Articles saved after `since_id`, oldest first.
    pub async fn list_since(
        pool: &SqlitePool,
        since_id: i64,
        limit: i64,
    ) -> Result<Vec<Article>, sqlx::Error> {
        let query = format!("{SELECT_ARTICLE} WHERE a.id > $1 ORDER BY a.id ASC LIMIT $2");
        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(since_id)
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn update_summary(pool: &SqlitePool, id: i64, summary: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE articles SET summary = $1 WHERE id = $2")
            .bind(summary)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_feedback(
        pool: &SqlitePool,
        id: i64,
        feedback: Feedback,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE articles SET user_feedback = $1 WHERE id = $2")
            .bind(feedback.as_i64())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Articles published in `[start, end)`, or every article when no range is given.
    pub async fn list_published_between(
        pool: &SqlitePool,
        range: Option<(OffsetDateTime, OffsetDateTime)>,
    ) -> Result<Vec<Article>, sqlx::Error> {
        let rows = match range {
            Some((start, end)) => {
                let query = format!(
                    "{SELECT_ARTICLE} WHERE a.published_at >= $1 AND a.published_at < $2 \
                     ORDER BY a.relevancy_score DESC, a.published_at DESC"
                );
                sqlx::query_as::<_, ArticleRow>(&query)
                    .bind(start.unix_timestamp())
                    .bind(end.unix_timestamp())
                    .fetch_all(pool)
                    .await?
            }
            None => {
                let query = format!(
                    "{SELECT_ARTICLE} ORDER BY a.relevancy_score DESC, a.published_at DESC"
                );
                sqlx::query_as::<_, ArticleRow>(&query).fetch_all(pool).await?
            }
        };
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    url: String,
    content: String,
    summary: String,
    author: Option<String>,
    feed_id: Option<i64>,
    feed_name: Option<String>,
    published_at: i64,
    created_at: i64,
    category_name: Option<String>,
    category_color: Option<String>,
    relevancy_score: i64,
    user_feedback: Option<i64>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            url: row.url,
            content: row.content,
            summary: row.summary,
            author: row.author,
            feed_id: row.feed_id,
            feed_name: row.feed_name,
            published_at: to_datetime(row.published_at),
            created_at: to_datetime(row.created_at),
            category_name: row.category_name,
            category_color: row.category_color,
            relevancy_score: row.relevancy_score,
            user_feedback: row.user_feedback,
        }
    }
}
