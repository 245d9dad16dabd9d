//! SQLite persistence.

mod articles;
mod categories;
mod feeds;
mod models;
mod settings;
mod topics;

pub use articles::{ArticleRepository, DASHBOARD_LIMIT};
pub use categories::CategoryRepository;
pub use feeds::FeedRepository;
pub use models::{
    Article, Category, CategoryInput, Feed, Feedback, NewArticle, NewFeed, Topic, TopicInput,
};
pub use settings::{ConfigRepository, DEFAULT_RELEVANCY_THRESHOLD, RELEVANCY_THRESHOLD_KEY};
pub use topics::TopicRepository;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use time::OffsetDateTime;

use crate::config::FileConfig;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS feeds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        access_key TEXT,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        color TEXT NOT NULL DEFAULT '#007bff',
        active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS topics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        keywords TEXT NOT NULL,
        category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL,
        summary TEXT NOT NULL,
        author TEXT,
        feed_id INTEGER REFERENCES feeds(id) ON DELETE SET NULL,
        published_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        category_name TEXT,
        category_color TEXT,
        relevancy_score INTEGER NOT NULL DEFAULT 0,
        user_feedback INTEGER
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at)",
    r#"
    CREATE TABLE IF NOT EXISTS system_config (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Insert config-file seeds into empty tables.
pub async fn seed(pool: &SqlitePool, seeds: &FileConfig) -> Result<(), sqlx::Error> {
    if !seeds.feeds.is_empty() && FeedRepository::count(pool).await? == 0 {
        for f in &seeds.feeds {
            FeedRepository::create(
                pool,
                &NewFeed {
                    name: f.name.clone(),
                    url: f.url.clone(),
                    access_key: f.access_key.clone(),
                },
            )
            .await?;
        }
        tracing::info!("Seeded {} feeds from config", seeds.feeds.len());
    }

    if !seeds.categories.is_empty() && CategoryRepository::list(pool).await?.is_empty() {
        for c in &seeds.categories {
            CategoryRepository::create(
                pool,
                &CategoryInput {
                    name: c.name.clone(),
                    description: c.description.clone(),
                    color: c.color.clone(),
                },
            )
            .await?;
        }
        tracing::info!("Seeded {} categories from config", seeds.categories.len());
    }

    if !seeds.topics.is_empty() && TopicRepository::list(pool).await?.is_empty() {
        let categories = CategoryRepository::list(pool).await?;
        for t in &seeds.topics {
            let category_id = t.category.as_deref().and_then(|name| {
                categories
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
                    .map(|c| c.id)
            });
            TopicRepository::create(
                pool,
                &TopicInput {
                    name: t.name.clone(),
                    keywords: t.keywords.clone(),
                    category_id,
                },
            )
            .await?;
        }
        tracing::info!("Seeded {} topics from config", seeds.topics.len());
    }
    Ok(())
}

pub(crate) fn to_datetime(ts: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(ts).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
