use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    /// Sent as `Authorization` / `API-Key` when fetching protected feeds.
    pub access_key: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewFeed {
    pub name: String,
    pub url: String,
    pub access_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub color: String,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub description: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    /// Free-form, usually comma separated.
    pub keywords: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct TopicInput {
    pub name: String,
    pub keywords: String,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub content: String,
    pub summary: String,
    pub author: Option<String>,
    pub feed_id: Option<i64>,
    pub feed_name: Option<String>,
    pub published_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub relevancy_score: i64,
    pub user_feedback: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub url: String,
    pub content: String,
    pub summary: String,
    pub author: String,
    pub feed_id: Option<i64>,
    pub published_at: OffsetDateTime,
    pub category_name: String,
    pub category_color: String,
    pub relevancy_score: i64,
}

/// Reader rating of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Like,
    Neutral,
    Dislike,
}

impl Feedback {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Like => 1,
            Self::Neutral => 0,
            Self::Dislike => -1,
        }
    }
}

impl TryFrom<i64> for Feedback {
    type Error = i64;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::Like),
            0 => Ok(Self::Neutral),
            -1 => Ok(Self::Dislike),
            other => Err(other),
        }
    }
}
