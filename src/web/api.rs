//! JSON endpoints driven by the dashboard and admin scripts.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use time::macros::format_description;

use super::error::{AppError, AppResult};
use super::state::AppState;
use crate::aws::caller_identity;
use crate::llm::{self, BedrockAuth, BedrockClient, DEFAULT_MODEL, LanguageModel};
use crate::processor::ProcessingStatus;
use crate::store::{Article, ArticleRepository, Feedback};
use crate::util::sanitize::truncate_chars;

/// Page size of `/get_new_articles`.
const NEW_ARTICLES_LIMIT: i64 = 50;
const DEFAULT_COLOR: &str = "#6c757d";
const PROBE_PROMPT: &str = "Say 'Connection successful' if you can read this.";

#[derive(Debug, Deserialize)]
pub struct ConnectionTest {
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Sign a real Bedrock call with the instance or profile credentials.
pub async fn test_bedrock_connection(
    State(state): State<AppState>,
    Json(req): Json<ConnectionTest>,
) -> Response {
    let model_id = req
        .model_id
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.into());

    match probe_bedrock(&state, &model_id).await {
        Ok((identity, reply)) => Json(json!({
            "success": true,
            "message": format!(
                "Connected successfully!\nModel: {model_id}\nIdentity: {identity}\nResponse: {}",
                truncate_chars(&reply, 100)
            ),
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!("Bedrock connection test failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": format!(
                        "Connection failed: {e}\n\n{}\nRegion: {}",
                        state.aws.environment_label(),
                        state.aws.region
                    ),
                })),
            )
                .into_response()
        }
    }
}

async fn probe_bedrock(state: &AppState, model_id: &str) -> anyhow::Result<(String, String)> {
    let http = llm::http_client()?;
    let credentials = state.aws.credentials.credentials().await?;
    let identity = caller_identity(&http, &state.aws.region, &credentials).await?;
    let client = BedrockClient::new(
        http,
        &state.aws.region,
        model_id,
        BedrockAuth::SigV4(Arc::clone(&state.aws.credentials)),
    );
    let reply = client.complete(PROBE_PROMPT, 100).await?;
    Ok((identity, reply))
}

pub async fn refresh_news(State(state): State<AppState>) -> Response {
    if let Err(msg) = state.processor.check_llm().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "error", "message": format!("Cannot start refresh: {msg}")})),
        )
            .into_response();
    }
    if state.processor.spawn_refresh() {
        Json(json!({"status": "started", "message": "News refresh started in background"}))
            .into_response()
    } else {
        Json(json!({"status": "busy", "message": "Already processing"})).into_response()
    }
}

pub async fn processing_status(State(state): State<AppState>) -> Json<ProcessingStatus> {
    Json(state.processor.status())
}

pub async fn stop_processing(State(state): State<AppState>) -> Response {
    if state.processor.stop_processing() {
        Json(json!({
            "status": "success",
            "message": "Stop request sent. Processing will halt after current article.",
        }))
        .into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "No processing is currently running"})),
        )
            .into_response()
    }
}

pub async fn clear_all_news(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let count = state.processor.clear_all_articles().await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Cleared {count} articles"),
        "count": count,
    })))
}

/// Summary edits arrive as loose JSON; anything but a non-blank string is a 400.
pub async fn update_summary(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    let Some(summary) = body
        .get("summary")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
    else {
        return Err(AppError::BadRequest("No summary provided".into()));
    };
    if !ArticleRepository::update_summary(&state.db, id, summary).await? {
        return Err(AppError::NotFound("Article not found".into()));
    }
    Ok(Json(json!({"success": true})))
}

#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    #[serde(default)]
    pub since_id: i64,
}

/// Dashboard card data for one article.
#[derive(Debug, Serialize)]
pub struct ArticleCard {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub author: String,
    pub feed_name: String,
    pub published_date: String,
    pub category_name: String,
    pub category_color: String,
    pub relevancy_score: i64,
    pub user_feedback: Option<i64>,
}

impl From<Article> for ArticleCard {
    fn from(a: Article) -> Self {
        let published_date = a
            .published_at
            .format(format_description!(
                "[month repr:short] [day], [year] at [hour]:[minute]"
            ))
            .unwrap_or_default();
        Self {
            id: a.id,
            title: a.title,
            url: a.url,
            summary: a.summary,
            author: a.author.unwrap_or_else(|| "Unknown".into()),
            feed_name: a.feed_name.unwrap_or_else(|| "Unknown".into()),
            published_date,
            category_name: a.category_name.unwrap_or_default(),
            category_color: a.category_color.unwrap_or_else(|| DEFAULT_COLOR.into()),
            relevancy_score: a.relevancy_score,
            user_feedback: a.user_feedback,
        }
    }
}

pub async fn get_new_articles(
    State(state): State<AppState>,
    Query(q): Query<SinceQuery>,
) -> AppResult<Json<Value>> {
    let articles = ArticleRepository::list_since(&state.db, q.since_id, NEW_ARTICLES_LIMIT).await?;
    let cards: Vec<ArticleCard> = articles.into_iter().map(ArticleCard::from).collect();
    Ok(Json(json!({ "articles": cards })))
}

/// Only the integers 1, 0 and -1 are ratings; strings and fractions are rejected.
fn parse_feedback(body: &Value) -> Option<Feedback> {
    body.get("feedback")
        .and_then(Value::as_i64)
        .and_then(|v| Feedback::try_from(v).ok())
}

pub async fn rate_article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    let feedback = parse_feedback(&body)
        .ok_or_else(|| AppError::BadRequest("Invalid feedback value".into()))?;
    if !ArticleRepository::set_feedback(&state.db, id, feedback).await? {
        return Err(AppError::NotFound("Article not found".into()));
    }
    Ok(Json(json!({"success": true, "feedback": feedback.as_i64()})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_must_be_an_exact_rating() {
        assert_eq!(parse_feedback(&json!({"feedback": 1})), Some(Feedback::Like));
        assert_eq!(parse_feedback(&json!({"feedback": -1})), Some(Feedback::Dislike));
        assert_eq!(parse_feedback(&json!({"feedback": 0})), Some(Feedback::Neutral));
        assert_eq!(parse_feedback(&json!({"feedback": 2})), None);
        assert_eq!(parse_feedback(&json!({"feedback": 1.5})), None);
        assert_eq!(parse_feedback(&json!({"feedback": "like"})), None);
        assert_eq!(parse_feedback(&json!({})), None);
    }
}
