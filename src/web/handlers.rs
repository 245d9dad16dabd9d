//! HTML pages and form posts.

use axum::Form;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::error::AppResult;
use super::flash::{FlashMessage, clear_cookie};
use super::pages::{self, DashboardView, SchedulerView};
use super::state::AppState;
use crate::llm::{DEFAULT_MODEL, LlmProvider};
use crate::reports::{self, DateRange, Report, ReportFormat};
use crate::scheduler::{DailyTime, ScheduleError};
use crate::store::{
    ArticleRepository, CategoryInput, CategoryRepository, ConfigRepository, DASHBOARD_LIMIT,
    FeedRepository, NewFeed, TopicInput, TopicRepository,
};

/// Render a page with any pending flash messages, clearing the cookie once read.
fn page(state: &AppState, headers: &HeaderMap, render: impl FnOnce(&[FlashMessage]) -> String) -> Response {
    let (flashes, had_cookie) = state.flash.take(headers);
    let mut resp = Html(render(flashes.as_slice())).into_response();
    if had_cookie {
        resp.headers_mut().insert(SET_COOKIE, clear_cookie());
    }
    resp
}

pub async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let articles = ArticleRepository::list_dashboard(&state.db, DASHBOARD_LIMIT).await?;
    let categories = CategoryRepository::list_active(&state.db).await?;
    let total_articles = ArticleRepository::count(&state.db).await?;
    let last_refresh = ArticleRepository::latest_created_at(&state.db).await?;

    // Counted over the listed articles so badge counts match what is shown.
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for name in articles.iter().filter_map(|a| a.category_name.as_deref()) {
        *counts.entry(name.to_string()).or_default() += 1;
    }
    let category_stats: Vec<(String, usize)> = counts.into_iter().collect();

    let view = DashboardView {
        articles: &articles,
        categories: &categories,
        category_stats: &category_stats,
        total_articles,
        last_refresh,
        processing: state.processor.is_processing(),
    };
    Ok(page(&state, &headers, |f| {
        pages::dashboard(&view, state.header.as_deref(), f)
    }))
}

pub async fn admin() -> Redirect {
    Redirect::to("/admin/feeds")
}

pub async fn admin_feeds(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let feeds = FeedRepository::list(&state.db).await?;
    Ok(page(&state, &headers, |f| {
        pages::admin_feeds(&feeds, state.header.as_deref(), f)
    }))
}

pub async fn admin_topics(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let topics = TopicRepository::list(&state.db).await?;
    let categories = CategoryRepository::list_active(&state.db).await?;
    Ok(page(&state, &headers, |f| {
        pages::admin_topics(&topics, &categories, state.header.as_deref(), f)
    }))
}

pub async fn admin_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let categories = CategoryRepository::list(&state.db).await?;
    Ok(page(&state, &headers, |f| {
        pages::admin_categories(&categories, state.header.as_deref(), f)
    }))
}

pub async fn admin_llm(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let config = ConfigRepository::all(&state.db).await?;
    let threshold = ConfigRepository::relevancy_threshold(&state.db).await?;
    let environment = state.aws.environment_label();
    Ok(page(&state, &headers, |f| {
        pages::admin_llm(&config, threshold, &environment, state.header.as_deref(), f)
    }))
}

pub async fn admin_scheduler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let next_run = state.scheduler.next_run_time().await;
    let current_time = next_run
        .map(|t| format!("{:02}:{:02}", t.hour(), t.minute()))
        .unwrap_or_else(|| "09:00".into());
    let view = SchedulerView {
        next_run,
        is_running: state.scheduler.is_running(),
        current_time,
        processing: state.processor.is_processing(),
    };
    page(&state, &headers, |f| {
        pages::admin_scheduler(&view, state.header.as_deref(), f)
    })
}

#[derive(Debug, Deserialize)]
pub struct FeedForm {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub access_key: Option<String>,
}

pub async fn add_feed(State(state): State<AppState>, Form(form): Form<FeedForm>) -> AppResult<Response> {
    if form.name.trim().is_empty() || form.url.trim().is_empty() {
        return Ok(state.flash.redirect(
            "/admin/feeds",
            FlashMessage::error("Feed name and URL are required"),
        ));
    }
    FeedRepository::create(
        &state.db,
        &NewFeed {
            name: form.name,
            url: form.url,
            access_key: form.access_key,
        },
    )
    .await?;
    Ok(state
        .flash
        .redirect("/admin/feeds", FlashMessage::info("Feed added successfully")))
}

#[derive(Debug, Deserialize)]
pub struct TopicForm {
    pub name: String,
    pub keywords: String,
    #[serde(default)]
    pub category_id: Option<String>,
}

impl TopicForm {
    /// Form values with the category checked against the store; a blank or
    /// stale id means no category.
    async fn into_input(self, db: &SqlitePool) -> Result<TopicInput, sqlx::Error> {
        let requested = self
            .category_id
            .as_deref()
            .and_then(|c| c.trim().parse::<i64>().ok());
        let category_id = match requested {
            Some(id) => CategoryRepository::get_by_id(db, id).await?.map(|c| c.id),
            None => None,
        };
        if requested.is_some() && category_id.is_none() {
            tracing::warn!("Topic '{}' refers to a missing category; saving without one", self.name);
        }
        Ok(TopicInput {
            name: self.name,
            keywords: self.keywords,
            category_id,
        })
    }
}

pub async fn add_topic(State(state): State<AppState>, Form(form): Form<TopicForm>) -> AppResult<Response> {
    if form.name.trim().is_empty() {
        return Ok(state
            .flash
            .redirect("/admin/topics", FlashMessage::error("Topic name is required")));
    }
    let input = form.into_input(&state.db).await?;
    TopicRepository::create(&state.db, &input).await?;
    Ok(state
        .flash
        .redirect("/admin/topics", FlashMessage::info("Topic added successfully")))
}

pub async fn edit_topic(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<TopicForm>,
) -> AppResult<Response> {
    if form.name.trim().is_empty() {
        return Ok(state
            .flash
            .redirect("/admin/topics", FlashMessage::error("Topic name is required")));
    }
    let input = form.into_input(&state.db).await?;
    if TopicRepository::update(&state.db, id, &input).await? {
        return Ok(state
            .flash
            .redirect("/admin/topics", FlashMessage::info("Topic updated successfully")));
    }
    Ok(Redirect::to("/admin/topics").into_response())
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl CategoryForm {
    fn into_input(self) -> CategoryInput {
        CategoryInput {
            name: self.name,
            description: self.description,
            color: self
                .color
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "#007bff".into()),
        }
    }
}

pub async fn add_category(
    State(state): State<AppState>,
    Form(form): Form<CategoryForm>,
) -> AppResult<Response> {
    if form.name.trim().is_empty() {
        return Ok(state.flash.redirect(
            "/admin/categories",
            FlashMessage::error("Category name is required"),
        ));
    }
    CategoryRepository::create(&state.db, &form.into_input()).await?;
    Ok(state.flash.redirect(
        "/admin/categories",
        FlashMessage::info("Category added successfully"),
    ))
}

pub async fn edit_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<CategoryForm>,
) -> AppResult<Response> {
    if form.name.trim().is_empty() {
        return Ok(state.flash.redirect(
            "/admin/categories",
            FlashMessage::error("Category name is required"),
        ));
    }
    if CategoryRepository::update(&state.db, id, &form.into_input()).await? {
        return Ok(state.flash.redirect(
            "/admin/categories",
            FlashMessage::info("Category updated successfully"),
        ));
    }
    Ok(Redirect::to("/admin/categories").into_response())
}

pub async fn toggle_feed(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Redirect> {
    FeedRepository::toggle(&state.db, id).await?;
    Ok(Redirect::to("/admin/feeds"))
}

pub async fn toggle_topic(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Redirect> {
    TopicRepository::toggle(&state.db, id).await?;
    Ok(Redirect::to("/admin/topics"))
}

pub async fn toggle_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    CategoryRepository::toggle(&state.db, id).await?;
    Ok(Redirect::to("/admin/categories"))
}

pub async fn delete_feed(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    if FeedRepository::delete(&state.db, id).await? {
        return Ok(state
            .flash
            .redirect("/admin/feeds", FlashMessage::info("Feed deleted successfully")));
    }
    Ok(Redirect::to("/admin/feeds").into_response())
}

pub async fn delete_topic(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    if TopicRepository::delete(&state.db, id).await? {
        return Ok(state
            .flash
            .redirect("/admin/topics", FlashMessage::info("Topic deleted successfully")));
    }
    Ok(Redirect::to("/admin/topics").into_response())
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    if CategoryRepository::delete(&state.db, id).await? {
        return Ok(state.flash.redirect(
            "/admin/categories",
            FlashMessage::info("Category deleted successfully"),
        ));
    }
    Ok(Redirect::to("/admin/categories").into_response())
}

#[derive(Debug, Deserialize)]
pub struct LlmForm {
    #[serde(default)]
    pub llm_provider: Option<String>,
    #[serde(default)]
    pub llm_model: Option<String>,
    #[serde(default)]
    pub llm_model_custom: Option<String>,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default)]
    pub llm_api_base: Option<String>,
}

pub async fn update_llm_config(
    State(state): State<AppState>,
    Form(form): Form<LlmForm>,
) -> AppResult<Response> {
    let provider = match form.llm_provider.as_deref().unwrap_or("bedrock_iam").parse::<LlmProvider>() {
        Ok(p) => p,
        Err(e) => {
            return Ok(state
                .flash
                .redirect("/admin/llm", FlashMessage::error(e.to_string())));
        }
    };
    let model = if provider.is_bedrock() {
        form.llm_model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.into())
    } else {
        form.llm_model_custom.unwrap_or_default()
    };

    ConfigRepository::set(&state.db, "llm_provider", provider.as_str()).await?;
    ConfigRepository::set(&state.db, "llm_model", model.trim()).await?;
    if provider != LlmProvider::BedrockIam {
        let key = form.llm_api_key.unwrap_or_default();
        ConfigRepository::set(&state.db, "llm_api_key", key.trim()).await?;
    }
    if provider == LlmProvider::Custom {
        let base = form.llm_api_base.unwrap_or_default();
        ConfigRepository::set(&state.db, "llm_api_base", base.trim()).await?;
    }

    let message = match state.reload_model().await {
        Ok(()) => FlashMessage::info("LLM configuration updated successfully"),
        Err(e) => FlashMessage::error(format!("LLM configuration saved, but the model could not be initialised: {e}")),
    };
    Ok(state.flash.redirect("/admin/llm", message))
}

#[derive(Debug, Deserialize)]
pub struct ThresholdForm {
    #[serde(default)]
    pub relevancy_threshold: Option<String>,
}

pub async fn update_processing_settings(
    State(state): State<AppState>,
    Form(form): Form<ThresholdForm>,
) -> AppResult<Response> {
    let raw = form.relevancy_threshold.unwrap_or_else(|| "60".into());
    let message = match raw.trim().parse::<i64>() {
        Ok(v) if (0..=100).contains(&v) => {
            ConfigRepository::set_relevancy_threshold(&state.db, v).await?;
            FlashMessage::info(format!(
                "Relevancy threshold updated to {v}. Run \"Refresh News\" to apply the new filter."
            ))
        }
        Ok(_) => FlashMessage::error("Relevancy threshold must be between 0 and 100"),
        Err(_) => FlashMessage::error("Invalid relevancy threshold value"),
    };
    Ok(state.flash.redirect("/admin/llm", message))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleForm {
    #[serde(default)]
    pub time: Option<String>,
}

pub async fn update_schedule(State(state): State<AppState>, Form(form): Form<ScheduleForm>) -> Response {
    let raw = form.time.unwrap_or_else(|| "09:00".into());
    let at = match raw.parse::<DailyTime>() {
        Ok(t) => t,
        Err(e) => {
            return state
                .flash
                .redirect("/admin/scheduler", FlashMessage::error(e.to_string()));
        }
    };
    let message = match state.scheduler.reschedule(at).await {
        Ok(next) => FlashMessage::info(format!(
            "Schedule updated to {at} daily. Next run: {}",
            next.format(time::macros::format_description!(
                "[month repr:short] [day], [hour]:[minute]"
            ))
            .unwrap_or_default()
        )),
        Err(e) => FlashMessage::error(format!("Could not update schedule: {e}")),
    };
    state.flash.redirect("/admin/scheduler", message)
}

pub async fn run_scheduler_now(State(state): State<AppState>) -> Response {
    tracing::info!("Run Now requested from the scheduler page");
    if state.processor.is_processing() {
        return state.flash.redirect(
            "/admin/scheduler",
            FlashMessage::info("RSS summary already in progress"),
        );
    }
    let message = match state.scheduler.trigger().await {
        Ok(report) => FlashMessage::info(format!("RSS summary completed: {report}")),
        Err(ScheduleError::AlreadyRunning(_)) => FlashMessage::info("RSS summary already in progress"),
        Err(e) => FlashMessage::error(format!("RSS summary failed: {e}")),
    };
    state.flash.redirect("/admin/scheduler", message)
}

fn attachment(report: Report) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", report.filename);
    let mut resp = report.body.into_response();
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(report.content_type));
    if let Ok(v) = HeaderValue::from_str(&disposition) {
        headers.insert(CONTENT_DISPOSITION, v);
    }
    resp
}

async fn download(state: &AppState, format: ReportFormat, range: Option<DateRange>, back: &str) -> Response {
    match reports::generate(&state.db, format, range, state.header.as_deref()).await {
        Ok(report) => attachment(report),
        Err(e) => {
            tracing::error!("Report generation failed: {}", e);
            state
                .flash
                .redirect(back, FlashMessage::error(format!("Error generating report: {e}")))
        }
    }
}

pub async fn generate_markdown(State(state): State<AppState>) -> Response {
    download(&state, ReportFormat::Markdown, None, "/").await
}

pub async fn generate_html(State(state): State<AppState>) -> Response {
    download(&state, ReportFormat::Html, None, "/").await
}

#[derive(Debug, Deserialize)]
pub struct DateRangeForm {
    pub start_date: String,
    pub end_date: String,
    pub format: String,
}

pub async fn generate_date_range_report(
    State(state): State<AppState>,
    Form(form): Form<DateRangeForm>,
) -> Response {
    let parsed = form
        .format
        .parse::<ReportFormat>()
        .and_then(|f| DateRange::parse(&form.start_date, &form.end_date).map(|r| (f, r)));
    match parsed {
        Ok((format, range)) => download(&state, format, Some(range), "/admin/scheduler").await,
        Err(e) => state.flash.redirect(
            "/admin/scheduler",
            FlashMessage::error(format!("Error generating date range report: {e}")),
        ),
    }
}
