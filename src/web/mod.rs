//! The web console: routing, no-cache headers and the server loop.

pub mod api;
pub mod error;
pub mod flash;
pub mod handlers;
pub mod pages;
pub mod state;

pub use state::{AppState, model_from_store};

use axum::Router;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use time::OffsetDateTime;
use tokio::net::TcpListener;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard))
        .route("/admin", get(handlers::admin))
        .route("/admin/feeds", get(handlers::admin_feeds))
        .route("/admin/topics", get(handlers::admin_topics))
        .route("/admin/categories", get(handlers::admin_categories))
        .route("/admin/llm", get(handlers::admin_llm))
        .route("/admin/scheduler", get(handlers::admin_scheduler))
        .route("/add_feed", post(handlers::add_feed))
        .route("/add_topic", post(handlers::add_topic))
        .route("/add_category", post(handlers::add_category))
        .route("/edit_topic/:id", post(handlers::edit_topic))
        .route("/edit_category/:id", post(handlers::edit_category))
        .route("/toggle_feed/:id", get(handlers::toggle_feed))
        .route("/toggle_topic/:id", get(handlers::toggle_topic))
        .route("/toggle_category/:id", get(handlers::toggle_category))
        .route("/delete_feed/:id", get(handlers::delete_feed))
        .route("/delete_topic/:id", get(handlers::delete_topic))
        .route("/delete_category/:id", get(handlers::delete_category))
        .route("/update_llm_config", post(handlers::update_llm_config))
        .route(
            "/update_processing_settings",
            post(handlers::update_processing_settings),
        )
        .route("/update_schedule", post(handlers::update_schedule))
        .route("/run_scheduler_now", get(handlers::run_scheduler_now))
        .route("/generate_markdown", get(handlers::generate_markdown))
        .route("/generate_html", get(handlers::generate_html))
        .route(
            "/generate_date_range_report",
            post(handlers::generate_date_range_report),
        )
        .route("/test_bedrock_connection", post(api::test_bedrock_connection))
        .route("/refresh_news", get(api::refresh_news))
        .route("/processing_status", get(api::processing_status))
        .route("/stop_processing", get(api::stop_processing))
        .route("/clear_all_news", get(api::clear_all_news))
        .route("/update_summary/:id", post(api::update_summary))
        .route("/get_new_articles", get(api::get_new_articles))
        .route("/rate_article/:id", post(api::rate_article))
        .layer(middleware::from_fn(no_cache))
        .with_state(state)
}

/// Every response is marked uncacheable and stamped with a content version.
async fn no_cache(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static(
            "no-store, no-cache, must-revalidate, post-check=0, pre-check=0, max-age=0",
        ),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("-1"));
    let version = OffsetDateTime::now_utc().unix_timestamp().to_string();
    if let Ok(v) = HeaderValue::from_str(&version) {
        headers.insert("x-content-version", v);
    }
    resp
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
