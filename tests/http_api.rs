use reqwest::StatusCode;
use reqwest::header::{CACHE_CONTROL, CONTENT_DISPOSITION, COOKIE, LOCATION, SET_COOKIE};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::net::TcpListener;

use news_briefing::aws::{AwsContext, AwsCredentials, CredentialsProvider};
use news_briefing::llm::UnavailableModel;
use news_briefing::news::FeedFetcher;
use news_briefing::processor::{NewsProcessor, RssSummaryJob};
use news_briefing::scheduler::{self, DailyTime};
use news_briefing::store::{self, ArticleRepository, ConfigRepository, NewArticle, TopicRepository};
use news_briefing::web::{self, AppState};

struct TestApp {
    base: String,
    client: reqwest::Client,
    pool: SqlitePool,
    _dir: TempDir,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("news.db").display());
    let pool = store::create_pool(&url).await.unwrap();

    let aws = Arc::new(AwsContext {
        region: "us-east-1".into(),
        on_ec2: false,
        credentials: Arc::new(CredentialsProvider::fixed(AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: None,
            expiration: None,
        })),
    });
    let processor = Arc::new(NewsProcessor::new(
        pool.clone(),
        FeedFetcher::new().unwrap(),
        Arc::new(UnavailableModel::new("test-model", "no backend in tests")),
        Duration::ZERO,
    ));
    let job = Arc::new(RssSummaryJob::new(Arc::clone(&processor)));
    let scheduler = scheduler::spawn(job, DailyTime::new(9, 0).unwrap(), time::UtcOffset::UTC);
    let state = AppState::new(pool.clone(), processor, scheduler, aws, "test-secret", None);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(web::serve(listener, state));

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    TestApp {
        base: format!("http://{addr}"),
        client,
        pool,
        _dir: dir,
    }
}

fn article(url: &str, published_at: OffsetDateTime) -> NewArticle {
    NewArticle {
        title: "Bedrock adds new models".into(),
        url: url.into(),
        content: "Body".into(),
        summary: "• New models".into(),
        author: "Jane Doe".into(),
        feed_id: None,
        published_at,
        category_name: "Cloud".into(),
        category_color: "#ff9900".into(),
        relevancy_score: 88,
    }
}

/// `name=value` part of a Set-Cookie header, ready to send back.
fn cookie_pair(resp: &reqwest::Response) -> String {
    let raw = resp.headers()[SET_COOKIE].to_str().unwrap();
    raw.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn processing_status_reports_idle_with_no_cache_headers() {
    let app = spawn_app().await;
    let resp = app.client.get(app.url("/processing_status")).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let cache = resp.headers()[CACHE_CONTROL].to_str().unwrap();
    assert!(cache.contains("no-store"));
    assert_eq!(resp.headers()["expires"], "-1");
    assert!(resp.headers().contains_key("x-content-version"));

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["processing"], false);
    assert_eq!(body["total"], 0);
    assert_eq!(body["saved"], 0);
}

#[tokio::test]
async fn stop_without_running_pass_is_rejected() {
    let app = spawn_app().await;
    let resp = app.client.get(app.url("/stop_processing")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "No processing is currently running");
}

#[tokio::test]
async fn refresh_fails_fast_when_model_is_unreachable() {
    let app = spawn_app().await;
    let resp = app.client.get(app.url("/refresh_news")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Cannot start refresh:")
    );
}

#[tokio::test]
async fn rating_validates_value_and_article() {
    let app = spawn_app().await;
    let id = ArticleRepository::insert(&app.pool, &article("https://example.com/a", OffsetDateTime::now_utc()))
        .await
        .unwrap();

    let bad = app
        .client
        .post(app.url(&format!("/rate_article/{id}")))
        .json(&json!({"feedback": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    for body in [json!({"feedback": "like"}), json!({"feedback": 1.5}), json!({})] {
        let resp = app
            .client
            .post(app.url(&format!("/rate_article/{id}")))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["message"], "Invalid feedback value");
    }

    let missing = app
        .client
        .post(app.url("/rate_article/9999"))
        .json(&json!({"feedback": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let ok = app
        .client
        .post(app.url(&format!("/rate_article/{id}")))
        .json(&json!({"feedback": -1}))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let stored = ArticleRepository::get_by_id(&app.pool, id).await.unwrap().unwrap();
    assert_eq!(stored.user_feedback, Some(-1));
}

#[tokio::test]
async fn summary_edits_require_text_and_an_article() {
    let app = spawn_app().await;
    let id = ArticleRepository::insert(&app.pool, &article("https://example.com/b", OffsetDateTime::now_utc()))
        .await
        .unwrap();

    let empty = app
        .client
        .post(app.url(&format!("/update_summary/{id}")))
        .json(&json!({"summary": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let numeric = app
        .client
        .post(app.url(&format!("/update_summary/{id}")))
        .json(&json!({"summary": 42}))
        .send()
        .await
        .unwrap();
    assert_eq!(numeric.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .client
        .post(app.url("/update_summary/9999"))
        .json(&json!({"summary": "• Edited"}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let ok = app
        .client
        .post(app.url(&format!("/update_summary/{id}")))
        .json(&json!({"summary": "• Edited"}))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let stored = ArticleRepository::get_by_id(&app.pool, id).await.unwrap().unwrap();
    assert_eq!(stored.summary, "• Edited");
}

#[tokio::test]
async fn new_articles_are_listed_after_since_id() {
    let app = spawn_app().await;
    let first = ArticleRepository::insert(
        &app.pool,
        &article("https://example.com/1", datetime!(2026-05-01 10:30 UTC)),
    )
    .await
    .unwrap();
    ArticleRepository::insert(
        &app.pool,
        &article("https://example.com/2", datetime!(2026-05-02 08:05 UTC)),
    )
    .await
    .unwrap();

    let body: Value = app
        .client
        .get(app.url(&format!("/get_new_articles?since_id={first}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let articles = body["articles"].as_array().unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0]["url"], "https://example.com/2");
    assert_eq!(articles[0]["feed_name"], "Unknown");
    assert_eq!(articles[0]["published_date"], "May 02, 2026 at 08:05");
    assert_eq!(articles[0]["category_color"], "#ff9900");
}

#[tokio::test]
async fn clear_all_news_reports_count() {
    let app = spawn_app().await;
    ArticleRepository::insert(&app.pool, &article("https://example.com/c", OffsetDateTime::now_utc()))
        .await
        .unwrap();

    let body: Value = app
        .client
        .get(app.url("/clear_all_news"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["count"], 1);
    assert_eq!(ArticleRepository::count(&app.pool).await.unwrap(), 0);
}

#[tokio::test]
async fn form_posts_flash_once_after_redirect() {
    let app = spawn_app().await;
    let resp = app
        .client
        .post(app.url("/add_category"))
        .form(&[("name", "Security"), ("description", "Threats"), ("color", "#dc3545")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[LOCATION], "/admin/categories");
    let cookie = cookie_pair(&resp);

    let page = app
        .client
        .get(app.url("/admin/categories"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    let cleared = page.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(cleared.contains("Max-Age=0"));
    let html = page.text().await.unwrap();
    assert!(html.contains("Category added successfully"));
    assert!(html.contains("Security"));

    let forged = app
        .client
        .get(app.url("/admin/categories"))
        .header(COOKIE, "flash=00.00")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!forged.contains("Category added successfully"));
}

#[tokio::test]
async fn threshold_outside_range_is_not_stored() {
    let app = spawn_app().await;
    let resp = app
        .client
        .post(app.url("/update_processing_settings"))
        .form(&[("relevancy_threshold", "150")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(ConfigRepository::relevancy_threshold(&app.pool).await.unwrap(), 60);

    app.client
        .post(app.url("/update_processing_settings"))
        .form(&[("relevancy_threshold", "75")])
        .send()
        .await
        .unwrap();
    assert_eq!(ConfigRepository::relevancy_threshold(&app.pool).await.unwrap(), 75);
}

#[tokio::test]
async fn admin_redirects_and_reports_download() {
    let app = spawn_app().await;
    let admin = app.client.get(app.url("/admin")).send().await.unwrap();
    assert_eq!(admin.status(), StatusCode::SEE_OTHER);
    assert_eq!(admin.headers()[LOCATION], "/admin/feeds");

    ArticleRepository::insert(&app.pool, &article("https://example.com/r", OffsetDateTime::now_utc()))
        .await
        .unwrap();
    let report = app.client.get(app.url("/generate_markdown")).send().await.unwrap();
    assert_eq!(report.status(), StatusCode::OK);
    let disposition = report.headers()[CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"rss_summary_"));
    assert!(disposition.ends_with(".md\""));
    assert!(report.text().await.unwrap().contains("Bedrock adds new models"));
}

#[tokio::test]
async fn inverted_date_range_flashes_an_error() {
    let app = spawn_app().await;
    let resp = app
        .client
        .post(app.url("/generate_date_range_report"))
        .form(&[
            ("start_date", "2026-05-10"),
            ("end_date", "2026-05-01"),
            ("format", "html"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[LOCATION], "/admin/scheduler");
    assert!(resp.headers().contains_key(SET_COOKIE));
}

#[tokio::test]
async fn topic_with_unknown_category_is_saved_without_one() {
    let app = spawn_app().await;
    let resp = app
        .client
        .post(app.url("/add_topic"))
        .form(&[("name", "AWS"), ("keywords", "bedrock"), ("category_id", "999")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[LOCATION], "/admin/topics");

    let topics = TopicRepository::list(&app.pool).await.unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].name, "AWS");
    assert_eq!(topics[0].category_id, None);

    let id = topics[0].id;
    let edit = app
        .client
        .post(app.url(&format!("/edit_topic/{id}")))
        .form(&[("name", "AWS"), ("keywords", "bedrock, ec2"), ("category_id", "12345")])
        .send()
        .await
        .unwrap();
    assert_eq!(edit.status(), StatusCode::SEE_OTHER);
    let topics = TopicRepository::list(&app.pool).await.unwrap();
    assert_eq!(topics[0].keywords, "bedrock, ec2");
    assert_eq!(topics[0].category_id, None);
}

#[tokio::test]
async fn run_now_goes_through_the_scheduler_and_flashes_the_report() {
    let app = spawn_app().await;
    let resp = app.client.get(app.url("/run_scheduler_now")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[LOCATION], "/admin/scheduler");
    let cookie = cookie_pair(&resp);

    let html = app
        .client
        .get(app.url("/admin/scheduler"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("RSS summary completed: No active categories found"));
}
