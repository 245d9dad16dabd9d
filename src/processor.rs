//! The refresh pipeline: fetch active feeds, analyse fresh entries, keep the
//! relevant ones.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use time::OffsetDateTime;

use crate::analysis::{self, AnalysisError, ArticleInput};
use crate::llm::{self, LanguageModel};
use crate::news::{FeedEntry, FeedFetcher};
use crate::scheduler::{JobResult, ScheduledJob};
use crate::store::{
    ArticleRepository, Category, CategoryRepository, ConfigRepository, Feed, FeedRepository,
    NewArticle, Topic, TopicRepository,
};
use crate::util::sanitize::truncate_chars;

/// Articles older than this are purged and feed entries older than this ignored.
const RETENTION: time::Duration = time::Duration::hours(24);

const PLACEHOLDER_AUTHORS: &[&str] = &["unknown", "none", "n/a"];
const PLACEHOLDER_AI_AUTHORS: &[&str] = &["not available", "not specified"];

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Progress {
    pub total: usize,
    pub processed: usize,
    pub saved: usize,
    pub current_article: String,
}

/// Body of `/processing_status`.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingStatus {
    pub processing: bool,
    #[serde(flatten)]
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Completed { saved: usize, total: usize },
    Stopped { saved: usize },
    AlreadyProcessing,
    NoCategories,
    LlmUnavailable(String),
    Failed(String),
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { saved, total } => {
                write!(f, "Processed {saved} relevant articles from {total} entries")
            }
            Self::Stopped { saved } => {
                write!(f, "Processing stopped by user. Saved {saved} articles.")
            }
            Self::AlreadyProcessing => write!(f, "Already processing"),
            Self::NoCategories => write!(f, "No active categories found"),
            Self::LlmUnavailable(msg) => write!(f, "LLM connectivity check failed: {msg}"),
            Self::Failed(e) => write!(f, "Error: {e}"),
        }
    }
}

enum EntryResult {
    Saved,
    Skipped,
    Stopped,
}

/// Clears the processing flag when the run ends, however it ends.
struct ClaimGuard<'a>(&'a AtomicBool);

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What one run works against, loaded once at the start.
struct RunContext {
    categories: Vec<Category>,
    topics: Vec<Topic>,
    threshold: i64,
    cutoff: OffsetDateTime,
    model: Arc<dyn LanguageModel>,
}

pub struct NewsProcessor {
    pool: SqlitePool,
    fetcher: FeedFetcher,
    model: RwLock<Arc<dyn LanguageModel>>,
    processing: AtomicBool,
    stop: AtomicBool,
    progress: Mutex<Progress>,
    analysis_delay: Duration,
}

impl NewsProcessor {
    pub fn new(
        pool: SqlitePool,
        fetcher: FeedFetcher,
        model: Arc<dyn LanguageModel>,
        analysis_delay: Duration,
    ) -> Self {
        Self {
            pool,
            fetcher,
            model: RwLock::new(model),
            processing: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            progress: Mutex::new(Progress::default()),
            analysis_delay,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn model(&self) -> Arc<dyn LanguageModel> {
        match self.model.read() {
            Ok(m) => m.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swap the backend after an LLM settings change; a running pass keeps its model.
    pub fn set_model(&self, model: Arc<dyn LanguageModel>) {
        tracing::info!("LLM backend replaced: {}", model.model_id());
        match self.model.write() {
            Ok(mut m) => *m = model,
            Err(poisoned) => *poisoned.into_inner() = model,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ProcessingStatus {
        ProcessingStatus {
            processing: self.is_processing(),
            progress: self.with_progress(|p| p.clone()),
        }
    }

    pub async fn check_llm(&self) -> Result<(), String> {
        llm::check_connectivity(self.model().as_ref()).await
    }

    /// Ask a running pass to stop at the next checkpoint.
    pub fn stop_processing(&self) -> bool {
        if !self.is_processing() {
            return false;
        }
        tracing::info!("Stop requested");
        self.stop.store(true, Ordering::SeqCst);
        true
    }

    pub async fn clear_all_articles(&self) -> Result<u64, sqlx::Error> {
        let count = ArticleRepository::delete_all(&self.pool).await?;
        tracing::info!("Cleared {} articles", count);
        Ok(count)
    }

    /// Run one pass on the calling task.
    pub async fn process_feeds(&self) -> ProcessOutcome {
        if !self.try_claim() {
            return ProcessOutcome::AlreadyProcessing;
        }
        self.run_claimed().await
    }

    /// Start a pass in the background; false when one is already running.
    pub fn spawn_refresh(self: &Arc<Self>) -> bool {
        if !self.try_claim() {
            return false;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.run_claimed().await;
            tracing::info!("Background processing finished: {}", outcome);
        });
        true
    }

    fn try_claim(&self) -> bool {
        self.processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    async fn run_claimed(&self) -> ProcessOutcome {
        let _guard = ClaimGuard(&self.processing);
        self.stop.store(false, Ordering::SeqCst);
        self.with_progress(|p| *p = Progress::default());

        match self.pipeline().await {
            Ok(outcome) => {
                tracing::info!("{}", outcome);
                outcome
            }
            Err(e) => {
                tracing::error!("Processing error: {}", e);
                ProcessOutcome::Failed(e.to_string())
            }
        }
    }

    async fn pipeline(&self) -> Result<ProcessOutcome, sqlx::Error> {
        let cutoff = OffsetDateTime::now_utc() - RETENTION;
        let purged = ArticleRepository::delete_created_before(&self.pool, cutoff).await?;
        if purged > 0 {
            tracing::info!("Removed {} articles older than 24 hours", purged);
        }

        let feeds = FeedRepository::list_active(&self.pool).await?;
        let categories = CategoryRepository::list_active(&self.pool).await?;
        let topics = TopicRepository::list_active(&self.pool).await?;
        let threshold = ConfigRepository::relevancy_threshold(&self.pool).await?;

        tracing::info!("=== Starting news processing ===");
        tracing::info!("Active feeds: {}", feeds.len());
        tracing::info!("Active categories: {}", categories.len());
        if categories.is_empty() {
            return Ok(ProcessOutcome::NoCategories);
        }

        let model = self.model();
        tracing::info!("Checking LLM connectivity...");
        if let Err(msg) = llm::check_connectivity(model.as_ref()).await {
            tracing::error!("LLM connectivity check failed: {}", msg);
            return Ok(ProcessOutcome::LlmUnavailable(msg));
        }
        tracing::info!("LLM connected: {}", model.model_id());

        let mut batches: Vec<(&Feed, Vec<FeedEntry>)> = Vec::with_capacity(feeds.len());
        for feed in &feeds {
            if self.stop_requested() {
                return Ok(ProcessOutcome::Stopped { saved: 0 });
            }
            let entries = self.fetcher.fetch(&feed.url, feed.access_key.as_deref()).await;
            tracing::info!("Feed '{}': {} entries", feed.name, entries.len());
            batches.push((feed, entries));
        }
        let total: usize = batches.iter().map(|(_, e)| e.len()).sum();
        self.with_progress(|p| p.total = total);

        let ctx = RunContext {
            categories,
            topics,
            threshold,
            cutoff,
            model,
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut saved = 0;

        for (feed, entries) in &batches {
            if self.stop_requested() {
                return Ok(ProcessOutcome::Stopped { saved });
            }
            tracing::info!("Processing feed: {}", feed.name);

            for entry in entries {
                if self.stop_requested() {
                    return Ok(ProcessOutcome::Stopped { saved });
                }
                match self.process_entry(&ctx, feed, entry, &mut seen).await {
                    Ok(EntryResult::Saved) => {
                        saved += 1;
                        self.with_progress(|p| p.saved += 1);
                    }
                    Ok(EntryResult::Skipped) => {}
                    Ok(EntryResult::Stopped) => return Ok(ProcessOutcome::Stopped { saved }),
                    Err(e) => tracing::error!("Error processing entry '{}': {}", entry.title, e),
                }
            }
        }

        Ok(ProcessOutcome::Completed { saved, total })
    }

    async fn process_entry(
        &self,
        ctx: &RunContext,
        feed: &Feed,
        entry: &FeedEntry,
        seen: &mut HashSet<String>,
    ) -> Result<EntryResult, sqlx::Error> {
        let short_title = truncate_chars(&entry.title, 60);
        self.with_progress(|p| {
            p.processed += 1;
            p.current_article = short_title.clone();
        });

        let published = entry.published.unwrap_or_else(OffsetDateTime::now_utc);
        if published < ctx.cutoff {
            tracing::debug!("Skipping: {} (older than 24 hours)", short_title);
            return Ok(EntryResult::Skipped);
        }

        let link = match &entry.link {
            Some(link) if seen.insert(link.clone()) => link,
            _ => {
                tracing::debug!("Skipping: {} (duplicate or no link)", short_title);
                return Ok(EntryResult::Skipped);
            }
        };

        tracing::info!("Processing: {}...", short_title);
        if ArticleRepository::exists_by_url(&self.pool, link).await? {
            tracing::debug!("  -> Already exists, skipping");
            return Ok(EntryResult::Skipped);
        }
        if entry.content.trim().is_empty() {
            tracing::debug!("  -> No content, skipping");
            return Ok(EntryResult::Skipped);
        }
        if self.stop_requested() {
            return Ok(EntryResult::Stopped);
        }

        if !self.analysis_delay.is_zero() {
            tokio::time::sleep(self.analysis_delay).await;
        }

        let input = ArticleInput {
            title: &entry.title,
            author: &entry.author,
            content: &entry.content,
            url: link,
        };
        let analysis = match analysis::analyze_article(
            ctx.model.as_ref(),
            &input,
            &ctx.categories,
            &ctx.topics,
            &self.stop,
        )
        .await
        {
            Ok(a) => a,
            Err(AnalysisError::Stopped) => return Ok(EntryResult::Stopped),
            Err(e) => {
                tracing::warn!("  -> Skipping due to AI analysis failure: {}", e);
                return Ok(EntryResult::Skipped);
            }
        };

        let author = resolve_author(&entry.author, &analysis.author);
        analysis::log::threshold(analysis.relevancy_score, ctx.threshold);
        if analysis.relevancy_score < ctx.threshold {
            tracing::info!(
                "  -> Skipping: Low relevancy score ({} < {})",
                analysis.relevancy_score,
                ctx.threshold
            );
            return Ok(EntryResult::Skipped);
        }

        let wanted = analysis.category.trim();
        if wanted.is_empty() {
            tracing::info!("  -> Skipping: No category assigned by AI");
            return Ok(EntryResult::Skipped);
        }
        let Some(category) = ctx
            .categories
            .iter()
            .find(|c| c.name.to_lowercase() == wanted.to_lowercase())
        else {
            tracing::warn!(
                "  -> AI returned invalid category '{}', skipping (valid: {:?})",
                wanted,
                ctx.categories.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
            );
            return Ok(EntryResult::Skipped);
        };

        let id = ArticleRepository::insert(
            &self.pool,
            &NewArticle {
                title: entry.title.clone(),
                url: link.clone(),
                content: entry.content.clone(),
                summary: analysis.summary,
                author,
                feed_id: Some(feed.id),
                published_at: published,
                category_name: category.name.clone(),
                category_color: category.color.clone(),
                relevancy_score: analysis.relevancy_score,
            },
        )
        .await?;
        tracing::info!("  -> [SAVED] Article ID {} in {}", id, category.name);
        Ok(EntryResult::Saved)
    }

    fn stop_requested(&self) -> bool {
        let stop = self.stop.load(Ordering::SeqCst);
        if stop {
            tracing::info!("=== Processing stopped by user ===");
        }
        stop
    }

    fn with_progress<T>(&self, f: impl FnOnce(&mut Progress) -> T) -> T {
        match self.progress.lock() {
            Ok(mut p) => f(&mut p),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

/// Feed author unless it is a placeholder, then the model's guess, then "Unknown".
pub fn resolve_author(feed_author: &str, ai_author: &str) -> String {
    let feed_author = feed_author.trim();
    let ai_author = ai_author.trim();
    let is_placeholder = |s: &str, extra: &[&str]| {
        let lower = s.to_lowercase();
        s.is_empty()
            || PLACEHOLDER_AUTHORS.contains(&lower.as_str())
            || extra.contains(&lower.as_str())
    };

    if !is_placeholder(feed_author, &[]) {
        feed_author.to_string()
    } else if !is_placeholder(ai_author, PLACEHOLDER_AI_AUTHORS) {
        ai_author.to_string()
    } else {
        "Unknown".to_string()
    }
}

/// The daily refresh, driven by the scheduler.
pub struct RssSummaryJob {
    processor: Arc<NewsProcessor>,
}

impl RssSummaryJob {
    pub fn new(processor: Arc<NewsProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl ScheduledJob for RssSummaryJob {
    fn name(&self) -> &'static str {
        "RSS Summary"
    }

    async fn execute(&self) -> JobResult {
        match self.processor.process_feeds().await {
            ProcessOutcome::Failed(e) => Err(e.into()),
            ProcessOutcome::AlreadyProcessing => {
                tracing::info!("Scheduled run skipped: processing already in progress");
                Ok(ProcessOutcome::AlreadyProcessing.to_string())
            }
            outcome => Ok(outcome.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::llm::testing::ScriptedModel;
    use crate::store::testing::temp_pool;
    use crate::store::{CategoryInput, NewFeed};
    use std::io::Write;
    use std::sync::{OnceLock, Weak};
    use time::format_description::well_known::Rfc2822;

    fn item(title: &str, link: &str, author: Option<&str>, published: OffsetDateTime) -> String {
        let author = author
            .map(|a| format!("<author>{a}</author>"))
            .unwrap_or_default();
        format!(
            "<item><title>{title}</title><link>{link}</link>{author}\
             <description>Body of {title}</description><pubDate>{}</pubDate></item>",
            published.format(&Rfc2822).unwrap()
        )
    }

    fn write_feed(items: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Wire</title><link>https://wire.example/</link>{}</channel></rss>"#,
            items.concat()
        )
        .unwrap();
        file
    }

    async fn setup(
        file: &tempfile::NamedTempFile,
        with_category: bool,
    ) -> (tempfile::TempDir, SqlitePool) {
        let (dir, pool) = temp_pool().await;
        FeedRepository::create(
            &pool,
            &NewFeed {
                name: "Wire".into(),
                url: file.path().to_str().unwrap().to_string(),
                access_key: None,
            },
        )
        .await
        .unwrap();
        if with_category {
            CategoryRepository::create(
                &pool,
                &CategoryInput {
                    name: "Cloud".into(),
                    description: String::new(),
                    color: "#ff9900".into(),
                },
            )
            .await
            .unwrap();
        }
        (dir, pool)
    }

    fn processor(pool: SqlitePool, model: Arc<dyn LanguageModel>) -> NewsProcessor {
        NewsProcessor::new(pool, FeedFetcher::new().unwrap(), model, Duration::ZERO)
    }

    #[test]
    fn author_resolution_prefers_feed_then_model() {
        assert_eq!(resolve_author("Jane", "Bob"), "Jane");
        assert_eq!(resolve_author(" N/A ", "Bob"), "Bob");
        assert_eq!(resolve_author("", "Not specified"), "Unknown");
        assert_eq!(resolve_author("unknown", ""), "Unknown");
    }

    #[test]
    fn outcome_messages() {
        assert_eq!(
            ProcessOutcome::Completed { saved: 2, total: 7 }.to_string(),
            "Processed 2 relevant articles from 7 entries"
        );
        assert_eq!(
            ProcessOutcome::Stopped { saved: 1 }.to_string(),
            "Processing stopped by user. Saved 1 articles."
        );
        assert_eq!(
            ProcessOutcome::LlmUnavailable("Access denied to AWS Bedrock service".into()).to_string(),
            "LLM connectivity check failed: Access denied to AWS Bedrock service"
        );
    }

    #[tokio::test]
    async fn pipeline_saves_only_fresh_relevant_categorised_entries() {
        let now = OffsetDateTime::now_utc();
        let file = write_feed(&[
            item("Relevant", "https://wire.example/1", None, now),
            item("Dull", "https://wire.example/2", Some("Sam"), now),
            item("Again", "https://wire.example/1", None, now),
            item("Stale", "https://wire.example/3", None, now - time::Duration::hours(30)),
            item("Elsewhere", "https://wire.example/4", None, now),
        ]);
        let (_dir, pool) = setup(&file, true).await;

        let model = Arc::new(ScriptedModel::always("{}"));
        model.push(Ok(r#"{"bullets": ["- One", "Two"], "category": "cloud", "relevancy_score": 85, "author": "AI Author"}"#.into()));
        model.push(Ok(r#"{"bullets": ["x"], "category": "Cloud", "relevancy_score": 20, "author": ""}"#.into()));
        model.push(Ok(r#"{"bullets": ["y"], "category": "Sports", "relevancy_score": 99, "author": ""}"#.into()));

        let processor = processor(pool.clone(), model.clone());
        let outcome = processor.process_feeds().await;
        assert_eq!(outcome, ProcessOutcome::Completed { saved: 1, total: 5 });
        assert_eq!(model.analysis_prompts().len(), 3);

        let articles = ArticleRepository::list_dashboard(&pool, 10).await.unwrap();
        assert_eq!(articles.len(), 1);
        let a = &articles[0];
        assert_eq!(a.url, "https://wire.example/1");
        assert_eq!(a.category_name.as_deref(), Some("Cloud"));
        assert_eq!(a.category_color.as_deref(), Some("#ff9900"));
        assert_eq!(a.author.as_deref(), Some("AI Author"));
        assert_eq!(a.summary, "• One\n• Two");
        assert_eq!(a.feed_name.as_deref(), Some("Wire"));

        let status = processor.status();
        assert!(!status.processing);
        assert_eq!(status.progress.processed, 5);
        assert_eq!(status.progress.saved, 1);

        // A second pass finds the stored URL and does not call the model again.
        let again = processor.process_feeds().await;
        assert_eq!(again, ProcessOutcome::Completed { saved: 0, total: 5 });
        assert_eq!(model.analysis_prompts().len(), 5);
    }

    #[tokio::test]
    async fn feed_bylines_win_over_the_model_guess() {
        let now = OffsetDateTime::now_utc().format(&Rfc2822).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel><title>Wire</title><link>https://wire.example/</link>
    <item><title>Plain</title><link>https://wire.example/p</link>
      <author>Jane Doe</author><description>Body</description><pubDate>{now}</pubDate></item>
    <item><title>Creator</title><link>https://wire.example/c</link>
      <dc:creator>Pat Lee</dc:creator><description>Body</description><pubDate>{now}</pubDate></item>
  </channel>
</rss>"#
        )
        .unwrap();
        let (_dir, pool) = setup(&file, true).await;

        let reply = r#"{"bullets": ["a"], "category": "Cloud", "relevancy_score": 90, "author": "AI Author"}"#;
        let model = Arc::new(ScriptedModel::always(reply));
        let p = processor(pool.clone(), model);
        assert_eq!(
            p.process_feeds().await,
            ProcessOutcome::Completed { saved: 2, total: 2 }
        );

        let mut authors: Vec<(String, Option<String>)> = ArticleRepository::list_dashboard(&pool, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.url, a.author))
            .collect();
        authors.sort();
        assert_eq!(
            authors,
            vec![
                ("https://wire.example/c".to_string(), Some("Pat Lee".to_string())),
                ("https://wire.example/p".to_string(), Some("Jane Doe".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn missing_categories_and_dead_llm_abort_early() {
        let file = write_feed(&[item("A", "https://wire.example/a", None, OffsetDateTime::now_utc())]);
        let (_dir, pool) = setup(&file, false).await;
        let model = Arc::new(ScriptedModel::always("{}"));
        let p = processor(pool.clone(), model.clone());
        assert_eq!(p.process_feeds().await, ProcessOutcome::NoCategories);

        CategoryRepository::create(
            &pool,
            &CategoryInput {
                name: "Cloud".into(),
                description: String::new(),
                color: "#000000".into(),
            },
        )
        .await
        .unwrap();
        p.set_model(Arc::new(crate::llm::UnavailableModel::new("m", "no key")));
        match p.process_feeds().await {
            ProcessOutcome::LlmUnavailable(msg) => assert!(msg.contains("no key")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(model.analysis_prompts().is_empty());
    }

    #[tokio::test]
    async fn concurrent_runs_are_refused() {
        let file = write_feed(&[]);
        let (_dir, pool) = setup(&file, true).await;
        let p = processor(pool, Arc::new(ScriptedModel::always("{}")));

        assert!(!p.stop_processing());
        assert!(p.try_claim());
        assert!(p.is_processing());
        assert_eq!(p.process_feeds().await, ProcessOutcome::AlreadyProcessing);
        assert!(p.stop_processing());
    }

    #[tokio::test]
    async fn analysis_failures_are_skipped() {
        let file = write_feed(&[item("A", "https://wire.example/a", Some("Jane"), OffsetDateTime::now_utc())]);
        let (_dir, pool) = setup(&file, true).await;
        let model = Arc::new(ScriptedModel::always("{}"));
        model.push(Err(LlmError::Response("throttled".into())));
        let p = processor(pool.clone(), model);

        assert_eq!(
            p.process_feeds().await,
            ProcessOutcome::Completed { saved: 0, total: 1 }
        );
        assert_eq!(ArticleRepository::count(&pool).await.unwrap(), 0);
    }

    /// Requests a stop while answering its first analysis.
    struct StoppingModel {
        processor: OnceLock<Weak<NewsProcessor>>,
    }

    #[async_trait]
    impl LanguageModel for StoppingModel {
        fn model_id(&self) -> &str {
            "stopping"
        }

        async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
            if prompt == "hi" {
                return Ok("hello".into());
            }
            if let Some(p) = self.processor.get().and_then(Weak::upgrade) {
                p.stop_processing();
            }
            Ok(r#"{"bullets": ["a"], "category": "Cloud", "relevancy_score": 90, "author": "X"}"#.into())
        }
    }

    #[tokio::test]
    async fn stop_request_ends_the_run_after_current_article() {
        let now = OffsetDateTime::now_utc();
        let file = write_feed(&[
            item("One", "https://wire.example/1", None, now),
            item("Two", "https://wire.example/2", None, now),
            item("Three", "https://wire.example/3", None, now),
        ]);
        let (_dir, pool) = setup(&file, true).await;
        let model = Arc::new(StoppingModel {
            processor: OnceLock::new(),
        });
        let p = Arc::new(processor(pool.clone(), model.clone()));
        let _ = model.processor.set(Arc::downgrade(&p));

        let outcome = p.process_feeds().await;
        assert_eq!(outcome, ProcessOutcome::Stopped { saved: 1 });
        assert_eq!(outcome.to_string(), "Processing stopped by user. Saved 1 articles.");
        assert!(!p.is_processing());
        assert_eq!(ArticleRepository::count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn scheduled_job_runs_the_pipeline() {
        let file = write_feed(&[]);
        let (_dir, pool) = setup(&file, true).await;
        let p = Arc::new(processor(pool, Arc::new(ScriptedModel::always("{}"))));
        let job = RssSummaryJob::new(Arc::clone(&p));
        assert_eq!(job.name(), "RSS Summary");
        assert_eq!(
            job.execute().await.unwrap(),
            "Processed 0 relevant articles from 0 entries"
        );

        assert!(p.spawn_refresh());
        // Either still running or already done; a second claim must not double-run.
        let _ = p.spawn_refresh();
        for _ in 0..50 {
            if !p.is_processing() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!p.is_processing());
    }
}
