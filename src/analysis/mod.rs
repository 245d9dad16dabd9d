//! AI article analysis: prompt construction, the model round trip and
//! normalisation of the JSON reply.

pub mod log;
mod prompt;
mod response;

pub use prompt::{CONTENT_LIMIT, build_prompt};
pub use response::{ModelReply, clean_bullets, coerce_score, extract_json, parse_reply};

use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::llm::{LanguageModel, LlmError};
use crate::store::{Category, Topic};

/// Reply budget for a full analysis.
pub const ANALYSIS_MAX_TOKENS: u32 = 1200;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis stopped")]
    Stopped,
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

pub struct ArticleInput<'a> {
    pub title: &'a str,
    pub author: &'a str,
    pub content: &'a str,
    pub url: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleAnalysis {
    /// Bullets rendered one per line as `• text`.
    pub summary: String,
    pub category: String,
    pub relevancy_score: i64,
    pub author: String,
    pub bullet_count: usize,
}

impl From<ModelReply> for ArticleAnalysis {
    fn from(reply: ModelReply) -> Self {
        Self {
            summary: reply.summary,
            category: reply.category,
            relevancy_score: reply.relevancy_score,
            author: reply.author,
            bullet_count: reply.bullets.len(),
        }
    }
}

pub async fn analyze_article(
    model: &dyn LanguageModel,
    article: &ArticleInput<'_>,
    categories: &[Category],
    topics: &[Topic],
    stop: &AtomicBool,
) -> Result<ArticleAnalysis, AnalysisError> {
    log::inputs(
        article.title,
        article.url,
        article.content,
        categories,
        topics,
        model.model_id(),
    );

    let prompt = build_prompt(
        article.title,
        article.author,
        article.content,
        categories,
        topics,
    );
    log::prompt(prompt.chars().count(), article.content, !topics.is_empty());

    if stop.load(Ordering::SeqCst) {
        tracing::info!("Stop requested before model call");
        return Err(AnalysisError::Stopped);
    }

    tracing::info!("Sending request to {}...", model.model_id());
    let raw = model.complete(&prompt, ANALYSIS_MAX_TOKENS).await.map_err(|e| {
        tracing::error!("AI analysis error: {}", e);
        e
    })?;
    log::raw_response(&raw);

    let analysis = ArticleAnalysis::from(parse_reply(&raw)?);
    log::result(&analysis);
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::store::testing::{category, topic};

    fn input() -> ArticleInput<'static> {
        ArticleInput {
            title: "Bedrock adds Claude models",
            author: "",
            content: "AWS announced new Bedrock models today. By Jane Doe.",
            url: "https://example.com/a",
        }
    }

    #[tokio::test]
    async fn analysis_returns_normalised_reply() {
        let model = ScriptedModel::always(
            r#"{"bullets": ["New models"], "category": "Cloud", "relevancy_score": "91", "author": "Jane Doe"}"#,
        );
        let stop = AtomicBool::new(false);
        let analysis = analyze_article(
            &model,
            &input(),
            &[category(1, "Cloud")],
            &[topic(1, "AWS", "bedrock")],
            &stop,
        )
        .await
        .unwrap();

        assert_eq!(analysis.summary, "• New models");
        assert_eq!(analysis.relevancy_score, 91);
        assert_eq!(analysis.author, "Jane Doe");
        assert_eq!(analysis.bullet_count, 1);

        let prompts = model.analysis_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("- AWS: bedrock"));
    }

    #[tokio::test]
    async fn stop_flag_prevents_model_call() {
        let model = ScriptedModel::always("{}");
        let stop = AtomicBool::new(true);
        let err = analyze_article(&model, &input(), &[category(1, "Cloud")], &[], &stop)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Stopped));
        assert!(model.analysis_prompts().is_empty());
    }

    #[tokio::test]
    async fn model_errors_surface_as_llm_errors() {
        let model = ScriptedModel::always("{}");
        model.push(Err(LlmError::Response("empty".into())));
        let stop = AtomicBool::new(false);
        let err = analyze_article(&model, &input(), &[category(1, "Cloud")], &[], &stop)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Llm(_)));
    }
}
