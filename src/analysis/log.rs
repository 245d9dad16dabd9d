//! The per-article relevance log block.
//!
//! Operators grep these lines to see what was sent to the model and why an
//! article was kept or dropped, so the layout is stable.

use crate::store::{Category, Topic};

use super::ArticleAnalysis;
use super::prompt::CONTENT_LIMIT;

const TARGET: &str = "relevance";

fn rule() -> String {
    "=".repeat(80)
}

pub(super) fn inputs(
    title: &str,
    url: &str,
    content: &str,
    categories: &[Category],
    topics: &[Topic],
    model_id: &str,
) {
    let category_names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    tracing::info!(target: TARGET, "{}", rule());
    tracing::info!(target: TARGET, "KEYWORD & RELEVANCE ANALYSIS LOG");
    tracing::info!(target: TARGET, "{}", rule());
    tracing::info!(target: TARGET, "Article Title: {}", title);
    tracing::info!(target: TARGET, "Article URL: {}", url);
    tracing::info!(
        target: TARGET,
        "Content Length: {} characters (using first {} for analysis)",
        content.chars().count(),
        CONTENT_LIMIT
    );
    tracing::info!(target: TARGET, "Available Categories: {:?}", category_names);

    if topics.is_empty() {
        tracing::info!(target: TARGET, "No topics configured - relevance will be based on categories only");
    } else {
        tracing::info!(target: TARGET, "Active Topics Count: {}", topics.len());
        tracing::info!(target: TARGET, "KEYWORDS BEING USED FOR RELEVANCE:");
        for topic in topics {
            tracing::info!(target: TARGET, "  Topic: '{}'", topic.name);
            tracing::info!(target: TARGET, "    Keywords: {}", topic.keywords);
        }
    }
    tracing::info!(target: TARGET, "AI Model: {}", model_id);
}

pub(super) fn prompt(prompt_len: usize, content: &str, has_topics: bool) {
    tracing::info!(target: TARGET, "PROMPT CONTEXT SENT TO AI:");
    tracing::info!(target: TARGET, "  Prompt length: {} characters", prompt_len);
    tracing::info!(
        target: TARGET,
        "  Article content included: {} characters",
        content.chars().count().min(CONTENT_LIMIT)
    );
    tracing::info!(
        target: TARGET,
        "  Topics/Keywords included: {}",
        if has_topics { "Yes" } else { "No" }
    );
}

pub(super) fn raw_response(raw: &str) {
    tracing::info!(target: TARGET, "AI RESPONSE RECEIVED:");
    tracing::info!(target: TARGET, "  Raw response: {}", raw);
}

pub(super) fn result(analysis: &ArticleAnalysis) {
    tracing::info!(target: TARGET, "RELEVANCE CALCULATION RESULTS:");
    tracing::info!(target: TARGET, "  Assigned Category: '{}'", analysis.category);
    tracing::info!(target: TARGET, "  Relevancy Score: {}/100", analysis.relevancy_score);
    tracing::info!(target: TARGET, "  Extracted Author: '{}'", analysis.author);
    tracing::info!(target: TARGET, "  Summary Bullets: {} items", analysis.bullet_count);
}

/// Closes the block once the pipeline has applied the threshold.
pub fn threshold(score: i64, threshold: i64) {
    if score >= threshold {
        tracing::info!(
            target: TARGET,
            "Final Relevancy Score: {}/100 (threshold {}): kept",
            score,
            threshold
        );
    } else {
        tracing::info!(
            target: TARGET,
            "Final Relevancy Score: {}/100 (threshold {}): filtered out",
            score,
            threshold
        );
    }
    tracing::info!(target: TARGET, "{}", rule());
}
