//! Daily AI-curated news briefing: feed polling, LLM analysis, SQLite storage
//! and a small web console.

pub mod analysis;
pub mod aws;
pub mod config;
pub mod llm;
pub mod news;
pub mod open_url;
pub mod processor;
pub mod reports;
pub mod scheduler;
pub mod store;
pub mod util;
pub mod web;
