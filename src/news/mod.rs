//! RSS/Atom retrieval.

mod fetch;
mod model;

pub use fetch::FeedFetcher;
pub use model::FeedEntry;
