use time::OffsetDateTime;

/// One feed item, normalised from RSS or Atom.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    /// Absolute http(s) link, `None` when the entry has no usable link.
    pub link: Option<String>,
    pub author: String,
    pub published: Option<OffsetDateTime>,
    pub content: String,
}
