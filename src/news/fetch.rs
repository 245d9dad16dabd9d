use super::model::FeedEntry;
use feed_rs::parser;
use futures_util::StreamExt;
use reqwest::Client;
use std::{path::Path, time::Duration};
use time::OffsetDateTime;
use url::Url;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// 5 MB cap per feed body.
const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .gzip(true)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch and parse one feed. Failures are logged and yield no entries.
    pub async fn fetch(&self, url: &str, access_key: Option<&str>) -> Vec<FeedEntry> {
        let bytes = if Path::new(url).is_file() {
            match tokio::fs::read(url).await {
                Ok(b) if b.len() > MAX_FEED_BYTES => {
                    tracing::error!("Feed too large ({} bytes): {}", b.len(), url);
                    return Vec::new();
                }
                Ok(b) => b,
                Err(err) => {
                    tracing::error!("Failed to read file feed {}: {}", url, err);
                    return Vec::new();
                }
            }
        } else {
            match self.download(url, access_key).await {
                Some(b) => b,
                None => return Vec::new(),
            }
        };

        match parser::parse(&bytes[..]) {
            Ok(feed) => {
                let base = Url::parse(url).ok();
                feed.entries
                    .into_iter()
                    .map(|e| to_entry(e, base.as_ref()))
                    .collect()
            }
            Err(err) => {
                tracing::error!("Failed to parse feed {}: {}", url, err);
                Vec::new()
            }
        }
    }

    async fn download(&self, url: &str, access_key: Option<&str>) -> Option<Vec<u8>> {
        let mut req = self.client.get(url);
        if let Some(key) = access_key.map(str::trim).filter(|k| !k.is_empty()) {
            req = req.header("Authorization", key).header("API-Key", key);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(err) => {
                tracing::error!("Failed to fetch {}: {}", url, err);
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::error!("Failed to fetch {}: HTTP {}", url, resp.status());
            return None;
        }

        let mut stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(c) => {
                    if buf.len() + c.len() > MAX_FEED_BYTES {
                        tracing::error!("Feed too large (>{} bytes): {}", MAX_FEED_BYTES, url);
                        return None;
                    }
                    buf.extend_from_slice(&c);
                }
                Err(err) => {
                    tracing::error!("Failed to read body {}: {}", url, err);
                    return None;
                }
            }
        }
        Some(buf)
    }
}

fn to_entry(entry: feed_rs::model::Entry, base: Option<&Url>) -> FeedEntry {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".into());

    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| entry.links.first())
        .and_then(|l| normalize_link(&l.href, base));

    let author = entry.authors.first().map(person_name).unwrap_or_default();

    let published = entry
        .published
        .or(entry.updated)
        .and_then(|dt| OffsetDateTime::from_unix_timestamp(dt.timestamp()).ok());

    let content = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .filter(|s| !s.trim().is_empty())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    FeedEntry {
        title,
        link,
        author,
        published,
        content,
    }
}

/// feed-rs names RSS `<author>` people "author" and keeps the text in `email`.
fn person_name(person: &feed_rs::model::Person) -> String {
    let name = person.name.trim();
    let raw = if name.is_empty() || name.eq_ignore_ascii_case("author") {
        person.email.as_deref().unwrap_or_default().trim()
    } else {
        name
    };
    display_name(raw).to_string()
}

/// `jane@example.com (Jane Doe)` becomes `Jane Doe`.
fn display_name(raw: &str) -> &str {
    if let Some(inner) = raw.strip_suffix(')') {
        if let Some((_, name)) = inner.rsplit_once('(') {
            let name = name.trim();
            if !name.is_empty() {
                return name;
            }
        }
    }
    raw
}

pub(crate) fn normalize_link(candidate: &str, base: Option<&Url>) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    let resolved = match Url::parse(candidate) {
        Ok(u) => u,
        Err(_) => base?.join(candidate).ok()?,
    };
    match resolved.scheme() {
        "http" | "https" => Some(resolved.into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use time::macros::datetime;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Wire</title>
    <link>https://wire.example/</link>
    <item>
      <title>Bedrock adds a model</title>
      <link>https://wire.example/a</link>
      <author>Jane Doe</author>
      <description>Something happened.</description>
      <pubDate>Fri, 01 May 2026 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Mailbox style</title>
      <link>https://wire.example/b</link>
      <author>jane@wire.example (Jane Roe)</author>
    </item>
    <item>
      <link>javascript:alert(1)</link>
      <description>No title here.</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn links_resolve_against_base_and_reject_other_schemes() {
        let base = Url::parse("https://news.example/feed.xml").unwrap();
        assert_eq!(
            normalize_link("/story/1", Some(&base)).as_deref(),
            Some("https://news.example/story/1")
        );
        assert_eq!(normalize_link("mailto:a@b.c", Some(&base)), None);
        assert_eq!(normalize_link("relative", None), None);
        assert_eq!(normalize_link("  ", Some(&base)), None);
    }

    #[tokio::test]
    async fn reads_local_feed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RSS.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let entries = FeedFetcher::new().unwrap().fetch(&path, None).await;
        assert_eq!(entries.len(), 3);

        let first = &entries[0];
        assert_eq!(first.title, "Bedrock adds a model");
        assert_eq!(first.link.as_deref(), Some("https://wire.example/a"));
        assert_eq!(first.author, "Jane Doe");
        assert_eq!(first.published, Some(datetime!(2026-05-01 10:00 UTC)));
        assert_eq!(first.content, "Something happened.");

        assert_eq!(entries[1].author, "Jane Roe");

        assert_eq!(entries[2].title, "Untitled");
        assert_eq!(entries[2].link, None);
        assert_eq!(entries[2].published, None);
        assert_eq!(entries[2].author, "");
    }

    #[test]
    fn mailbox_authors_keep_the_display_name() {
        assert_eq!(display_name("jane@wire.example (Jane Roe)"), "Jane Roe");
        assert_eq!(display_name("jane@wire.example"), "jane@wire.example");
        assert_eq!(display_name("Odd ()"), "Odd ()");
    }

    #[tokio::test]
    async fn unreadable_feeds_yield_nothing() {
        let fetcher = FeedFetcher::new().unwrap();
        assert!(fetcher.fetch("http://127.0.0.1:9/feed.xml", None).await.is_empty());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not xml at all").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert!(fetcher.fetch(&path, None).await.is_empty());
    }
}
