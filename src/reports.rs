//! Markdown and HTML briefings of stored articles.

use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, Time};

use crate::store::{Article, ArticleRepository};
use crate::util::html::{escape, slugify};
use crate::util::sanitize::sanitize_line;

const UNCATEGORIZED: &str = "Uncategorized";
const DEFAULT_TITLE: &str = "RSS News Summary";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: Date, end: Date },
    #[error("unknown report format '{0}'")]
    UnknownFormat(String),
    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Html,
}

impl ReportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
        }
    }

    fn short_extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
        }
    }

    /// Date-range downloads are named after the form value.
    fn long_extension(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Inclusive range of UTC calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    pub fn parse(start: &str, end: &str) -> Result<Self, ReportError> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        if start > end {
            return Err(ReportError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Half-open instant bounds covering both end days.
    pub fn bounds(&self) -> (OffsetDateTime, OffsetDateTime) {
        let start = self.start.with_time(Time::MIDNIGHT).assume_utc();
        let end = self.end.with_time(Time::MIDNIGHT).assume_utc() + Duration::days(1);
        (start, end)
    }
}

fn parse_date(s: &str) -> Result<Date, ReportError> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| ReportError::InvalidDate(s.to_string()))
}

#[derive(Debug, Clone)]
pub struct Report {
    pub filename: String,
    pub content_type: &'static str,
    pub body: String,
}

pub async fn generate(
    pool: &SqlitePool,
    format: ReportFormat,
    range: Option<DateRange>,
    header: Option<&str>,
) -> Result<Report, ReportError> {
    let articles =
        ArticleRepository::list_published_between(pool, range.map(|r| r.bounds())).await?;
    let now = OffsetDateTime::now_utc();
    let title = header.unwrap_or(DEFAULT_TITLE);

    let body = match format {
        ReportFormat::Markdown => render_markdown(&articles, title, range, now),
        ReportFormat::Html => render_html(&articles, title, range, now),
    };
    tracing::info!(
        "Generated {:?} report with {} articles",
        format,
        articles.len()
    );

    Ok(Report {
        filename: filename(format, range, now),
        content_type: format.content_type(),
        body,
    })
}

pub fn filename(format: ReportFormat, range: Option<DateRange>, now: OffsetDateTime) -> String {
    match range {
        Some(r) => format!(
            "rss_summary_{}_to_{}.{}",
            r.start,
            r.end,
            format.long_extension()
        ),
        None => {
            let stamp = now
                .format(format_description!(
                    "[year][month][day]_[hour][minute][second]"
                ))
                .unwrap_or_default();
            format!("rss_summary_{stamp}.{}", format.short_extension())
        }
    }
}

/// Categories by name; within a category the store order (score desc) is kept.
fn group_by_category(articles: &[Article]) -> BTreeMap<&str, Vec<&Article>> {
    let mut groups: BTreeMap<&str, Vec<&Article>> = BTreeMap::new();
    for a in articles {
        let key = a
            .category_name
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(UNCATEGORIZED);
        groups.entry(key).or_default().push(a);
    }
    groups
}

fn display_time(t: OffsetDateTime) -> String {
    t.format(format_description!(
        "[month repr:short] [day], [year] at [hour]:[minute] UTC"
    ))
    .unwrap_or_default()
}

fn period_line(range: Option<DateRange>) -> String {
    match range {
        Some(r) => format!("{} to {}", r.start, r.end),
        None => "All stored articles".to_string(),
    }
}

pub fn render_markdown(
    articles: &[Article],
    title: &str,
    range: Option<DateRange>,
    generated: OffsetDateTime,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", sanitize_line(title, 200)));
    out.push_str(&format!("*Generated {}*\n\n", display_time(generated)));
    out.push_str(&format!("**Period:** {}  \n", period_line(range)));
    out.push_str(&format!("**Articles:** {}\n\n", articles.len()));

    if articles.is_empty() {
        out.push_str("No articles found.\n");
        return out;
    }

    for (category, items) in group_by_category(articles) {
        out.push_str(&format!("## {} ({})\n\n", category, items.len()));
        for a in items {
            out.push_str(&format!("### [{}]({})\n\n", sanitize_line(&a.title, 300), a.url));
            out.push_str(&format!(
                "- **Source:** {}\n- **Author:** {}\n- **Published:** {}\n- **Relevancy:** {}/100\n\n",
                a.feed_name.as_deref().unwrap_or("Unknown"),
                a.author.as_deref().unwrap_or("Unknown"),
                display_time(a.published_at),
                a.relevancy_score
            ));
            if !a.summary.trim().is_empty() {
                out.push_str(a.summary.trim());
                out.push_str("\n\n");
            }
            out.push_str("---\n\n");
        }
    }
    out
}

pub fn render_html(
    articles: &[Article],
    title: &str,
    range: Option<DateRange>,
    generated: OffsetDateTime,
) -> String {
    let title = escape(title);
    let mut out = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: -apple-system, "Segoe UI", Roboto, sans-serif; max-width: 960px; margin: 2rem auto; color: #222; }}
h2 {{ border-bottom: 3px solid #ddd; padding-bottom: .3rem; }}
.article {{ margin: 1rem 0 1.5rem; }}
.meta {{ color: #666; font-size: .9rem; }}
.score {{ font-weight: bold; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p class="meta">Generated {generated} &middot; {period} &middot; {count} articles</p>
"#,
        generated = display_time(generated),
        period = escape(&period_line(range)),
        count = articles.len(),
    );

    if articles.is_empty() {
        out.push_str("<p>No articles found.</p>\n");
    }

    for (category, items) in group_by_category(articles) {
        let color = items
            .first()
            .and_then(|a| a.category_color.as_deref())
            .unwrap_or("#6c757d");
        out.push_str(&format!(
            "<section id=\"{}\">\n<h2 style=\"border-color: {}\">{} ({})</h2>\n",
            slugify(category),
            escape(color),
            escape(category),
            items.len()
        ));
        for a in items {
            out.push_str("<div class=\"article\">\n");
            out.push_str(&format!(
                "<h3><a href=\"{}\">{}</a></h3>\n",
                escape(&a.url),
                escape(&a.title)
            ));
            out.push_str(&format!(
                "<p class=\"meta\">{} &middot; {} &middot; {} &middot; <span class=\"score\">{}/100</span></p>\n",
                escape(a.feed_name.as_deref().unwrap_or("Unknown")),
                escape(a.author.as_deref().unwrap_or("Unknown")),
                display_time(a.published_at),
                a.relevancy_score
            ));
            let bullets: Vec<&str> = a
                .summary
                .lines()
                .map(|l| l.trim().trim_start_matches('•').trim())
                .filter(|l| !l.is_empty())
                .collect();
            if !bullets.is_empty() {
                out.push_str("<ul>\n");
                for b in bullets {
                    out.push_str(&format!("<li>{}</li>\n", escape(b)));
                }
                out.push_str("</ul>\n");
            }
            out.push_str("</div>\n");
        }
        out.push_str("</section>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn article(title: &str, category: Option<&str>, score: i64) -> Article {
        Article {
            id: 1,
            title: title.into(),
            url: format!("https://example.com/{}", slugify(title)),
            content: String::new(),
            summary: "• First point\n• Second <point>".into(),
            author: Some("Jane".into()),
            feed_id: None,
            feed_name: Some("Wire".into()),
            published_at: datetime!(2026-05-01 10:30 UTC),
            created_at: datetime!(2026-05-01 11:00 UTC),
            category_name: category.map(str::to_string),
            category_color: Some("#ff0000".into()),
            relevancy_score: score,
            user_feedback: None,
        }
    }

    #[test]
    fn date_ranges_are_validated() {
        let r = DateRange::parse("2026-05-01", "2026-05-03").unwrap();
        let (start, end) = r.bounds();
        assert_eq!(start, datetime!(2026-05-01 00:00 UTC));
        assert_eq!(end, datetime!(2026-05-04 00:00 UTC));

        assert!(DateRange::parse("2026-05-01", "2026-05-01").is_ok());
        assert!(matches!(
            DateRange::parse("2026-05-03", "2026-05-01"),
            Err(ReportError::InvertedRange { .. })
        ));
        assert!(matches!(
            DateRange::parse("05/01/2026", "2026-05-03"),
            Err(ReportError::InvalidDate(_))
        ));
    }

    #[test]
    fn download_names() {
        let now = datetime!(2026-05-01 07:08:09 UTC);
        assert_eq!(
            filename(ReportFormat::Markdown, None, now),
            "rss_summary_20260501_070809.md"
        );
        let range = DateRange {
            start: date!(2026 - 04 - 01),
            end: date!(2026 - 04 - 30),
        };
        assert_eq!(
            filename(ReportFormat::Markdown, Some(range), now),
            "rss_summary_2026-04-01_to_2026-04-30.markdown"
        );
        assert_eq!(
            filename("HTML".parse().unwrap(), Some(range), now),
            "rss_summary_2026-04-01_to_2026-04-30.html"
        );
        assert!("pdf".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn markdown_groups_by_category_name() {
        let articles = [
            article("Zeta", Some("Security"), 90),
            article("Alpha", Some("Cloud"), 80),
            article("Loose", None, 70),
        ];
        let md = render_markdown(&articles, "Briefing", None, datetime!(2026-05-02 00:00 UTC));

        let cloud = md.find("## Cloud (1)").unwrap();
        let security = md.find("## Security (1)").unwrap();
        let uncategorized = md.find("## Uncategorized (1)").unwrap();
        assert!(cloud < security && security < uncategorized);
        assert!(md.contains("### [Alpha](https://example.com/alpha)"));
        assert!(md.contains("- **Published:** May 01, 2026 at 10:30 UTC"));
        assert!(md.contains("• First point"));
    }

    #[test]
    fn html_escapes_and_lists_bullets() {
        let articles = [article("Tom & Jerry", Some("AI News"), 88)];
        let html = render_html(&articles, "Briefing", None, datetime!(2026-05-02 00:00 UTC));
        assert!(html.contains("<section id=\"ai-news\">"));
        assert!(html.contains("Tom &amp; Jerry"));
        assert!(html.contains("<li>Second &lt;point&gt;</li>"));
        assert!(html.contains("88/100"));
    }

    #[test]
    fn empty_reports_say_so() {
        let md = render_markdown(&[], "Briefing", None, datetime!(2026-05-02 00:00 UTC));
        assert!(md.contains("No articles found."));
        let html = render_html(&[], "Briefing", None, datetime!(2026-05-02 00:00 UTC));
        assert!(html.contains("No articles found."));
    }
}
