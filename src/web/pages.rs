//! Server-rendered HTML.

use std::collections::HashMap;
use std::fmt::Write as _;
use time::OffsetDateTime;
use time::macros::format_description;

use super::flash::{FlashMessage, Level};
use crate::llm::{DEFAULT_MODEL, LlmProvider, LlmSettings};
use crate::store::{Article, Category, Feed, Topic};
use crate::util::html::{escape, slugify};

const DEFAULT_TITLE: &str = "AI News Briefing";
const FALLBACK_COLOR: &str = "#6c757d";

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; margin: 0; background: #f5f6f8; color: #222; }
header { background: #1f2933; color: #fff; padding: .8rem 1.5rem; display: flex; align-items: center; gap: 1.5rem; }
header a { color: #cbd2d9; text-decoration: none; }
header a.active, header a:hover { color: #fff; }
main { max-width: 1100px; margin: 1.5rem auto; padding: 0 1rem; }
.flash { padding: .6rem 1rem; border-radius: 4px; margin-bottom: .6rem; background: #e3f2fd; }
.flash.error { background: #fde8e8; color: #9b1c1c; }
.card { background: #fff; border-radius: 6px; padding: 1rem 1.2rem; margin-bottom: 1rem; box-shadow: 0 1px 2px rgba(0,0,0,.08); border-left: 5px solid var(--cat, #6c757d); }
.meta { color: #666; font-size: .85rem; }
.badge { display: inline-block; padding: .1rem .5rem; border-radius: 10px; color: #fff; font-size: .8rem; }
.summary { white-space: pre-line; margin: .6rem 0; }
table { width: 100%; border-collapse: collapse; background: #fff; }
th, td { text-align: left; padding: .5rem; border-bottom: 1px solid #e4e7eb; vertical-align: top; }
form.inline { display: inline; }
.tabs a { margin-right: 1rem; }
.inactive { opacity: .55; }
#progress { display: none; margin-bottom: 1rem; }
#progress.visible { display: block; }
"#;

const DASHBOARD_JS: &str = r#"
(function () {
  const list = document.getElementById('articles');
  const progress = document.getElementById('progress');
  const progressText = document.getElementById('progress-text');
  let lastId = Number(list.dataset.maxId || 0);
  let polling = null;

  function escapeHtml(s) {
    return String(s == null ? '' : s).replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#x27;'}[c]));
  }

  function card(a) {
    const el = document.createElement('article');
    el.className = 'card';
    el.dataset.id = a.id;
    el.style.setProperty('--cat', a.category_color);
    el.innerHTML =
      '<h3><a href="' + escapeHtml(a.url) + '" target="_blank" rel="noopener">' + escapeHtml(a.title) + '</a></h3>' +
      '<div class="meta"><span class="badge" style="background:' + escapeHtml(a.category_color) + '">' +
      escapeHtml(a.category_name) + '</span> ' + escapeHtml(a.feed_name) + ' &middot; ' + escapeHtml(a.author) +
      ' &middot; ' + escapeHtml(a.published_date) + ' &middot; score ' + a.relevancy_score + '</div>' +
      '<div class="summary">' + escapeHtml(a.summary) + '</div>';
    return el;
  }

  async function fetchNew() {
    const resp = await fetch('/get_new_articles?since_id=' + lastId, {cache: 'no-store'});
    if (!resp.ok) return;
    const data = await resp.json();
    if (!data.articles.length) return;
    requestAnimationFrame(() => {
      const empty = document.getElementById('empty');
      if (empty) empty.remove();
      for (const a of data.articles) {
        if (list.querySelector('[data-id="' + a.id + '"]')) continue;
        list.prepend(card(a));
        lastId = Math.max(lastId, a.id);
      }
    });
  }

  async function poll() {
    const resp = await fetch('/processing_status', {cache: 'no-store'});
    if (!resp.ok) return;
    const s = await resp.json();
    requestAnimationFrame(() => {
      progress.classList.toggle('visible', s.processing);
      progressText.textContent = s.processing
        ? 'Processing ' + s.processed + '/' + s.total + ' (saved ' + s.saved + ') ' + s.current_article
        : '';
    });
    await fetchNew();
    if (!s.processing && polling) {
      clearInterval(polling);
      polling = null;
    }
  }

  function startPolling() {
    if (!polling) polling = setInterval(poll, 2000);
    poll();
  }

  async function call(url, options) {
    const resp = await fetch(url, options);
    const data = await resp.json().catch(() => ({}));
    if (!resp.ok) alert(data.message || ('Request failed: ' + resp.status));
    return {ok: resp.ok, data};
  }

  document.getElementById('refresh').addEventListener('click', async () => {
    const r = await call('/refresh_news');
    if (r.ok) startPolling();
  });
  document.getElementById('stop').addEventListener('click', () => call('/stop_processing'));
  document.getElementById('clear').addEventListener('click', async () => {
    if (!confirm('Delete all stored articles?')) return;
    const r = await call('/clear_all_news');
    if (r.ok) location.reload();
  });

  list.addEventListener('click', async (e) => {
    const target = e.target;
    const cardEl = target.closest('.card');
    if (!cardEl) return;
    const id = cardEl.dataset.id;
    if (target.dataset.rate !== undefined) {
      await call('/rate_article/' + id, {
        method: 'POST',
        headers: {'Content-Type': 'application/json'},
        body: JSON.stringify({feedback: Number(target.dataset.rate)})
      });
    } else if (target.classList.contains('edit')) {
      const summary = cardEl.querySelector('.summary');
      const text = prompt('Edit summary', summary.textContent);
      if (text === null) return;
      const r = await call('/update_summary/' + id, {
        method: 'POST',
        headers: {'Content-Type': 'application/json'},
        body: JSON.stringify({summary: text})
      });
      if (r.ok) requestAnimationFrame(() => { summary.textContent = text; });
    }
  });

  if (list.dataset.processing === 'true') startPolling();
})();
"#;

const SCHEDULER_JS: &str = r#"
document.getElementById('run-now').addEventListener('click', function (e) {
  if (!confirm('Run the RSS summary now? This may take a while.')) e.preventDefault();
});
"#;

fn short_time(t: OffsetDateTime) -> String {
    t.format(format_description!(
        "[month repr:short] [day], [year] at [hour]:[minute]"
    ))
    .unwrap_or_default()
}

fn layout(
    title: Option<&str>,
    active: Option<&str>,
    flashes: &[FlashMessage],
    body: &str,
    script: Option<&str>,
) -> String {
    let title = escape(title.unwrap_or(DEFAULT_TITLE));
    let nav = [("/", "Dashboard", "dashboard"), ("/admin/feeds", "Admin", "admin")]
        .iter()
        .map(|(href, label, key)| {
            let class = if Some(*key) == active { " class=\"active\"" } else { "" };
            format!("<a href=\"{href}\"{class}>{label}</a>")
        })
        .collect::<Vec<_>>()
        .join("");

    let mut notices = String::new();
    for f in flashes {
        let class = match f.level {
            Level::Info => "flash",
            Level::Error => "flash error",
        };
        let _ = writeln!(notices, "<div class=\"{class}\">{}</div>", escape(&f.text));
    }

    let script = script
        .map(|s| format!("<script>{s}</script>"))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<header><strong>{title}</strong>{nav}</header>
<main>
{notices}{body}
</main>
{script}
</body>
</html>
"#
    )
}

fn admin_tabs(active: &str) -> String {
    let tabs = [
        ("feeds", "Feeds"),
        ("topics", "Topics"),
        ("categories", "Categories"),
        ("llm", "LLM"),
        ("scheduler", "Scheduler"),
    ];
    let mut out = String::from("<nav class=\"tabs\">");
    for (key, label) in tabs {
        if key == active {
            let _ = write!(out, "<strong>{label}</strong> ");
        } else {
            let _ = write!(out, "<a href=\"/admin/{key}\">{label}</a>");
        }
    }
    out.push_str("</nav><hr>");
    out
}

fn row_class(active: bool) -> &'static str {
    if active { "" } else { " class=\"inactive\"" }
}

fn toggle_label(active: bool) -> &'static str {
    if active { "Disable" } else { "Enable" }
}

pub struct DashboardView<'a> {
    pub articles: &'a [Article],
    pub categories: &'a [Category],
    pub category_stats: &'a [(String, usize)],
    pub total_articles: i64,
    pub last_refresh: Option<OffsetDateTime>,
    pub processing: bool,
}

pub fn dashboard(view: &DashboardView<'_>, header: Option<&str>, flashes: &[FlashMessage]) -> String {
    let mut body = String::new();
    let last = view
        .last_refresh
        .map(|t| format!("{} UTC", short_time(t)))
        .unwrap_or_else(|| "never".into());
    let _ = write!(
        body,
        r#"<section>
<p class="meta">{} articles stored &middot; last refresh {}</p>
<button id="refresh">Refresh News</button>
<button id="stop">Stop</button>
<button id="clear">Clear All</button>
<a href="/generate_markdown">Markdown</a> | <a href="/generate_html">HTML</a>
</section>
<div id="progress"><progress></progress> <span id="progress-text"></span></div>
"#,
        view.total_articles,
        escape(&last)
    );

    body.push_str("<p>");
    for c in view.categories {
        let count = view
            .category_stats
            .iter()
            .find(|(name, _)| *name == c.name)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        let _ = write!(
            body,
            "<a class=\"badge\" style=\"background:{}\" href=\"#{}\">{} ({})</a> ",
            escape(&c.color),
            slugify(&c.name),
            escape(&c.name),
            count
        );
    }
    body.push_str("</p>\n");

    let max_id = view.articles.iter().map(|a| a.id).max().unwrap_or(0);
    let _ = writeln!(
        body,
        "<div id=\"articles\" data-max-id=\"{max_id}\" data-processing=\"{}\">",
        view.processing
    );
    if view.articles.is_empty() {
        body.push_str("<p id=\"empty\">No articles yet. Use Refresh News to fetch the latest.</p>\n");
    }
    let mut anchored: Vec<&str> = Vec::new();
    for a in view.articles {
        let category = a.category_name.as_deref().unwrap_or("");
        let color = a.category_color.as_deref().unwrap_or(FALLBACK_COLOR);
        let anchor = if !category.is_empty() && !anchored.contains(&category) {
            anchored.push(category);
            format!(" id=\"{}\"", slugify(category))
        } else {
            String::new()
        };
        let feedback = match a.user_feedback {
            Some(1) => " (liked)",
            Some(-1) => " (disliked)",
            _ => "",
        };
        let _ = write!(
            body,
            r#"<article class="card"{anchor} data-id="{id}" style="--cat: {color}">
<h3><a href="{url}" target="_blank" rel="noopener">{title}</a></h3>
<div class="meta"><span class="badge" style="background:{color}">{category}</span> {feed} &middot; {author} &middot; {published} &middot; score {score}{feedback}</div>
<div class="summary">{summary}</div>
<button data-rate="1">Like</button> <button data-rate="-1">Dislike</button> <button data-rate="0">Reset</button> <button class="edit">Edit summary</button>
</article>
"#,
            id = a.id,
            color = escape(color),
            url = escape(&a.url),
            title = escape(&a.title),
            category = escape(category),
            feed = escape(a.feed_name.as_deref().unwrap_or("Unknown")),
            author = escape(a.author.as_deref().unwrap_or("Unknown")),
            published = short_time(a.published_at),
            score = a.relevancy_score,
            summary = escape(&a.summary),
        );
    }
    body.push_str("</div>\n");

    layout(header, Some("dashboard"), flashes, &body, Some(DASHBOARD_JS))
}

pub fn admin_feeds(feeds: &[Feed], header: Option<&str>, flashes: &[FlashMessage]) -> String {
    let mut body = admin_tabs("feeds");
    body.push_str(
        r#"<h2>Add feed</h2>
<form method="post" action="/add_feed">
<input name="name" placeholder="Name" required>
<input name="url" placeholder="https://example.com/rss" required size="50">
<input name="access_key" placeholder="Access key (optional)">
<button>Add</button>
</form>
<h2>Feeds</h2>
<table><tr><th>Name</th><th>URL</th><th>Key</th><th></th></tr>
"#,
    );
    for f in feeds {
        let _ = writeln!(
            body,
            "<tr{}><td>{}</td><td>{}</td><td>{}</td><td><a href=\"/toggle_feed/{id}\">{}</a> <a href=\"/delete_feed/{id}\">Delete</a></td></tr>",
            row_class(f.active),
            escape(&f.name),
            escape(&f.url),
            if f.access_key.is_some() { "yes" } else { "" },
            toggle_label(f.active),
            id = f.id,
        );
    }
    body.push_str("</table>\n");
    layout(header, Some("admin"), flashes, &body, None)
}

fn category_options(categories: &[Category], selected: Option<i64>) -> String {
    let mut out = String::from("<option value=\"\">(none)</option>");
    for c in categories {
        let sel = if Some(c.id) == selected { " selected" } else { "" };
        let _ = write!(out, "<option value=\"{}\"{sel}>{}</option>", c.id, escape(&c.name));
    }
    out
}

pub fn admin_topics(
    topics: &[Topic],
    categories: &[Category],
    header: Option<&str>,
    flashes: &[FlashMessage],
) -> String {
    let mut body = admin_tabs("topics");
    let _ = write!(
        body,
        r#"<h2>Add topic</h2>
<form method="post" action="/add_topic">
<input name="name" placeholder="Topic" required>
<input name="keywords" placeholder="keyword, keyword" required size="50">
<select name="category_id">{}</select>
<button>Add</button>
</form>
<h2>Topics</h2>
<table><tr><th>Topic</th><th>Keywords</th><th>Category</th><th></th></tr>
"#,
        category_options(categories, None)
    );
    for t in topics {
        let _ = writeln!(
            body,
            r#"<tr{}><td colspan="3"><form method="post" action="/edit_topic/{id}">
<input name="name" value="{}" required> <input name="keywords" value="{}" size="40" required>
<select name="category_id">{}</select> <button>Save</button></form></td>
<td><a href="/toggle_topic/{id}">{}</a> <a href="/delete_topic/{id}">Delete</a></td></tr>"#,
            row_class(t.active),
            escape(&t.name),
            escape(&t.keywords),
            category_options(categories, t.category_id),
            toggle_label(t.active),
            id = t.id,
        );
    }
    body.push_str("</table>\n");
    layout(header, Some("admin"), flashes, &body, None)
}

pub fn admin_categories(
    categories: &[Category],
    header: Option<&str>,
    flashes: &[FlashMessage],
) -> String {
    let mut body = admin_tabs("categories");
    body.push_str(
        r##"<h2>Add category</h2>
<form method="post" action="/add_category">
<input name="name" placeholder="Name" required>
<input name="description" placeholder="Description" size="40">
<input name="color" type="color" value="#007bff">
<button>Add</button>
</form>
<h2>Categories</h2>
<table><tr><th>Category</th><th></th></tr>
"##,
    );
    for c in categories {
        let _ = writeln!(
            body,
            r#"<tr{}><td><form method="post" action="/edit_category/{id}">
<input name="name" value="{}" required> <input name="description" value="{}" size="40">
<input name="color" type="color" value="{}"> <button>Save</button></form></td>
<td><a href="/toggle_category/{id}">{}</a> <a href="/delete_category/{id}">Delete</a></td></tr>"#,
            row_class(c.active),
            escape(&c.name),
            escape(&c.description),
            escape(&c.color),
            toggle_label(c.active),
            id = c.id,
        );
    }
    body.push_str("</table>\n");
    layout(header, Some("admin"), flashes, &body, None)
}

pub fn admin_llm(
    config: &HashMap<String, String>,
    threshold: i64,
    environment: &str,
    header: Option<&str>,
    flashes: &[FlashMessage],
) -> String {
    let settings = LlmSettings::from_config(config);
    let mut body = admin_tabs("llm");
    let provider_options: String = [
        (LlmProvider::BedrockIam, "AWS Bedrock (IAM role / profile)"),
        (LlmProvider::BedrockApi, "AWS Bedrock (API key)"),
        (LlmProvider::Custom, "Custom OpenAI-compatible"),
    ]
    .iter()
    .map(|(p, label)| {
        let sel = if *p == settings.provider { " selected" } else { "" };
        format!("<option value=\"{}\"{sel}>{label}</option>", p.as_str())
    })
    .collect();
    let (bedrock_model, custom_model) = if settings.provider.is_bedrock() {
        (settings.model.as_str(), "")
    } else {
        (DEFAULT_MODEL, settings.model.as_str())
    };

    let _ = write!(
        body,
        r#"<h2>Language model</h2>
<p class="meta">Credentials: {environment}</p>
<form method="post" action="/update_llm_config">
<p><label>Provider <select name="llm_provider">{provider_options}</select></label></p>
<p><label>Bedrock model id <input name="llm_model" value="{bedrock_model}" size="50"></label></p>
<p><label>Custom model <input name="llm_model_custom" value="{custom_model}"></label></p>
<p><label>API key <input name="llm_api_key" type="password" value="{api_key}"></label></p>
<p><label>API base URL <input name="llm_api_base" value="{api_base}" size="40"></label></p>
<button>Save</button>
</form>
<p><button id="test">Test Bedrock connection</button></p>
<pre id="test-result"></pre>
<h2>Processing</h2>
<form method="post" action="/update_processing_settings">
<label>Relevancy threshold (0-100) <input name="relevancy_threshold" type="number" min="0" max="100" value="{threshold}"></label>
<button>Save</button>
</form>
"#,
        environment = escape(environment),
        bedrock_model = escape(bedrock_model),
        custom_model = escape(custom_model),
        api_key = escape(&settings.api_key),
        api_base = escape(&settings.api_base),
    );

    let script = r#"
document.getElementById('test').addEventListener('click', async () => {
  const out = document.getElementById('test-result');
  out.textContent = 'Testing...';
  const model = document.querySelector('input[name=llm_model]').value;
  const resp = await fetch('/test_bedrock_connection', {
    method: 'POST',
    headers: {'Content-Type': 'application/json'},
    body: JSON.stringify({model_id: model})
  });
  const data = await resp.json().catch(() => ({message: 'Request failed: ' + resp.status}));
  requestAnimationFrame(() => { out.textContent = data.message; });
});
"#;
    layout(header, Some("admin"), flashes, &body, Some(script))
}

pub struct SchedulerView {
    pub next_run: Option<OffsetDateTime>,
    pub is_running: bool,
    pub current_time: String,
    pub processing: bool,
}

pub fn admin_scheduler(view: &SchedulerView, header: Option<&str>, flashes: &[FlashMessage]) -> String {
    let mut body = admin_tabs("scheduler");
    let next = view
        .next_run
        .map(short_time)
        .unwrap_or_else(|| "Not scheduled".into());
    let _ = write!(
        body,
        r#"<h2>Daily RSS summary</h2>
<p>Scheduler: {status} &middot; next run: {next}{busy}</p>
<form method="post" action="/update_schedule">
<label>Run daily at <input name="time" type="time" value="{time}" required></label>
<button>Update</button>
</form>
<p><a id="run-now" href="/run_scheduler_now">Run now</a></p>
<h2>Reports</h2>
<form method="post" action="/generate_date_range_report">
<input name="start_date" type="date" required> to <input name="end_date" type="date" required>
<select name="format"><option value="markdown">Markdown</option><option value="html">HTML</option></select>
<button>Download</button>
</form>
"#,
        status = if view.is_running { "running" } else { "stopped" },
        next = escape(&next),
        busy = if view.processing { " &middot; processing now" } else { "" },
        time = escape(&view.current_time),
    );
    layout(header, Some("admin"), flashes, &body, Some(SCHEDULER_JS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::category;
    use time::macros::datetime;

    fn article() -> Article {
        Article {
            id: 42,
            title: "<script>alert(1)</script>".into(),
            url: "https://example.com/x".into(),
            content: String::new(),
            summary: "• point".into(),
            author: None,
            feed_id: None,
            feed_name: None,
            published_at: datetime!(2026-05-01 10:30 UTC),
            created_at: datetime!(2026-05-01 10:31 UTC),
            category_name: Some("Cloud News".into()),
            category_color: Some("#ff0000".into()),
            relevancy_score: 77,
            user_feedback: Some(1),
        }
    }

    #[test]
    fn dashboard_escapes_titles_and_anchors_categories() {
        let articles = [article()];
        let categories = [category(1, "Cloud News")];
        let stats = [("Cloud News".to_string(), 1)];
        let html = dashboard(
            &DashboardView {
                articles: &articles,
                categories: &categories,
                category_stats: &stats,
                total_articles: 1,
                last_refresh: Some(datetime!(2026-05-01 10:31 UTC)),
                processing: false,
            },
            None,
            &[FlashMessage::info("hello")],
        );
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("id=\"cloud-news\""));
        assert!(html.contains("href=\"#cloud-news\""));
        assert!(html.contains("Cloud News (1)"));
        assert!(html.contains("data-max-id=\"42\""));
        assert!(html.contains("May 01, 2026 at 10:31 UTC"));
        assert!(html.contains("<div class=\"flash\">hello</div>"));
        assert!(html.contains("requestAnimationFrame"));
    }

    #[test]
    fn scheduler_page_shows_current_time() {
        let html = admin_scheduler(
            &SchedulerView {
                next_run: None,
                is_running: true,
                current_time: "07:30".into(),
                processing: false,
            },
            Some("Briefing"),
            &[],
        );
        assert!(html.contains("value=\"07:30\""));
        assert!(html.contains("Not scheduled"));
        assert!(html.contains("<title>Briefing</title>"));
    }
}
