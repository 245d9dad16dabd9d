use regex::Regex;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_-]+").expect("valid regex"));

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Lowercase, drop punctuation, join words with single dashes.
pub fn slugify(s: &str) -> String {
    let lowered = s.trim().to_lowercase();
    let stripped = NON_WORD.replace_all(&lowered, "");
    let dashed = SEPARATORS.replace_all(&stripped, "-");
    dashed.trim_matches('-').to_string()
}
