use regex::Regex;
use std::sync::LazyLock;

static ANSI_CSI: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1B\[[0-9;?]*[ -/]*[@-~]").ok());

// Strip ANSI escape sequences and control chars from untrusted feed text,
// collapse newlines/tabs to spaces and cap the result at `max_chars`.
pub fn sanitize_line(s: &str, max_chars: usize) -> String {
    let no_ansi = match ANSI_CSI.as_ref() {
        Some(r) => r.replace_all(s, "").into_owned(),
        None => s.to_string(),
    };

    let mut cleaned = String::with_capacity(no_ansi.len());
    for ch in no_ansi.chars() {
        match ch {
            '\n' | '\r' | '\t' => cleaned.push(' '),
            c if c >= ' ' && c != '\x7f' => cleaned.push(c),
            _ => {}
        }
    }

    truncate_chars(cleaned.trim(), max_chars)
}

/// Truncate on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_escape_sequences_and_controls() {
        let raw = "\x1b[31mBreaking\x1b[0m:\tmarkets\nrally\x07";
        assert_eq!(sanitize_line(raw, 200), "Breaking: markets rally");
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(sanitize_line("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
