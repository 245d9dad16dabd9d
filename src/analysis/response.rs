use serde_json::{Map, Value};
use std::collections::HashSet;

use super::AnalysisError;

/// Fields the model was asked for, normalised.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub bullets: Vec<String>,
    pub summary: String,
    pub category: String,
    pub relevancy_score: i64,
    pub author: String,
}

pub fn parse_reply(text: &str) -> Result<ModelReply, AnalysisError> {
    let candidate = extract_json(text);
    let value: Value = match serde_json::from_str(candidate) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("JSON decode error: {}. Attempting to fix common issues...", e);
            let relaxed = relax_json(candidate);
            match serde_json::from_str(&relaxed) {
                Ok(v) => {
                    tracing::info!("JSON parsing recovered after cleanup");
                    v
                }
                Err(_) => {
                    let preview: String = relaxed.chars().take(200).collect();
                    tracing::error!("Failed to parse JSON even after cleanup: {}", preview);
                    return Err(AnalysisError::MalformedResponse(preview));
                }
            }
        }
    };

    let Value::Object(obj) = value else {
        return Err(AnalysisError::MalformedResponse(
            "model reply is not a JSON object".into(),
        ));
    };

    let (bullets, summary) = match obj.get("bullets") {
        Some(Value::Array(items)) => {
            let bullets = clean_bullets(items);
            let summary = bullets
                .iter()
                .map(|b| format!("• {b}"))
                .collect::<Vec<_>>()
                .join("\n");
            (bullets, summary)
        }
        Some(Value::String(s)) => (Vec::new(), s.clone()),
        Some(other) => (Vec::new(), other.to_string()),
        None => (Vec::new(), String::new()),
    };

    Ok(ModelReply {
        bullets,
        summary,
        category: string_field(&obj, "category"),
        relevancy_score: coerce_score(obj.get("relevancy_score")),
        author: string_field(&obj, "author"),
    })
}

/// Slice from the first `{` to the last `}` so chatty preambles are ignored.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn relax_json(s: &str) -> String {
    s.replace('\'', "\"")
        .replace('\n', " ")
        .replace("  ", " ")
}

/// Strip bullet markers, drop blanks and near-duplicates (case and quotes ignored).
pub fn clean_bullets(items: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();
    for item in items {
        let raw = match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let mut text = raw.trim();
        if let Some(rest) = text.strip_prefix('•') {
            text = rest.trim();
        } else if let Some(rest) = text.strip_prefix('-') {
            text = rest.trim();
        }
        let normalized = text
            .to_lowercase()
            .replace(['"', '\''], "")
            .trim()
            .to_string();
        if !normalized.is_empty() && seen.insert(normalized) {
            cleaned.push(text.to_string());
        }
    }
    cleaned
}

/// Integers, floats and numeric strings are accepted; result is clamped to 0-100.
pub fn coerce_score(value: Option<&Value>) -> i64 {
    let raw = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
                .unwrap_or(0)
        }
        _ => 0,
    };
    raw.clamp(0, 100)
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
