//! Recovering JSON documents from model output
//!
//! Models asked for JSON frequently wrap it in markdown fences or surround it
//! with prose. [`extract_json`] tries, in order: the whole text, the first
//! fenced block, then the outermost bracketed span.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").expect("fenced block pattern is valid")
});

/// Parse the JSON document embedded in `text`, if there is one.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(value) = FENCED_BLOCK
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|inner| serde_json::from_str::<Value>(inner.as_str()).ok())
    {
        return Some(value);
    }

    bracketed_span(trimmed)
}

fn bracketed_span(text: &str) -> Option<Value> {
    let object = text.find('{');
    let array = text.find('[');

    let order: [(char, char); 2] = match (object, array) {
        (Some(o), Some(a)) if a < o => [('[', ']'), ('{', '}')],
        _ => [('{', '}'), ('[', ']')],
    };

    order.iter().find_map(|(open, close)| {
        let start = text.find(*open)?;
        let end = text.rfind(*close)?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<Value>(&text[start..=end]).ok()
    })
}
