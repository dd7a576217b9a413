//! Source normalization and dedup
//!
//! Pure functions over executor output. Results are visited in plan order so
//! "first seen wins" gives the same sources for the same inputs every time.

use crate::types::{AgentResult, RawItem, Source, SourceType};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

const URL_KEYS: &[&str] = &["url", "link", "pdf_url"];
const TITLE_KEYS: &[&str] = &["title", "name"];
const DESCRIPTION_KEYS: &[&str] = &["description", "snippet", "abstract", "summary", "content"];

static NEW_STYLE_ARXIV_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\.\d{4,5}(v\d+)?$").expect("valid regex"));

static OLD_STYLE_ARXIV_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z\-]+(\.[A-Z]{2})?/\d{7}(v\d+)?$").expect("valid regex")
});

static ARXIV_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"arxiv\.org/(?:abs|pdf)/([^?#\s]+?)(?:\.pdf)?/?(?:[?#]|$)").expect("valid regex")
});

/// Normalize and dedup the items of every successful result.
pub fn merge(results: &[AgentResult]) -> Vec<Source> {
    let mut ordered: Vec<&AgentResult> = results.iter().filter(|r| r.is_ok()).collect();
    ordered.sort_by_key(|r| r.step_index);

    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    let mut dropped = 0usize;

    for item in ordered.iter().flat_map(|r| r.results.iter()) {
        let Some(source) = normalize(item) else {
            dropped += 1;
            continue;
        };
        if seen.insert(source.url.clone()) {
            sources.push(source);
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "Dropped result items without a url");
    }
    sources
}

/// Map an agent-specific item onto [`Source`]. `None` when there is no url to cite.
pub fn normalize(item: &RawItem) -> Option<Source> {
    let url = item.first_str(URL_KEYS)?.to_string();
    let title = item
        .first_str(TITLE_KEYS)
        .map(str::to_string)
        .unwrap_or_else(|| url.clone());
    let description = item.first_str(DESCRIPTION_KEYS).map(str::to_string);
    let arxiv_id = arxiv_id(item, &url);
    let authors = authors(item);

    Some(Source {
        source_type: if arxiv_id.is_some() {
            SourceType::Academic
        } else {
            SourceType::Web
        },
        url,
        title,
        description,
        arxiv_id,
        authors,
    })
}

fn arxiv_id(item: &RawItem, url: &str) -> Option<String> {
    if let Some(id) = item.first_str(&["arxiv_id"]) {
        return Some(id.to_string());
    }
    if let Some(id) = item.first_str(&["id"]).filter(|id| is_arxiv_id(id)) {
        return Some(id.to_string());
    }
    // Any of the url fields may point at arxiv.org.
    std::iter::once(url)
        .chain(URL_KEYS.iter().filter_map(|key| item.first_str(&[*key])))
        .find_map(arxiv_id_from_url)
}

pub fn is_arxiv_id(id: &str) -> bool {
    NEW_STYLE_ARXIV_ID.is_match(id) || OLD_STYLE_ARXIV_ID.is_match(id)
}

/// `https://arxiv.org/abs/1706.03762v5` -> `1706.03762v5`
pub fn arxiv_id_from_url(url: &str) -> Option<String> {
    ARXIV_URL
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| is_arxiv_id(id))
}

fn authors(item: &RawItem) -> Option<Vec<String>> {
    let names: Vec<String> = match item.get("authors")? {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(name) => Some(name.trim()),
                Value::Object(fields) => fields.get("name").and_then(Value::as_str).map(str::trim),
                _ => None,
            })
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        _ => return None,
    };
    (!names.is_empty()).then_some(names)
}
