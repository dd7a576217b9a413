//! Academic paper search against the arXiv Atom API
//!
//! The feed is small and regular, so entries are pulled out with a handful of
//! patterns instead of a full XML parser.

use crate::agents::{AgentOutput, ResearchAgent};
use crate::types::{AppError, RawItem, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;
use tokio::time::Instant;

const ARXIV_API: &str = "http://export.arxiv.org/api/query";

static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("entry pattern is valid"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title[^>]*>(.*?)</title>").expect("title pattern is valid"));
static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<summary[^>]*>(.*?)</summary>").expect("summary pattern is valid")
});
static ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<id>(.*?)</id>").expect("id pattern is valid"));
static PUBLISHED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<published>(.*?)</published>").expect("published pattern is valid")
});
static AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("author pattern is valid")
});
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<link\s([^>]*?)/?>").expect("link pattern is valid"));
static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("attribute pattern is valid"));

pub struct AcademicSearchAgent {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl AcademicSearchAgent {
    pub const ID: &'static str = "academic_search";
    pub const DEFAULT_MAX_RESULTS: usize = 5;

    pub fn new(max_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: ARXIV_API.to_string(),
            max_results: max_results.max(1),
        }
    }

    /// Point the agent at a different arXiv-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for AcademicSearchAgent {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RESULTS)
    }
}

#[async_trait]
impl ResearchAgent for AcademicSearchAgent {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "Searches arXiv for academic papers, preprints and their abstracts"
    }

    fn aliases(&self) -> &[&str] {
        &["academic_agent", "academic", "arxiv"]
    }

    async fn invoke(&self, task: &str, deadline: Instant) -> Result<AgentOutput> {
        let query = task.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("Empty academic query".to_string()));
        }

        let search_query = format!("all:{}", query);
        let max_results = self.max_results.to_string();
        let remaining = deadline.saturating_duration_since(Instant::now());

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .timeout(remaining)
            .send()
            .await
            .map_err(|e| AppError::Agent(format!("arXiv request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Agent(format!("arXiv API error: {}", status)));
        }

        let feed = response
            .text()
            .await
            .map_err(|e| AppError::Agent(format!("arXiv response unreadable: {}", e)))?;

        let mut results = parse_atom_feed(&feed);
        results.truncate(self.max_results);

        Ok(AgentOutput {
            operations: vec![format!("arxiv_query: {}", search_query)],
            results,
        })
    }
}

/// Extract paper records from an arXiv Atom feed.
pub fn parse_atom_feed(feed: &str) -> Vec<RawItem> {
    ENTRY
        .captures_iter(feed)
        .filter_map(|caps| caps.get(1))
        .filter_map(|entry| parse_entry(entry.as_str()))
        .collect()
}

fn parse_entry(entry: &str) -> Option<RawItem> {
    let abs_url = capture_text(&ID, entry)?;
    let arxiv_id = abs_url
        .split_once("/abs/")
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| abs_url.rsplit('/').next().unwrap_or_default().to_string());

    let authors: Vec<Value> = AUTHOR
        .captures_iter(entry)
        .filter_map(|caps| caps.get(1))
        .map(|name| Value::String(clean_text(name.as_str())))
        .collect();

    let mut pdf_url = None;
    let mut alternate_url = None;
    for link in LINK.captures_iter(entry).filter_map(|caps| caps.get(1)) {
        let mut href = None;
        let mut title = None;
        let mut rel = None;
        for attr in ATTRIBUTE.captures_iter(link.as_str()) {
            match &attr[1] {
                "href" => href = Some(attr[2].to_string()),
                "title" => title = Some(attr[2].to_string()),
                "rel" => rel = Some(attr[2].to_string()),
                _ => {}
            }
        }
        match (href, title.as_deref(), rel.as_deref()) {
            (Some(href), Some("pdf"), _) => pdf_url = Some(href),
            (Some(href), _, Some("alternate")) => alternate_url = Some(href),
            _ => {}
        }
    }

    let mut item = RawItem::new()
        .with("id", arxiv_id.clone())
        .with("arxiv_id", arxiv_id)
        .with("title", capture_text(&TITLE, entry).unwrap_or_default())
        .with("abstract", capture_text(&SUMMARY, entry).unwrap_or_default())
        .with("authors", json!(authors))
        .with("link", alternate_url.unwrap_or(abs_url));

    if let Some(pdf_url) = pdf_url {
        item = item.with("pdf_url", pdf_url);
    }
    if let Some(published) = capture_text(&PUBLISHED, entry) {
        item = item.with("published", published);
    }

    Some(item)
}

fn capture_text(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_text(m.as_str()))
        .filter(|s| !s.is_empty())
}

/// Collapse whitespace and decode the entities arXiv emits.
fn clean_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: all:transformers</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on complex
 recurrent or convolutional neural networks &amp; attention.</summary>
    <author>
      <name>Ashish Vaswani</name>
    </author>
    <author>
      <name>Noam Shazeer</name>
    </author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/hep-th/9901001v1</id>
    <title>An older paper</title>
    <summary>Short.</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed() {
        let items = parse_atom_feed(FEED);
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.first_str(&["arxiv_id"]), Some("1706.03762v7"));
        assert_eq!(first.first_str(&["title"]), Some("Attention Is All You Need"));
        assert_eq!(
            first.first_str(&["link"]),
            Some("http://arxiv.org/abs/1706.03762v7")
        );
        assert_eq!(
            first.first_str(&["pdf_url"]),
            Some("http://arxiv.org/pdf/1706.03762v7")
        );
        assert!(first.first_str(&["abstract"]).unwrap().ends_with("& attention."));
        assert_eq!(
            first.get("authors"),
            Some(&json!(["Ashish Vaswani", "Noam Shazeer"]))
        );

        let second = &items[1];
        assert_eq!(second.first_str(&["arxiv_id"]), Some("hep-th/9901001v1"));
        assert_eq!(
            second.first_str(&["link"]),
            Some("http://arxiv.org/abs/hep-th/9901001v1")
        );
    }

    #[test]
    fn test_parse_empty_feed() {
        assert!(parse_atom_feed("<feed></feed>").is_empty());
        assert!(parse_atom_feed("not xml at all").is_empty());
    }

    #[tokio::test]
    async fn test_invoke_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search_query", "all:transformers"))
            .and(query_param("max_results", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let agent = AcademicSearchAgent::new(3).with_base_url(format!("{}/api/query", server.uri()));
        let deadline = Instant::now() + Duration::from_secs(5);
        let output = agent.invoke("transformers", deadline).await.unwrap();

        assert_eq!(output.results.len(), 2);
        assert_eq!(output.operations, vec!["arxiv_query: all:transformers"]);
    }

    #[tokio::test]
    async fn test_invoke_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let agent = AcademicSearchAgent::default().with_base_url(server.uri());
        let deadline = Instant::now() + Duration::from_secs(5);
        let err = agent.invoke("rnn", deadline).await.unwrap_err();
        assert!(matches!(err, AppError::Agent(_)));
    }
}
