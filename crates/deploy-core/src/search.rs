//! Search-augmented generation used by the `websearch:` action
//!
//! The reply is flattened into answer text plus a deduplicated citation list,
//! both capped so the next prompt stays small.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::SearchConfig;
use crate::text::truncate_chars;

/// Characters of an error body echoed back to the oracle
const ERROR_BODY_CHARS: usize = 2000;

/// A search backend. Failures are reported as text, never raised.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// One-line availability status for the prompt and startup banner
    fn status(&self) -> String;

    /// Run `query` and return text suitable for the tool history
    async fn search(&self, query: &str) -> String;
}

/// A single citation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Vec<ContentPart>,
    #[serde(default)]
    action: Option<SearchAction>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchAction {
    #[serde(default)]
    sources: Vec<Source>,
}

#[derive(Debug, Deserialize)]
struct Source {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// OpenAI Responses API client with the `web_search` tool enabled
#[derive(Debug, Clone)]
pub struct WebSearchClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_chars: usize,
    max_sources: usize,
    client: reqwest::Client,
}

impl WebSearchClient {
    pub fn from_config(config: &SearchConfig) -> Self {
        // Builder only fails on TLS backend init; fall back to the default client
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_chars: config.max_chars,
            max_sources: config.max_sources,
            client,
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl Searcher for WebSearchClient {
    fn status(&self) -> String {
        if self.is_available() {
            format!("OpenAI websearch available (model: {}).", self.model)
        } else {
            "OpenAI websearch unavailable (set OPENAI_API_KEY).".to_string()
        }
    }

    #[instrument(skip(self), fields(model = %self.model))]
    async fn search(&self, query: &str) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return "OpenAI websearch unavailable: missing OPENAI_API_KEY.".to_string();
        };

        let body = json!({
            "model": self.model,
            "tools": [{ "type": "web_search" }],
            "tool_choice": "auto",
            "input": query,
            "include": ["web_search_call.action.sources"],
        });

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Search request failed");
                return format!("OpenAI websearch failed: {}", e);
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => return format!("OpenAI websearch failed: {}", e),
        };

        if !status.is_success() {
            warn!(status = %status, "Search returned error status");
            return format!(
                "OpenAI websearch error: {}\n{}",
                status,
                truncate_chars(&text, ERROR_BODY_CHARS)
            );
        }

        match serde_json::from_str::<ResponsesReply>(&text) {
            Ok(reply) => {
                debug!(items = reply.output.len(), "Search reply parsed");
                format_reply(query, &reply, self.max_chars, self.max_sources)
            }
            Err(_) => format!(
                "OpenAI websearch raw response:\n{}",
                truncate_chars(&text, ERROR_BODY_CHARS)
            ),
        }
    }
}

/// Collect answer segments and citations from every output item
fn collect(reply: &ResponsesReply) -> (Vec<String>, Vec<Citation>) {
    let mut segments = Vec::new();
    let mut citations = Vec::new();

    for item in &reply.output {
        match item.kind.as_str() {
            "message" => {
                for part in &item.content {
                    let text = part.text.as_deref().or(part.value.as_deref()).unwrap_or("");
                    if !text.trim().is_empty() {
                        segments.push(text.trim().to_string());
                    }
                    for note in &part.annotations {
                        if note.kind != "url_citation" {
                            continue;
                        }
                        if let Some(url) = note.url.as_deref().filter(|u| !u.is_empty()) {
                            citations.push(Citation {
                                title: note.title.clone().unwrap_or_else(|| "Untitled".to_string()),
                                url: url.to_string(),
                            });
                        }
                    }
                }
            }
            "web_search_call" => {
                let sources = item.action.as_ref().map(|a| a.sources.as_slice()).unwrap_or(&[]);
                for source in sources {
                    if let Some(url) = source.url.as_deref().filter(|u| !u.is_empty()) {
                        citations.push(Citation {
                            title: source.title.clone().unwrap_or_else(|| "Untitled".to_string()),
                            url: url.to_string(),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    (segments, citations)
}

/// Keep the first citation per URL, preserving order
pub fn dedupe_citations(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect()
}

fn format_reply(query: &str, reply: &ResponsesReply, max_chars: usize, max_sources: usize) -> String {
    let (segments, citations) = collect(reply);

    let answer = if segments.is_empty() {
        "No text output returned.".to_string()
    } else {
        truncate_chars(&segments.join("\n\n"), max_chars).to_string()
    };

    let sources = dedupe_citations(citations)
        .into_iter()
        .take(max_sources)
        .enumerate()
        .map(|(i, c)| format!("{}. {}\n{}", i + 1, c.title, c.url))
        .collect::<Vec<_>>()
        .join("\n");

    let mut sections = vec![format!("OpenAI websearch results for: {}", query), answer];
    if !sources.is_empty() {
        sections.push(format!("Sources:\n{}", sources));
    }
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(value: serde_json::Value) -> ResponsesReply {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_dedupe_keeps_first_per_url() {
        let citations = vec![
            Citation { title: "A".into(), url: "https://a".into() },
            Citation { title: "B".into(), url: "https://b".into() },
            Citation { title: "A again".into(), url: "https://a".into() },
        ];
        let deduped = dedupe_citations(citations);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "A");
        assert_eq!(deduped[1].url, "https://b");
    }

    #[test]
    fn test_format_collects_text_and_sources() {
        let r = reply(json!({
            "output": [
                {
                    "type": "web_search_call",
                    "action": { "sources": [
                        { "title": "AWS CLI s3api", "url": "https://docs.aws/s3api" },
                        { "url": "https://docs.aws/untitled" }
                    ]}
                },
                {
                    "type": "message",
                    "content": [{
                        "text": "  Use aws s3api create-bucket.  ",
                        "annotations": [
                            { "type": "url_citation", "title": "dup", "url": "https://docs.aws/s3api" },
                            { "type": "file_citation", "url": "https://ignored" }
                        ]
                    }]
                }
            ]
        }));

        let out = format_reply("create bucket", &r, 2000, 5);
        assert!(out.starts_with("OpenAI websearch results for: create bucket"));
        assert!(out.contains("Use aws s3api create-bucket."));
        assert!(out.contains("1. AWS CLI s3api\nhttps://docs.aws/s3api"));
        assert!(out.contains("2. Untitled\nhttps://docs.aws/untitled"));
        assert!(!out.contains("https://ignored"));
        assert_eq!(out.matches("https://docs.aws/s3api").count(), 1);
    }

    #[test]
    fn test_format_caps_text_and_sources() {
        let sources: Vec<_> = (0..8)
            .map(|i| json!({ "title": format!("t{i}"), "url": format!("https://s/{i}") }))
            .collect();
        let r = reply(json!({
            "output": [
                { "type": "message", "content": [{ "text": "x".repeat(50) }] },
                { "type": "web_search_call", "action": { "sources": sources } }
            ]
        }));

        let out = format_reply("q", &r, 10, 5);
        assert!(out.contains(&"x".repeat(10)));
        assert!(!out.contains(&"x".repeat(11)));
        assert!(out.contains("5. t4"));
        assert!(!out.contains("6. t5"));
    }

    #[test]
    fn test_format_without_text() {
        let out = format_reply("q", &ResponsesReply::default(), 2000, 5);
        assert!(out.contains("No text output returned."));
        assert!(!out.contains("Sources:"));
    }

    #[tokio::test]
    async fn test_unavailable_without_key() {
        let client = WebSearchClient::from_config(&SearchConfig::default());
        assert!(!client.is_available());
        assert!(client.status().contains("unavailable"));
        let out = client.search("anything").await;
        assert_eq!(out, "OpenAI websearch unavailable: missing OPENAI_API_KEY.");
    }

    #[test]
    fn test_status_with_key() {
        let config = SearchConfig {
            api_key: Some("sk-test".into()),
            ..SearchConfig::default()
        };
        let client = WebSearchClient::from_config(&config);
        assert_eq!(client.status(), "OpenAI websearch available (model: o4-mini).");
    }
}
