//! web_search and web_fetch - best-effort external lookups
//!
//! Search delegates to the LLM backend's web endpoint; fetch goes through an
//! external reader service that returns pages as plain text. Both surface
//! upstream failures as unsuccessful outcomes.

use crate::registry::Tool;
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_llm::ClientTransport;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const WEB_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_CAP: usize = 20_000;

/// Reader service that converts a URL into readable text.
const READER_BASE: &str = "https://r.jina.ai";

pub struct WebSearchTool {
    transport: Arc<ClientTransport>,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            transport: deps.transport.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Web search via the backend. Best-effort: returns an error outcome \
         when the backend has no search capability."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Result cap (default 5)"
                },
                "search_type": {
                    "type": "string",
                    "description": "Optional backend-specific search type"
                }
            },
            "required": ["query"]
        })
    }

    fn example(&self) -> Value {
        json!({ "query": "tokio select cancellation pattern" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let query = args["query"].as_str().unwrap_or_default();
        let url = format!(
            "{}/api/extra/web/search",
            self.transport.base_url().trim_end_matches('/')
        );
        let body = json!({
            "query": query,
            "max_results": args["max_results"].as_u64().unwrap_or(5),
            "search_type": args["search_type"].as_str().unwrap_or("web"),
        });

        let response = self
            .client
            .post(&url)
            .timeout(WEB_TIMEOUT)
            .json(&body)
            .send()
            .await;
        match response {
            Ok(r) if r.status().is_success() => match r.json::<Value>().await {
                Ok(results) => ToolOutcome::ok(json!({
                    "query": query,
                    "results": results,
                })),
                Err(e) => ToolOutcome::err(format!("web search returned invalid JSON: {}", e)),
            },
            Ok(r) => ToolOutcome::err(format!("web search failed: {}", r.status())),
            Err(e) => ToolOutcome::err(format!("web search unavailable: {}", e)),
        }
    }
}

pub struct WebFetchTool {
    client: reqwest::Client,
    reader_base: String,
}

impl WebFetchTool {
    pub fn new(_deps: &ToolDeps) -> Self {
        Self {
            client: reqwest::Client::new(),
            reader_base: READER_BASE.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL as readable text through the reader service. Set \
         extract_code to pull out fenced code blocks."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch"
                },
                "extract_code": {
                    "type": "boolean",
                    "description": "Also return fenced code blocks separately"
                }
            },
            "required": ["url"]
        })
    }

    fn example(&self) -> Value {
        json!({ "url": "https://docs.python.org/3/library/asyncio.html" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let url = args["url"].as_str().unwrap_or_default();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return ToolOutcome::err("url must start with http:// or https://");
        }

        let reader_url = format!("{}/{}", self.reader_base, url);
        let response = self
            .client
            .get(&reader_url)
            .timeout(WEB_TIMEOUT)
            .send()
            .await;
        let text = match response {
            Ok(r) if r.status().is_success() => r.text().await.unwrap_or_default(),
            Ok(r) => return ToolOutcome::err(format!("fetch failed: {}", r.status())),
            Err(e) => return ToolOutcome::err(format!("fetch unavailable: {}", e)),
        };

        let truncated = text.len() > FETCH_CAP;
        let mut body = text;
        if truncated {
            let mut cut = FETCH_CAP;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }

        let mut payload = json!({
            "url": url,
            "content": body,
            "truncated": truncated,
        });
        if args["extract_code"].as_bool().unwrap_or(false) {
            payload["code_blocks"] = json!(extract_code_blocks(
                payload["content"].as_str().unwrap_or_default()
            ));
        }
        ToolOutcome::ok(payload)
    }
}

fn extract_code_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            match current.take() {
                Some(block) => blocks.push(block),
                None => current = Some(String::new()),
            }
            continue;
        }
        if let Some(block) = current.as_mut() {
            block.push_str(line);
            block.push('\n');
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_block_extraction() {
        let text = "intro\n```python\nprint(1)\n```\nmiddle\n```\nx = 2\n```\n";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], "print(1)\n");
        assert_eq!(blocks[1], "x = 2\n");
    }

    #[test]
    fn unclosed_block_is_dropped() {
        let blocks = extract_code_blocks("```\ndangling\n");
        assert!(blocks.is_empty());
    }
}
