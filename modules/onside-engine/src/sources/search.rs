use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{http_client, SearchResult, WebSearcher};

const TAVILY_URL: &str = "https://api.tavily.com";

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Web search via the Tavily API.
pub struct TavilySearcher {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl TavilySearcher {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: TAVILY_URL.to_string(),
            http: http_client(Duration::from_secs(30))?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchResult>> {
        info!(query, limit, "search: querying tavily");

        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": limit,
            "search_depth": "basic",
        });

        let resp = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Tavily API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Tavily returned {status}: {text}");
        }

        let data: TavilyResponse = resp
            .json()
            .await
            .context("Failed to parse Tavily response")?;

        let results: Vec<SearchResult> = data
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                snippet: r.content,
            })
            .take(limit as usize)
            .collect();

        info!(query, count = results.len(), "search: complete");
        Ok(results)
    }
}
