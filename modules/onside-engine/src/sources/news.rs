use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::{http_client, NewsArticle, NewsSource};

const NEWSAPI_URL: &str = "https://newsapi.org";
const RSS_MAX_AGE_DAYS: i64 = 30;

// =============================================================================
// NewsAPI
// =============================================================================

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<ApiArticle>,
}

#[derive(Debug, Deserialize)]
struct ApiArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    source: Option<ApiSource>,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    #[serde(default)]
    name: Option<String>,
}

/// NewsAPI `/v2/everything` client.
pub struct NewsApiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl NewsApiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: NEWSAPI_URL.to_string(),
            http: http_client(Duration::from_secs(20))?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn search_news(&self, query: &str, limit: u32) -> Result<Vec<NewsArticle>> {
        info!(query, limit, "news: querying newsapi");

        let page_size = limit.clamp(1, 100).to_string();
        let resp = self
            .http
            .get(format!("{}/v2/everything", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .context("NewsAPI request failed")?;

        let status = resp.status();
        let body: EverythingResponse = resp
            .json()
            .await
            .context("Failed to parse NewsAPI response")?;

        if !status.is_success() || body.status != "ok" {
            anyhow::bail!(
                "NewsAPI returned {status}: {}",
                body.message.unwrap_or_default()
            );
        }

        let articles: Vec<NewsArticle> = body
            .articles
            .into_iter()
            .filter_map(|a| {
                Some(NewsArticle {
                    title: a.title.filter(|t| !t.is_empty() && t != "[Removed]")?,
                    url: a.url?,
                    source: a.source.and_then(|s| s.name),
                    description: a.description,
                    published_at: a.published_at,
                })
            })
            .take(limit as usize)
            .collect();

        info!(query, count = articles.len(), "news: complete");
        Ok(articles)
    }
}

// =============================================================================
// RSS / Atom
// =============================================================================

/// News from a fixed set of RSS/Atom feeds, filtered by query terms.
pub struct RssNewsSource {
    feeds: Vec<String>,
    http: reqwest::Client,
}

impl RssNewsSource {
    pub fn new(feeds: Vec<String>) -> Result<Self> {
        Ok(Self {
            feeds,
            http: http_client(Duration::from_secs(15))?,
        })
    }

    async fn fetch_feed(&self, feed_url: &str) -> Result<Vec<NewsArticle>> {
        let bytes = self
            .http
            .get(feed_url)
            .send()
            .await
            .context("RSS feed fetch failed")?
            .error_for_status()?
            .bytes()
            .await
            .context("Failed to read RSS feed body")?;
        parse_feed(&bytes)
    }
}

/// Parse an RSS/Atom/JSON feed body into articles, dropping stale entries.
pub(crate) fn parse_feed(bytes: &[u8]) -> Result<Vec<NewsArticle>> {
    let feed = feed_rs::parser::parse(bytes).context("Failed to parse RSS/Atom feed")?;
    let source = feed.title.map(|t| t.content);
    let cutoff = Utc::now() - chrono::Duration::days(RSS_MAX_AGE_DAYS);

    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
            let published_at = entry.published.or(entry.updated);
            if published_at.is_some_and(|date| date < cutoff) {
                return None;
            }
            Some(NewsArticle {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                url,
                source: source.clone(),
                description: entry.summary.map(|s| s.content),
                published_at,
            })
        })
        .collect())
}

fn matches_query(article: &NewsArticle, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let haystack = format!(
        "{} {}",
        article.title,
        article.description.as_deref().unwrap_or("")
    )
    .to_lowercase();
    terms.iter().any(|t| haystack.contains(t.as_str()))
}

#[async_trait]
impl NewsSource for RssNewsSource {
    async fn search_news(&self, query: &str, limit: u32) -> Result<Vec<NewsArticle>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .filter(|t| t.len() > 2)
            .map(str::to_lowercase)
            .collect();

        let fetches = self.feeds.iter().map(|url| self.fetch_feed(url));
        let results = futures::future::join_all(fetches).await;

        let mut articles = Vec::new();
        let mut failures = 0;
        for (url, result) in self.feeds.iter().zip(results) {
            match result {
                Ok(items) => articles.extend(items.into_iter().filter(|a| matches_query(a, &terms))),
                Err(e) => {
                    failures += 1;
                    warn!(feed = url.as_str(), error = %e, "news: feed failed");
                }
            }
        }
        if failures > 0 && failures == self.feeds.len() {
            anyhow::bail!("all {failures} RSS feeds failed");
        }

        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        articles.truncate(limit as usize);
        info!(query, count = articles.len(), "news: rss complete");
        Ok(articles)
    }
}
