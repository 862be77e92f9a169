//! External data sources feeding report generation.
//!
//! One trait per concern so the gather step can be driven by fakes in tests;
//! each concrete client talks to a single vendor over reqwest.

mod news;
mod places;
mod search;
mod seo;

pub use news::{NewsApiClient, RssNewsSource};
pub use places::GooglePlaces;
pub use search::TavilySearcher;
pub use seo::{score_html, HttpSeoAnalyzer};

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const USER_AGENT: &str = "onside/0.1 (+competitive-intelligence)";

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
    pub source: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub address: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub place_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoReport {
    pub url: String,
    /// 0 to 100, higher is better.
    pub score: u8,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub h1_count: usize,
    pub word_count: usize,
    pub issues: Vec<String>,
}

// =============================================================================
// Traits
// =============================================================================

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn search_news(&self, query: &str, limit: u32) -> Result<Vec<NewsArticle>>;
}

#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchResult>>;
}

#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn find_places(&self, query: &str, limit: u32) -> Result<Vec<Place>>;
}

#[async_trait]
pub trait SeoAnalyzer: Send + Sync {
    async fn analyze(&self, url: &str) -> Result<SeoReport>;
}
