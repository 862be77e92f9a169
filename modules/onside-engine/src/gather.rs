//! Concurrent fan-out over the data sources.
//!
//! News, search, places and SEO run together; each lands in its own
//! [`TaskOutcome`] so one failing vendor never costs the others.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::sources::{
    LocationSource, NewsArticle, NewsSource, Place, SearchResult, SeoAnalyzer, SeoReport,
    WebSearcher,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum TaskOutcome<T> {
    Ok(T),
    Failed(String),
    /// Source not configured, or nothing to ask it.
    Skipped,
}

impl<T> TaskOutcome<T> {
    pub fn ok(&self) -> Option<&T> {
        match self {
            TaskOutcome::Ok(v) => Some(v),
            _ => None,
        }
    }

    pub fn status(&self) -> String {
        match self {
            TaskOutcome::Ok(_) => "ok".to_string(),
            TaskOutcome::Failed(e) => format!("failed: {e}"),
            TaskOutcome::Skipped => "skipped".to_string(),
        }
    }
}

/// Configured source clients plus per-source result limits.
#[derive(Clone, Default)]
pub struct Sources {
    pub news: Option<Arc<dyn NewsSource>>,
    pub search: Option<Arc<dyn WebSearcher>>,
    pub places: Option<Arc<dyn LocationSource>>,
    pub seo: Option<Arc<dyn SeoAnalyzer>>,
    pub news_limit: u32,
    pub search_limit: u32,
    pub places_limit: u32,
}

/// What to look up.
#[derive(Debug, Clone)]
pub struct GatherContext {
    /// Primary query term, usually the company or competitor name.
    pub subject: String,
    pub industry: Option<String>,
    /// Website to score for SEO.
    pub website: Option<String>,
}

impl GatherContext {
    fn search_query(&self) -> String {
        match &self.industry {
            Some(industry) => format!("{} {}", self.subject, industry),
            None => self.subject.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Gathered {
    pub news: TaskOutcome<Vec<NewsArticle>>,
    pub search: TaskOutcome<Vec<SearchResult>>,
    pub places: TaskOutcome<Vec<Place>>,
    pub seo: TaskOutcome<SeoReport>,
}

impl Gathered {
    /// Successful data only, keyed by source, for the LLM prompt.
    pub fn context_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(news) = self.news.ok() {
            map.insert("news".into(), json!(news));
        }
        if let Some(search) = self.search.ok() {
            map.insert("search".into(), json!(search));
        }
        if let Some(places) = self.places.ok() {
            map.insert("places".into(), json!(places));
        }
        if let Some(seo) = self.seo.ok() {
            map.insert("seo".into(), json!(seo));
        }
        Value::Object(map)
    }

    /// Per-source status strings, stored with the report.
    pub fn statuses(&self) -> Value {
        json!({
            "news": self.news.status(),
            "search": self.search.status(),
            "places": self.places.status(),
            "seo": self.seo.status(),
        })
    }
}

async fn run_task<T, F>(name: &str, task: Option<F>) -> TaskOutcome<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let Some(task) = task else {
        return TaskOutcome::Skipped;
    };
    match task.await {
        Ok(v) => TaskOutcome::Ok(v),
        Err(e) => {
            warn!(source = name, error = %e, "gather: source failed");
            TaskOutcome::Failed(format!("{e:#}"))
        }
    }
}

pub async fn gather(sources: &Sources, ctx: &GatherContext) -> Gathered {
    let query = ctx.search_query();

    let news = sources
        .news
        .as_ref()
        .map(|s| s.search_news(&ctx.subject, sources.news_limit));
    let search = sources
        .search
        .as_ref()
        .map(|s| s.search(&query, sources.search_limit));
    let places = sources
        .places
        .as_ref()
        .map(|s| s.find_places(&query, sources.places_limit));
    let seo = sources
        .seo
        .as_ref()
        .zip(ctx.website.as_deref())
        .map(|(s, url)| s.analyze(url));

    let (news, search, places, seo) = futures::join!(
        run_task("news", news),
        run_task("search", search),
        run_task("places", places),
        run_task("seo", seo),
    );

    Gathered {
        news,
        search,
        places,
        seo,
    }
}
