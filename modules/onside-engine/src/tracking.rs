//! Competitor page versioning and change detection.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use onside_common::{ContentChange, ScrapedContent};
use onside_store::content::{self, NewChange};
use scraper::Html;
use sha2::{Digest, Sha256};
use similar::TextDiff;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::html::visible_text;

/// Lines of context around each diff hunk.
const DIFF_CONTEXT: usize = 3;

// =============================================================================
// Seams
// =============================================================================

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Raw HTML of a page.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Persistence for tracked page versions.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Latest successfully scraped version, if any.
    async fn latest(&self, competitor_id: Uuid, url: &str) -> Result<Option<ScrapedContent>>;

    async fn save_version(
        &self,
        competitor_id: Uuid,
        url: &str,
        content_hash: &str,
        content: &str,
        version: i32,
    ) -> Result<ScrapedContent>;

    async fn save_error(
        &self,
        competitor_id: Uuid,
        url: &str,
        last_version: i32,
        error: &str,
    ) -> Result<()>;

    async fn save_change(&self, change: NewChange<'_>) -> Result<ContentChange>;
}

pub struct HttpPageFetcher {
    http: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: crate::sources::http_client(Duration::from_secs(30))?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).context("Invalid URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Only http/https URLs allowed, got: {}", parsed.scheme());
        }
        let body = self
            .http
            .get(parsed)
            .send()
            .await
            .context("Page fetch failed")?
            .error_for_status()?
            .text()
            .await
            .context("Failed to read page body")?;
        Ok(body)
    }
}

pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn latest(&self, competitor_id: Uuid, url: &str) -> Result<Option<ScrapedContent>> {
        content::latest_version(&self.pool, competitor_id, url).await
    }

    async fn save_version(
        &self,
        competitor_id: Uuid,
        url: &str,
        content_hash: &str,
        text: &str,
        version: i32,
    ) -> Result<ScrapedContent> {
        content::insert_version(&self.pool, competitor_id, url, content_hash, text, version).await
    }

    async fn save_error(
        &self,
        competitor_id: Uuid,
        url: &str,
        last_version: i32,
        error: &str,
    ) -> Result<()> {
        content::insert_error(&self.pool, competitor_id, url, last_version, error).await
    }

    async fn save_change(&self, change: NewChange<'_>) -> Result<ContentChange> {
        content::insert_change(&self.pool, change).await
    }
}

// =============================================================================
// Tracker
// =============================================================================

#[derive(Debug, Clone)]
pub enum TrackOutcome {
    /// First capture of this page.
    Baseline { version: i32 },
    Unchanged { version: i32 },
    Changed { change: ContentChange },
    FetchFailed { error: String },
}

impl TrackOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TrackOutcome::Baseline { .. } => "baseline",
            TrackOutcome::Unchanged { .. } => "unchanged",
            TrackOutcome::Changed { .. } => "changed",
            TrackOutcome::FetchFailed { .. } => "fetch_failed",
        }
    }
}

pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Unified line diff and the fraction of content that changed.
pub fn diff(old: &str, new: &str, old_version: i32, new_version: i32) -> (String, f64) {
    let text_diff = TextDiff::from_lines(old, new);
    let ratio = f64::from(text_diff.ratio());
    let unified = text_diff
        .unified_diff()
        .context_radius(DIFF_CONTEXT)
        .header(&format!("v{old_version}"), &format!("v{new_version}"))
        .to_string();
    (unified, 1.0 - ratio)
}

pub struct ContentTracker<F, S> {
    fetcher: F,
    store: S,
}

impl<F: PageFetcher, S: ContentStore> ContentTracker<F, S> {
    pub fn new(fetcher: F, store: S) -> Self {
        Self { fetcher, store }
    }

    pub async fn check(&self, competitor_id: Uuid, url: &str) -> Result<TrackOutcome> {
        let previous = self.store.latest(competitor_id, url).await?;
        let last_version = previous.as_ref().map_or(0, |p| p.version);

        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                let error = format!("{e:#}");
                warn!(%competitor_id, url, error = %error, "tracking: fetch failed");
                self.store
                    .save_error(competitor_id, url, last_version, &error)
                    .await?;
                return Ok(TrackOutcome::FetchFailed { error });
            }
        };

        let text = visible_text(&Html::parse_document(&html));
        let hash = content_hash(&text);

        let Some(previous) = previous else {
            self.store
                .save_version(competitor_id, url, &hash, &text, 1)
                .await?;
            info!(%competitor_id, url, "tracking: baseline captured");
            return Ok(TrackOutcome::Baseline { version: 1 });
        };

        if previous.content_hash == hash {
            return Ok(TrackOutcome::Unchanged {
                version: previous.version,
            });
        }

        let version = previous.version + 1;
        let (unified, change_ratio) = diff(&previous.content, &text, previous.version, version);
        self.store
            .save_version(competitor_id, url, &hash, &text, version)
            .await?;
        let change = self
            .store
            .save_change(NewChange {
                competitor_id,
                url,
                old_version: previous.version,
                new_version: version,
                diff: &unified,
                change_ratio,
            })
            .await?;

        info!(
            %competitor_id,
            url,
            version,
            change_ratio,
            "tracking: content changed"
        );
        Ok(TrackOutcome::Changed { change })
    }
}
