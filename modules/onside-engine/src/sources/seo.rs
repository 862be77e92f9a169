use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::info;

use super::{http_client, SeoAnalyzer, SeoReport};
use crate::html::{visible_text, word_count};

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static META_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name='description']").expect("valid selector"));
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static CANONICAL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel='canonical']").expect("valid selector"));
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").expect("valid selector"));

const TITLE_LEN: std::ops::RangeInclusive<usize> = 10..=60;
const DESCRIPTION_LEN: std::ops::RangeInclusive<usize> = 50..=160;
const MIN_WORDS: usize = 300;
const MAX_ALT_PENALTY: f64 = 15.0;

/// Fetches a page and scores its on-page SEO.
pub struct HttpSeoAnalyzer {
    http: reqwest::Client,
}

impl HttpSeoAnalyzer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(20))?,
        })
    }
}

#[async_trait]
impl SeoAnalyzer for HttpSeoAnalyzer {
    async fn analyze(&self, url: &str) -> Result<SeoReport> {
        let parsed = url::Url::parse(url).context("Invalid URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Only http/https URLs allowed, got: {}", parsed.scheme());
        }

        let html = self
            .http
            .get(parsed)
            .send()
            .await
            .context("SEO page fetch failed")?
            .error_for_status()?
            .text()
            .await
            .context("Failed to read page body")?;

        let report = score_html(url, &html);
        info!(url, score = report.score, issues = report.issues.len(), "seo: analyzed");
        Ok(report)
    }
}

/// Score a page from its HTML. Starts at 100 and deducts per issue found.
pub fn score_html(url: &str, html: &str) -> SeoReport {
    let document = Html::parse_document(html);
    let mut penalty = 0.0;
    let mut issues = Vec::new();

    let title = document
        .select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());
    match &title {
        None => {
            penalty += 20.0;
            issues.push("missing <title>".to_string());
        }
        Some(t) if !TITLE_LEN.contains(&t.chars().count()) => {
            penalty += 10.0;
            issues.push(format!(
                "title is {} characters (aim for {}-{})",
                t.chars().count(),
                TITLE_LEN.start(),
                TITLE_LEN.end()
            ));
        }
        Some(_) => {}
    }

    let meta_description = document
        .select(&META_DESCRIPTION)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    match &meta_description {
        None => {
            penalty += 15.0;
            issues.push("missing meta description".to_string());
        }
        Some(d) if !DESCRIPTION_LEN.contains(&d.chars().count()) => {
            penalty += 5.0;
            issues.push(format!(
                "meta description is {} characters (aim for {}-{})",
                d.chars().count(),
                DESCRIPTION_LEN.start(),
                DESCRIPTION_LEN.end()
            ));
        }
        Some(_) => {}
    }

    let h1_count = document.select(&H1).count();
    if h1_count == 0 {
        penalty += 15.0;
        issues.push("no <h1> heading".to_string());
    } else if h1_count > 1 {
        penalty += 5.0;
        issues.push(format!("{h1_count} <h1> headings (use one)"));
    }

    if document.select(&CANONICAL).next().is_none() {
        penalty += 10.0;
        issues.push("missing canonical link".to_string());
    }

    let (images, missing_alt) = document.select(&IMG).fold((0usize, 0usize), |(n, m), img| {
        let has_alt = img.value().attr("alt").is_some_and(|a| !a.trim().is_empty());
        (n + 1, if has_alt { m } else { m + 1 })
    });
    if missing_alt > 0 {
        penalty += MAX_ALT_PENALTY * missing_alt as f64 / images as f64;
        issues.push(format!("{missing_alt} of {images} images missing alt text"));
    }

    let word_count = word_count(&visible_text(&document));
    if word_count < MIN_WORDS {
        penalty += 10.0;
        issues.push(format!("thin content: {word_count} words"));
    }

    let score = (100.0 - penalty).clamp(0.0, 100.0).round() as u8;

    SeoReport {
        url: url.to_string(),
        score,
        title,
        meta_description,
        h1_count,
        word_count,
        issues,
    }
}
