use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{http_client, LocationSource, Place};

const PLACES_URL: &str = "https://maps.googleapis.com";

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    #[serde(default)]
    name: String,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    user_ratings_total: Option<u32>,
    #[serde(default)]
    place_id: Option<String>,
}

/// Google Places text search.
pub struct GooglePlaces {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl GooglePlaces {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: PLACES_URL.to_string(),
            http: http_client(Duration::from_secs(20))?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LocationSource for GooglePlaces {
    async fn find_places(&self, query: &str, limit: u32) -> Result<Vec<Place>> {
        info!(query, limit, "places: text search");

        let resp = self
            .http
            .get(format!("{}/maps/api/place/textsearch/json", self.base_url))
            .query(&[("query", query), ("key", self.api_key.as_str())])
            .send()
            .await
            .context("Google Places request failed")?
            .error_for_status()
            .context("Google Places returned an error status")?;

        let data: TextSearchResponse = resp
            .json()
            .await
            .context("Failed to parse Google Places response")?;

        // ZERO_RESULTS is a normal empty answer; anything else is a failure.
        match data.status.as_str() {
            "OK" | "ZERO_RESULTS" => {}
            other => anyhow::bail!(
                "Google Places status {other}: {}",
                data.error_message.unwrap_or_default()
            ),
        }

        let places: Vec<Place> = data
            .results
            .into_iter()
            .take(limit as usize)
            .map(|r| Place {
                name: r.name,
                address: r.formatted_address,
                rating: r.rating,
                review_count: r.user_ratings_total,
                place_id: r.place_id,
            })
            .collect();

        info!(query, count = places.len(), "places: complete");
        Ok(places)
    }
}
