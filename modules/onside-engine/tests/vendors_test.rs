//! Vendor clients against a mock HTTP server.

use httpmock::prelude::*;
use onside_engine::sources::{
    GooglePlaces, HttpSeoAnalyzer, LocationSource, NewsApiClient, NewsSource, SeoAnalyzer,
    TavilySearcher, WebSearcher,
};
use onside_engine::{Mailer, SendGridMailer};
use serde_json::json;

#[tokio::test]
async fn newsapi_maps_articles_and_skips_removed() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2/everything")
                .query_param("q", "Rival")
                .header("X-Api-Key", "news-key");
            then.status(200).json_body(json!({
                "status": "ok",
                "totalResults": 2,
                "articles": [
                    {
                        "source": {"id": null, "name": "Wire"},
                        "title": "Rival cuts prices",
                        "url": "https://wire.test/rival",
                        "description": "Budget tier launched",
                        "publishedAt": "2024-03-04T09:00:00Z"
                    },
                    {"source": {"name": "Gone"}, "title": "[Removed]", "url": "https://removed.com"}
                ]
            }));
        })
        .await;

    let client = NewsApiClient::new("news-key")
        .unwrap()
        .with_base_url(server.base_url());
    let articles = client.search_news("Rival", 10).await.unwrap();

    mock.assert_async().await;
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].source.as_deref(), Some("Wire"));
    assert!(articles[0].published_at.is_some());
}

#[tokio::test]
async fn newsapi_error_status_is_surfaced() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/everything");
            then.status(401).json_body(json!({
                "status": "error",
                "code": "apiKeyInvalid",
                "message": "Your API key is invalid."
            }));
        })
        .await;

    let client = NewsApiClient::new("bad")
        .unwrap()
        .with_base_url(server.base_url());
    let err = client.search_news("Rival", 10).await.unwrap_err();
    assert!(err.to_string().contains("API key is invalid"));
}

#[tokio::test]
async fn tavily_returns_results() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/search")
                .json_body_partial(r#"{"query": "Rival Widgets", "max_results": 2}"#);
            then.status(200).json_body(json!({
                "results": [
                    {"title": "Rival", "url": "https://rival.test", "content": "Widgets for all"},
                    {"title": "Review", "url": "https://review.test/rival", "content": "Solid"}
                ]
            }));
        })
        .await;

    let searcher = TavilySearcher::new("tv-key")
        .unwrap()
        .with_base_url(server.base_url());
    let results = searcher.search("Rival Widgets", 2).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].snippet, "Widgets for all");
}

#[tokio::test]
async fn places_zero_results_is_empty_and_denied_is_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/maps/api/place/textsearch/json")
                .query_param("query", "nowhere");
            then.status(200)
                .json_body(json!({"status": "ZERO_RESULTS", "results": []}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/maps/api/place/textsearch/json")
                .query_param("query", "denied");
            then.status(200).json_body(json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid.",
                "results": []
            }));
        })
        .await;

    let places = GooglePlaces::new("maps-key")
        .unwrap()
        .with_base_url(server.base_url());

    assert!(places.find_places("nowhere", 5).await.unwrap().is_empty());
    let err = places.find_places("denied", 5).await.unwrap_err();
    assert!(err.to_string().contains("REQUEST_DENIED"));
}

#[tokio::test]
async fn seo_analyzer_fetches_and_scores() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html><head><title>Tiny</title></head><body><p>hi</p></body></html>");
        })
        .await;

    let analyzer = HttpSeoAnalyzer::new().unwrap();
    let report = analyzer.analyze(&server.url("/")).await.unwrap();

    assert!(report.score < 60);
    assert_eq!(report.title.as_deref(), Some("Tiny"));
    assert!(report.issues.iter().any(|i| i.contains("canonical")));
}

#[tokio::test]
async fn sendgrid_posts_plain_text_mail() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v3/mail/send")
                .header("authorization", "Bearer sg-key")
                .json_body_partial(
                    r#"{"personalizations": [{"to": [{"email": "ceo@acme.test"}]}], "subject": "Weekly"}"#,
                );
            then.status(202);
        })
        .await;

    let mailer = SendGridMailer::new("sg-key", "reports@onside.test")
        .unwrap()
        .with_base_url(server.base_url());
    mailer.send("ceo@acme.test", "Weekly", "# Report").await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn sendgrid_rejection_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v3/mail/send");
            then.status(403).body("forbidden");
        })
        .await;

    let mailer = SendGridMailer::new("sg-key", "reports@onside.test")
        .unwrap()
        .with_base_url(server.base_url());
    assert!(mailer.send("a@b.test", "s", "b").await.is_err());
}
