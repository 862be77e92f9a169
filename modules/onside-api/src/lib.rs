//! REST surface over the engine. `main.rs` wires config and the pool;
//! everything routable lives here so tests can drive the router directly.

pub mod auth;
pub mod error;
pub mod jwt;
pub mod rest;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use onside_engine::EngineDeps;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use jwt::JwtService;

pub struct AppState {
    pub deps: EngineDeps,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(deps: EngineDeps) -> Self {
        let jwt = JwtService::new(&deps.config.jwt_secret);
        Self { deps, jwt }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Auth
        .route("/api/auth/register", post(rest::auth::register))
        .route("/api/auth/login", post(rest::auth::login))
        .route("/api/me", get(rest::auth::me))
        // Companies
        .route(
            "/api/companies",
            get(rest::companies::list).post(rest::companies::create),
        )
        .route(
            "/api/companies/{id}",
            get(rest::companies::get_one)
                .put(rest::companies::update)
                .delete(rest::companies::delete),
        )
        // Competitors
        .route(
            "/api/companies/{id}/competitors",
            get(rest::competitors::list).post(rest::competitors::create),
        )
        .route(
            "/api/competitors/{id}",
            get(rest::competitors::get_one)
                .put(rest::competitors::update)
                .delete(rest::competitors::delete),
        )
        .route(
            "/api/competitors/{id}/domains",
            get(rest::competitors::list_domains).post(rest::competitors::add_domain),
        )
        .route("/api/competitors/{id}/track", post(rest::competitors::track))
        .route("/api/competitors/{id}/changes", get(rest::competitors::changes))
        // Reports
        .route(
            "/api/companies/{id}/reports",
            get(rest::reports::list).post(rest::reports::create),
        )
        .route("/api/reports/{id}", get(rest::reports::get_one))
        .route("/api/reports/{id}/fallbacks", get(rest::reports::fallbacks))
        .route("/api/reports/{id}/export", get(rest::reports::export))
        .route("/api/reports/{id}/deliver", post(rest::reports::deliver))
        .route("/api/fallbacks/stats", get(rest::reports::fallback_stats))
        // Schedules
        .route(
            "/api/companies/{id}/schedules",
            get(rest::schedules::list).post(rest::schedules::create),
        )
        .route(
            "/api/schedules/{id}",
            axum::routing::patch(rest::schedules::set_active).delete(rest::schedules::delete),
        )
        .route("/api/schedules/{id}/executions", get(rest::schedules::executions))
        // Recipients
        .route(
            "/api/companies/{id}/recipients",
            get(rest::recipients::list).post(rest::recipients::create),
        )
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // method + path only; query strings may carry ids
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
