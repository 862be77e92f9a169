use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use onside_common::{ContentChange, Competitor, Domain};
use onside_engine::{normalize_website, TrackOutcome};
use onside_store::competitors::{self, CompetitorUpdate, NewCompetitor};
use onside_store::{content, domains};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::rest::{clean, owned_company, owned_competitor, required, LimitQuery};
use crate::AppState;

#[derive(Deserialize)]
pub struct CompetitorBody {
    name: String,
    domain: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
pub struct CompetitorPatch {
    name: Option<String>,
    domain: Option<String>,
    description: Option<String>,
    is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct DomainBody {
    url: String,
    #[serde(default)]
    is_primary: bool,
}

/// Accept bare hosts or full URLs; only http(s) with a dotted host.
fn validate_site(raw: &str) -> ApiResult<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > 2048 {
        return Err(ApiError::bad_request("URL is required (max 2048 characters)"));
    }
    let normalized = normalize_website(raw);
    let parsed = url::Url::parse(&normalized).map_err(|_| ApiError::bad_request("Invalid URL"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ApiError::bad_request("URL must use http or https scheme"));
    }
    match parsed.host_str() {
        Some(host) if host.contains('.') => Ok(normalized),
        _ => Err(ApiError::bad_request("URL must include a public host name")),
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Competitor>>> {
    owned_company(&state, &user, company_id).await?;
    Ok(Json(
        competitors::list_by_company(state.deps.pool(), company_id).await?,
    ))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
    Json(body): Json<CompetitorBody>,
) -> ApiResult<(StatusCode, Json<Competitor>)> {
    owned_company(&state, &user, company_id).await?;

    let competitor = competitors::create(
        state.deps.pool(),
        NewCompetitor {
            company_id,
            name: required(&body.name, "name")?,
            domain: clean(body.domain),
            description: clean(body.description),
        },
    )
    .await?;

    info!(competitor_id = %competitor.id, %company_id, "Competitor created");
    Ok((StatusCode::CREATED, Json(competitor)))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Competitor>> {
    Ok(Json(owned_competitor(&state, &user, id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CompetitorPatch>,
) -> ApiResult<Json<Competitor>> {
    owned_competitor(&state, &user, id).await?;

    let name = match body.name {
        Some(name) => Some(required(&name, "name")?),
        None => None,
    };
    let update = CompetitorUpdate {
        name,
        domain: clean(body.domain),
        description: clean(body.description),
        is_active: body.is_active,
    };

    competitors::update(state.deps.pool(), id, update)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Competitor"))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned_competitor(&state, &user, id).await?;
    competitors::delete(state.deps.pool(), id).await?;
    info!(competitor_id = %id, "Competitor deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Domains ---

pub async fn list_domains(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Domain>>> {
    owned_competitor(&state, &user, id).await?;
    Ok(Json(domains::list_for_competitor(state.deps.pool(), id).await?))
}

pub async fn add_domain(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<DomainBody>,
) -> ApiResult<(StatusCode, Json<Domain>)> {
    owned_competitor(&state, &user, id).await?;
    let url = validate_site(&body.url)?;
    let domain = domains::add_for_competitor(state.deps.pool(), id, &url, body.is_primary).await?;
    Ok((StatusCode::CREATED, Json(domain)))
}

// --- Content tracking ---

fn outcome_json(url: &str, outcome: &TrackOutcome) -> Value {
    let mut entry = json!({ "url": url, "status": outcome.label() });
    match outcome {
        TrackOutcome::Baseline { version } | TrackOutcome::Unchanged { version } => {
            entry["version"] = json!(version);
        }
        TrackOutcome::Changed { change } => {
            entry["version"] = json!(change.new_version);
            entry["change"] = json!(change);
        }
        TrackOutcome::FetchFailed { error } => {
            entry["error"] = json!(error);
        }
    }
    entry
}

/// Check every tracked page of a competitor. Falls back to the competitor's
/// own `domain` when no domains are registered.
pub async fn track(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let competitor = owned_competitor(&state, &user, id).await?;

    let mut urls: Vec<String> = domains::list_for_competitor(state.deps.pool(), id)
        .await?
        .into_iter()
        .map(|d| normalize_website(&d.url))
        .collect();
    if urls.is_empty() {
        if let Some(domain) = &competitor.domain {
            urls.push(normalize_website(domain));
        }
    }
    if urls.is_empty() {
        return Err(ApiError::bad_request("Competitor has no domains to track"));
    }

    let mut results = Vec::with_capacity(urls.len());
    for url in &urls {
        match state.deps.tracker.check(id, url).await {
            Ok(outcome) => results.push(outcome_json(url, &outcome)),
            Err(e) => {
                warn!(competitor_id = %id, url = url.as_str(), error = %e, "Tracking failed");
                results.push(json!({ "url": url, "status": "error", "error": format!("{e:#}") }));
            }
        }
    }

    Ok(Json(json!({ "competitor_id": id, "results": results })))
}

pub async fn changes(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<LimitQuery>,
) -> ApiResult<Json<Vec<ContentChange>>> {
    owned_competitor(&state, &user, id).await?;
    Ok(Json(
        content::list_changes(state.deps.pool(), id, params.limit_or(50)).await?,
    ))
}
