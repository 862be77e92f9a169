use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{Duration, Utc};
use onside_common::{LlmFallback, Report, ReportStatus, ReportType};
use onside_engine::{deliver_report, export_json, DeliverySummary};
use onside_store::reports::{self, NewReport};
use onside_store::{email, fallbacks};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::rest::{clean, owned_company, owned_competitor, owned_report, LimitQuery};
use crate::AppState;

#[derive(Deserialize)]
pub struct ReportBody {
    report_type: ReportType,
    competitor_id: Option<Uuid>,
    title: Option<String>,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    days: Option<i64>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
    Query(params): Query<LimitQuery>,
) -> ApiResult<Json<Vec<Report>>> {
    owned_company(&state, &user, company_id).await?;
    Ok(Json(
        reports::list_by_company(state.deps.pool(), company_id, params.limit_or(50)).await?,
    ))
}

/// Create a pending report and generate it in the background. Poll
/// `GET /api/reports/{id}` for the result.
pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
    Json(body): Json<ReportBody>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    let company = owned_company(&state, &user, company_id).await?;

    let competitor = match body.competitor_id {
        Some(cid) => {
            let competitor = owned_competitor(&state, &user, cid).await?;
            if competitor.company_id != company_id {
                return Err(ApiError::bad_request(
                    "Competitor does not belong to this company",
                ));
            }
            Some(competitor)
        }
        None => None,
    };
    if body.report_type == ReportType::Competitor && competitor.is_none() {
        return Err(ApiError::bad_request(
            "competitor_id is required for competitor reports",
        ));
    }

    let title = clean(body.title).unwrap_or_else(|| {
        let subject = competitor
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or(company.name.as_str());
        format!("{} report: {subject}", body.report_type)
    });

    let report = reports::create(
        state.deps.pool(),
        NewReport {
            company_id,
            competitor_id: body.competitor_id,
            report_type: body.report_type,
            title,
        },
    )
    .await?;
    info!(report_id = %report.id, report_type = %report.report_type, "Report queued");

    let generator = state.deps.generator.clone();
    let report_id = report.id;
    tokio::spawn(async move {
        if let Err(e) = generator.generate(report_id).await {
            error!(%report_id, error = format!("{e:#}"), "Report generation errored");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(report)))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Report>> {
    Ok(Json(owned_report(&state, &user, id).await?))
}

/// Audit trail of provider fallbacks for one report.
pub async fn fallbacks(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<LlmFallback>>> {
    owned_report(&state, &user, id).await?;
    Ok(Json(fallbacks::list_by_report(state.deps.pool(), id).await?))
}

pub async fn export(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let report = owned_report(&state, &user, id).await?;
    if !report.status.is_terminal() {
        return Err(ApiError::bad_request(format!(
            "Report is still {}",
            report.status
        )));
    }

    let path = export_json(&report, &state.deps.file_config.reports.export_dir).await?;
    Ok(Json(json!({
        "path": path.display().to_string(),
        "report": report,
    })))
}

pub async fn deliver(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeliverySummary>> {
    let report = owned_report(&state, &user, id).await?;
    if report.status != ReportStatus::Completed {
        return Err(ApiError::bad_request(
            "Only completed reports can be delivered",
        ));
    }

    let recipients = email::list_recipients(state.deps.pool(), report.company_id, true).await?;
    if recipients.is_empty() {
        return Err(ApiError::bad_request("Company has no active recipients"));
    }

    let summary = deliver_report(
        state.deps.pool(),
        state.deps.mailer.as_ref(),
        &report,
        &recipients,
    )
    .await?;
    info!(report_id = %id, sent = summary.sent, failed = summary.failed, "Report delivered");
    Ok(Json(summary))
}

/// Fallback counts, tokens and latency per provider and reason over the
/// last `days` days, across the caller's companies.
pub async fn fallback_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<StatsQuery>,
) -> ApiResult<Json<Value>> {
    let days = params.days.unwrap_or(7).clamp(1, 90);
    let since = Utc::now() - Duration::days(days);
    let usage = fallbacks::usage_by_reason(state.deps.pool(), user.id, since).await?;

    let total: i64 = usage.iter().map(|u| u.count).sum();
    let prompt_tokens: i64 = usage.iter().map(|u| u.prompt_tokens).sum();
    let completion_tokens: i64 = usage.iter().map(|u| u.completion_tokens).sum();

    Ok(Json(json!({
        "since": since,
        "days": days,
        "total": total,
        "prompt_tokens": prompt_tokens,
        "completion_tokens": completion_tokens,
        "counts": usage,
    })))
}
