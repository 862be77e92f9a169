use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use onside_common::{ReportSchedule, ReportType, ScheduleExecution};
use onside_engine::next_run_after;
use onside_store::schedules::{self, NewSchedule};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::rest::{owned_company, owned_competitor, owned_schedule, LimitQuery};
use crate::AppState;

#[derive(Deserialize)]
pub struct ScheduleBody {
    report_type: ReportType,
    cron_expression: String,
    competitor_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct SchedulePatch {
    is_active: bool,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ReportSchedule>>> {
    owned_company(&state, &user, company_id).await?;
    Ok(Json(
        schedules::list_by_company(state.deps.pool(), company_id).await?,
    ))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
    Json(body): Json<ScheduleBody>,
) -> ApiResult<(StatusCode, Json<ReportSchedule>)> {
    owned_company(&state, &user, company_id).await?;

    if let Some(cid) = body.competitor_id {
        let competitor = owned_competitor(&state, &user, cid).await?;
        if competitor.company_id != company_id {
            return Err(ApiError::bad_request(
                "Competitor does not belong to this company",
            ));
        }
    } else if body.report_type == ReportType::Competitor {
        return Err(ApiError::bad_request(
            "competitor_id is required for competitor schedules",
        ));
    }

    let cron_expression = body.cron_expression.trim().to_string();
    let next_run_at = next_run_after(&cron_expression, Utc::now())?;
    if next_run_at.is_none() {
        return Err(ApiError::bad_request("Cron expression never fires"));
    }

    let schedule = schedules::create(
        state.deps.pool(),
        NewSchedule {
            company_id,
            competitor_id: body.competitor_id,
            report_type: body.report_type,
            cron_expression,
            next_run_at,
        },
    )
    .await?;

    info!(
        schedule_id = %schedule.id,
        cron = schedule.cron_expression.as_str(),
        next_run_at = ?schedule.next_run_at,
        "Schedule created"
    );
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// Pause or resume. Resuming recomputes the next run from now so a long
/// pause does not fire immediately.
pub async fn set_active(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<SchedulePatch>,
) -> ApiResult<Json<ReportSchedule>> {
    let schedule = owned_schedule(&state, &user, id).await?;
    let pool = state.deps.pool();

    if body.is_active && !schedule.is_active {
        let Some(next) = next_run_after(&schedule.cron_expression, Utc::now())? else {
            return Err(ApiError::bad_request(
                "Schedule never fires again and cannot be resumed",
            ));
        };
        schedules::set_next_run(pool, id, Some(next)).await?;
    }
    schedules::set_active(pool, id, body.is_active).await?;

    Ok(Json(owned_schedule(&state, &user, id).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned_schedule(&state, &user, id).await?;
    schedules::delete(state.deps.pool(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn executions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<LimitQuery>,
) -> ApiResult<Json<Vec<ScheduleExecution>>> {
    owned_schedule(&state, &user, id).await?;
    Ok(Json(
        schedules::list_executions(state.deps.pool(), id, params.limit_or(20)).await?,
    ))
}
