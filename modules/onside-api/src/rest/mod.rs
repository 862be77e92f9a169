pub mod auth;
pub mod companies;
pub mod competitors;
pub mod recipients;
pub mod reports;
pub mod schedules;

use onside_common::{Company, Competitor, Report, ReportSchedule};
use onside_store::{companies as company_store, competitors as competitor_store};
use onside_store::{reports as report_store, schedules as schedule_store};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

// --- Query structs ---

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<u32>,
}

impl LimitQuery {
    pub fn limit_or(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default).clamp(1, 200)
    }
}

// --- Helpers ---

/// Someone else's resource answers 404, same as a missing one.
pub async fn owned_company(state: &AppState, user: &AuthUser, id: Uuid) -> ApiResult<Company> {
    company_store::find_owned(state.deps.pool(), id, user.id)
        .await?
        .ok_or(ApiError::NotFound("Company"))
}

pub async fn owned_competitor(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> ApiResult<Competitor> {
    competitor_store::find_owned(state.deps.pool(), id, user.id)
        .await?
        .ok_or(ApiError::NotFound("Competitor"))
}

pub async fn owned_report(state: &AppState, user: &AuthUser, id: Uuid) -> ApiResult<Report> {
    report_store::find_owned(state.deps.pool(), id, user.id)
        .await?
        .ok_or(ApiError::NotFound("Report"))
}

pub async fn owned_schedule(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> ApiResult<ReportSchedule> {
    schedule_store::find_owned(state.deps.pool(), id, user.id)
        .await?
        .ok_or(ApiError::NotFound("Schedule"))
}

/// Trimmed, or `None` when blank.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required(value: &str, field: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_drops_blank_values() {
        assert_eq!(clean(Some("  ".into())), None);
        assert_eq!(clean(Some(" acme.com ".into())).as_deref(), Some("acme.com"));
        assert_eq!(clean(None), None);
    }

    #[test]
    fn required_rejects_blank() {
        assert!(required("   ", "name").is_err());
        assert_eq!(required(" Acme ", "name").unwrap(), "Acme");
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(LimitQuery { limit: None }.limit_or(50), 50);
        assert_eq!(LimitQuery { limit: Some(0) }.limit_or(50), 1);
        assert_eq!(LimitQuery { limit: Some(5000) }.limit_or(50), 200);
    }
}
