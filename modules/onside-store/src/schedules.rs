use anyhow::Result;
use chrono::{DateTime, Utc};
use onside_common::{ExecutionStatus, ReportSchedule, ReportType, ScheduleExecution};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::row::text_enum;

const COLUMNS: &str = "id, company_id, competitor_id, report_type, cron_expression, is_active, \
     last_run_at, next_run_at, created_at";

pub struct NewSchedule {
    pub company_id: Uuid,
    pub competitor_id: Option<Uuid>,
    pub report_type: ReportType,
    pub cron_expression: String,
    pub next_run_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

pub async fn create(pool: &PgPool, new: NewSchedule) -> Result<ReportSchedule> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO report_schedules
            (id, company_id, competitor_id, report_type, cron_expression, is_active, next_run_at, created_at)
        VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(new.company_id)
    .bind(new.competitor_id)
    .bind(new.report_type.as_str())
    .bind(&new.cron_expression)
    .bind(new.next_run_at)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    row_to_schedule(row)
}

pub async fn find_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<ReportSchedule>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {COLUMNS} FROM report_schedules
        WHERE id = $1
          AND company_id IN (SELECT id FROM companies WHERE user_id = $2)
        "#
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_schedule).transpose()
}

pub async fn list_by_company(pool: &PgPool, company_id: Uuid) -> Result<Vec<ReportSchedule>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM report_schedules WHERE company_id = $1 ORDER BY created_at"
    ))
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_schedule).collect()
}

/// Active schedules whose next run is due (or never computed).
pub async fn list_due(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<ReportSchedule>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {COLUMNS} FROM report_schedules
        WHERE is_active AND (next_run_at IS NULL OR next_run_at <= $1)
        ORDER BY next_run_at NULLS FIRST
        "#
    ))
    .bind(now)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_schedule).collect()
}

pub async fn record_run(
    pool: &PgPool,
    id: Uuid,
    ran_at: DateTime<Utc>,
    next_run_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query("UPDATE report_schedules SET last_run_at = $2, next_run_at = $3 WHERE id = $1")
        .bind(id)
        .bind(ran_at)
        .bind(next_run_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_active(pool: &PgPool, id: Uuid, is_active: bool) -> Result<()> {
    sqlx::query("UPDATE report_schedules SET is_active = $2 WHERE id = $1")
        .bind(id)
        .bind(is_active)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_next_run(
    pool: &PgPool,
    id: Uuid,
    next_run_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query("UPDATE report_schedules SET next_run_at = $2 WHERE id = $1")
        .bind(id)
        .bind(next_run_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM report_schedules WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

pub async fn start_execution(pool: &PgPool, schedule_id: Uuid) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO schedule_executions (id, schedule_id, status, started_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(id)
    .bind(schedule_id)
    .bind(ExecutionStatus::Running.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn finish_execution(
    pool: &PgPool,
    id: Uuid,
    report_id: Option<Uuid>,
    status: ExecutionStatus,
    error_message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE schedule_executions SET
            report_id     = $2,
            status        = $3,
            error_message = $4,
            finished_at   = $5
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(report_id)
    .bind(status.as_str())
    .bind(error_message)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_executions(
    pool: &PgPool,
    schedule_id: Uuid,
    limit: u32,
) -> Result<Vec<ScheduleExecution>> {
    let limit = limit.min(200) as i64;
    let rows = sqlx::query(
        r#"
        SELECT id, schedule_id, report_id, status, started_at, finished_at, error_message
        FROM schedule_executions
        WHERE schedule_id = $1
        ORDER BY started_at DESC
        LIMIT $2
        "#,
    )
    .bind(schedule_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(ScheduleExecution {
                id: r.try_get("id")?,
                schedule_id: r.try_get("schedule_id")?,
                report_id: r.try_get("report_id")?,
                status: text_enum(&r, "status")?,
                started_at: r.try_get("started_at")?,
                finished_at: r.try_get("finished_at")?,
                error_message: r.try_get("error_message")?,
            })
        })
        .collect()
}

fn row_to_schedule(r: PgRow) -> Result<ReportSchedule> {
    Ok(ReportSchedule {
        id: r.try_get("id")?,
        company_id: r.try_get("company_id")?,
        competitor_id: r.try_get("competitor_id")?,
        report_type: text_enum(&r, "report_type")?,
        cron_expression: r.try_get("cron_expression")?,
        is_active: r.try_get("is_active")?,
        last_run_at: r.try_get("last_run_at")?,
        next_run_at: r.try_get("next_run_at")?,
        created_at: r.try_get("created_at")?,
    })
}
