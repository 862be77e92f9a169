use anyhow::Result;
use chrono::Utc;
use onside_common::{Report, ReportStatus, ReportType};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::row::text_enum;

const COLUMNS: &str = "id, company_id, competitor_id, report_type, status, title, content, \
     chain_of_thought, confidence_score, fallback_count, provider_used, error_message, \
     created_at, completed_at";

pub struct NewReport {
    pub company_id: Uuid,
    pub competitor_id: Option<Uuid>,
    pub report_type: ReportType,
    pub title: String,
}

/// Everything written when generation succeeds.
pub struct ReportCompletion {
    pub content: serde_json::Value,
    pub chain_of_thought: serde_json::Value,
    pub confidence_score: f64,
    pub fallback_count: i32,
    pub provider_used: String,
}

pub async fn create(pool: &PgPool, new: NewReport) -> Result<Report> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO reports (id, company_id, competitor_id, report_type, status, title, fallback_count, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, 0, $7)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(new.company_id)
    .bind(new.competitor_id)
    .bind(new.report_type.as_str())
    .bind(ReportStatus::Pending.as_str())
    .bind(&new.title)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    row_to_report(row)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Report>> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM reports WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_report).transpose()
}

/// Report by id, only if its company is owned by `user_id`.
pub async fn find_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Report>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {COLUMNS} FROM reports
        WHERE id = $1
          AND company_id IN (SELECT id FROM companies WHERE user_id = $2)
        "#
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_report).transpose()
}

pub async fn list_by_company(pool: &PgPool, company_id: Uuid, limit: u32) -> Result<Vec<Report>> {
    let limit = limit.min(100) as i64;
    let rows = sqlx::query(&format!(
        r#"
        SELECT {COLUMNS} FROM reports
        WHERE company_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#
    ))
    .bind(company_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_report).collect()
}

/// Move a pending report to processing. Returns false if it was not pending.
pub async fn mark_processing(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE reports SET status = $2 WHERE id = $1 AND status = $3")
        .bind(id)
        .bind(ReportStatus::Processing.as_str())
        .bind(ReportStatus::Pending.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn complete(pool: &PgPool, id: Uuid, done: ReportCompletion) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE reports SET
            status           = $2,
            content          = $3,
            chain_of_thought = $4,
            confidence_score = $5,
            fallback_count   = $6,
            provider_used    = $7,
            error_message    = NULL,
            completed_at     = $8
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(ReportStatus::Completed.as_str())
    .bind(&done.content)
    .bind(&done.chain_of_thought)
    .bind(done.confidence_score)
    .bind(done.fallback_count)
    .bind(&done.provider_used)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fail(pool: &PgPool, id: Uuid, error_message: &str, fallback_count: i32) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE reports SET
            status         = $2,
            error_message  = $3,
            fallback_count = $4,
            completed_at   = $5
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(ReportStatus::Failed.as_str())
    .bind(error_message)
    .bind(fallback_count)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

fn row_to_report(r: PgRow) -> Result<Report> {
    Ok(Report {
        id: r.try_get("id")?,
        company_id: r.try_get("company_id")?,
        competitor_id: r.try_get("competitor_id")?,
        report_type: text_enum(&r, "report_type")?,
        status: text_enum(&r, "status")?,
        title: r.try_get("title")?,
        content: r.try_get("content")?,
        chain_of_thought: r.try_get("chain_of_thought")?,
        confidence_score: r.try_get("confidence_score")?,
        fallback_count: r.try_get("fallback_count")?,
        provider_used: r.try_get("provider_used")?,
        error_message: r.try_get("error_message")?,
        created_at: r.try_get("created_at")?,
        completed_at: r.try_get("completed_at")?,
    })
}
