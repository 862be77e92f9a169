use anyhow::Result;
use chrono::Utc;
use onside_common::{DeliveryStatus, EmailDelivery, EmailRecipient};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::row::text_enum;

// ---------------------------------------------------------------------------
// Recipients
// ---------------------------------------------------------------------------

pub async fn add_recipient(
    pool: &PgPool,
    company_id: Uuid,
    email: &str,
    name: Option<&str>,
) -> Result<EmailRecipient> {
    let row = sqlx::query(
        r#"
        INSERT INTO email_recipients (id, company_id, email, name, is_active, created_at)
        VALUES ($1, $2, $3, $4, TRUE, $5)
        RETURNING id, company_id, email, name, is_active, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(email)
    .bind(name)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    row_to_recipient(row)
}

pub async fn list_recipients(
    pool: &PgPool,
    company_id: Uuid,
    active_only: bool,
) -> Result<Vec<EmailRecipient>> {
    let rows = sqlx::query(
        r#"
        SELECT id, company_id, email, name, is_active, created_at
        FROM email_recipients
        WHERE company_id = $1 AND (is_active OR NOT $2)
        ORDER BY email
        "#,
    )
    .bind(company_id)
    .bind(active_only)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_recipient).collect()
}

// ---------------------------------------------------------------------------
// Deliveries
// ---------------------------------------------------------------------------

pub async fn create_delivery(pool: &PgPool, recipient_id: Uuid, report_id: Uuid) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO email_deliveries (id, recipient_id, report_id, status, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(recipient_id)
    .bind(report_id)
    .bind(DeliveryStatus::Pending.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn mark_sent(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE email_deliveries SET status = $2, sent_at = $3 WHERE id = $1")
        .bind(id)
        .bind(DeliveryStatus::Sent.as_str())
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, id: Uuid, error_message: &str) -> Result<()> {
    sqlx::query("UPDATE email_deliveries SET status = $2, error_message = $3 WHERE id = $1")
        .bind(id)
        .bind(DeliveryStatus::Failed.as_str())
        .bind(error_message)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_deliveries(pool: &PgPool, report_id: Uuid) -> Result<Vec<EmailDelivery>> {
    let rows = sqlx::query(
        r#"
        SELECT id, recipient_id, report_id, status, error_message, sent_at, created_at
        FROM email_deliveries
        WHERE report_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(report_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(EmailDelivery {
                id: r.try_get("id")?,
                recipient_id: r.try_get("recipient_id")?,
                report_id: r.try_get("report_id")?,
                status: text_enum(&r, "status")?,
                error_message: r.try_get("error_message")?,
                sent_at: r.try_get("sent_at")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .collect()
}

fn row_to_recipient(r: PgRow) -> Result<EmailRecipient> {
    Ok(EmailRecipient {
        id: r.try_get("id")?,
        company_id: r.try_get("company_id")?,
        email: r.try_get("email")?,
        name: r.try_get("name")?,
        is_active: r.try_get("is_active")?,
        created_at: r.try_get("created_at")?,
    })
}
