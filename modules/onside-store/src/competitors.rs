use anyhow::Result;
use chrono::Utc;
use onside_common::Competitor;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const COLUMNS: &str =
    "id, company_id, name, domain, description, is_active, created_at, updated_at";

pub struct NewCompetitor {
    pub company_id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub description: Option<String>,
}

#[derive(Default)]
pub struct CompetitorUpdate {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn create(pool: &PgPool, new: NewCompetitor) -> Result<Competitor> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO competitors (id, company_id, name, domain, description, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(new.company_id)
    .bind(&new.name)
    .bind(&new.domain)
    .bind(&new.description)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    row_to_competitor(row)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Competitor>> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM competitors WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_competitor).transpose()
}

/// Competitor by id, only if its company is owned by `user_id`.
pub async fn find_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Competitor>> {
    let row = sqlx::query(
        r#"
        SELECT c.id, c.company_id, c.name, c.domain, c.description, c.is_active,
               c.created_at, c.updated_at
        FROM competitors c
        JOIN companies co ON co.id = c.company_id
        WHERE c.id = $1 AND co.user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_competitor).transpose()
}

pub async fn list_by_company(pool: &PgPool, company_id: Uuid) -> Result<Vec<Competitor>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM competitors WHERE company_id = $1 ORDER BY name"
    ))
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_competitor).collect()
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    update: CompetitorUpdate,
) -> Result<Option<Competitor>> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE competitors SET
            name        = COALESCE($2, name),
            domain      = COALESCE($3, domain),
            description = COALESCE($4, description),
            is_active   = COALESCE($5, is_active),
            updated_at  = $6
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&update.name)
    .bind(&update.domain)
    .bind(&update.description)
    .bind(update.is_active)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    row.map(row_to_competitor).transpose()
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM competitors WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_competitor(r: PgRow) -> Result<Competitor> {
    Ok(Competitor {
        id: r.try_get("id")?,
        company_id: r.try_get("company_id")?,
        name: r.try_get("name")?,
        domain: r.try_get("domain")?,
        description: r.try_get("description")?,
        is_active: r.try_get("is_active")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}
