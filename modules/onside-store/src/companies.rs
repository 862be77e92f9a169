use anyhow::Result;
use chrono::Utc;
use onside_common::Company;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const COLUMNS: &str =
    "id, user_id, name, domain, industry, description, created_at, updated_at";

pub struct NewCompany {
    pub user_id: Uuid,
    pub name: String,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Default)]
pub struct CompanyUpdate {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
}

pub async fn create(pool: &PgPool, new: NewCompany) -> Result<Company> {
    let now = Utc::now();
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO companies (id, user_id, name, domain, industry, description, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(&new.name)
    .bind(&new.domain)
    .bind(&new.industry)
    .bind(&new.description)
    .bind(now)
    .fetch_one(pool)
    .await?;

    row_to_company(row)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Company>> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM companies WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_company).transpose()
}

/// Company by id, only if owned by `user_id`.
pub async fn find_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<Company>> {
    let row = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM companies WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_company).transpose()
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Company>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM companies WHERE user_id = $1 ORDER BY name"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_company).collect()
}

pub async fn update(pool: &PgPool, id: Uuid, update: CompanyUpdate) -> Result<Option<Company>> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE companies SET
            name        = COALESCE($2, name),
            domain      = COALESCE($3, domain),
            industry    = COALESCE($4, industry),
            description = COALESCE($5, description),
            updated_at  = $6
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&update.name)
    .bind(&update.domain)
    .bind(&update.industry)
    .bind(&update.description)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    row.map(row_to_company).transpose()
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM companies WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_company(r: PgRow) -> Result<Company> {
    Ok(Company {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        name: r.try_get("name")?,
        domain: r.try_get("domain")?,
        industry: r.try_get("industry")?,
        description: r.try_get("description")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}
