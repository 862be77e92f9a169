use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use onside_common::Company;
use onside_store::companies::{self, CompanyUpdate, NewCompany};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::rest::{clean, owned_company, required};
use crate::AppState;

#[derive(Deserialize)]
pub struct CompanyBody {
    name: String,
    domain: Option<String>,
    industry: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
pub struct CompanyPatch {
    name: Option<String>,
    domain: Option<String>,
    industry: Option<String>,
    description: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Company>>> {
    Ok(Json(companies::list_for_user(state.deps.pool(), user.id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CompanyBody>,
) -> ApiResult<(StatusCode, Json<Company>)> {
    let company = companies::create(
        state.deps.pool(),
        NewCompany {
            user_id: user.id,
            name: required(&body.name, "name")?,
            domain: clean(body.domain),
            industry: clean(body.industry),
            description: clean(body.description),
        },
    )
    .await?;

    info!(company_id = %company.id, user_id = %user.id, "Company created");
    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Company>> {
    Ok(Json(owned_company(&state, &user, id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CompanyPatch>,
) -> ApiResult<Json<Company>> {
    owned_company(&state, &user, id).await?;

    let name = match body.name {
        Some(name) => Some(required(&name, "name")?),
        None => None,
    };
    let update = CompanyUpdate {
        name,
        domain: clean(body.domain),
        industry: clean(body.industry),
        description: clean(body.description),
    };

    let company = companies::update(state.deps.pool(), id, update)
        .await?
        .ok_or(ApiError::NotFound("Company"))?;
    Ok(Json(company))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned_company(&state, &user, id).await?;
    companies::delete(state.deps.pool(), id).await?;
    info!(company_id = %id, "Company deleted");
    Ok(StatusCode::NO_CONTENT)
}
