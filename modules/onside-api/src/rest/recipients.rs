use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use onside_common::EmailRecipient;
use onside_store::email;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::rest::{clean, owned_company};
use crate::AppState;

#[derive(Deserialize)]
pub struct RecipientBody {
    email: String,
    name: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
) -> ApiResult<Json<Vec<EmailRecipient>>> {
    owned_company(&state, &user, company_id).await?;
    Ok(Json(
        email::list_recipients(state.deps.pool(), company_id, false).await?,
    ))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
    Json(body): Json<RecipientBody>,
) -> ApiResult<(StatusCode, Json<EmailRecipient>)> {
    owned_company(&state, &user, company_id).await?;

    let address = body.email.trim().to_lowercase();
    if !address.contains('@') {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    let name = clean(body.name);

    match email::add_recipient(state.deps.pool(), company_id, &address, name.as_deref()).await {
        Ok(recipient) => Ok((StatusCode::CREATED, Json(recipient))),
        Err(e) if onside_store::is_unique_violation(&e) => Err(ApiError::Conflict(format!(
            "{address} is already a recipient"
        ))),
        Err(e) => Err(e.into()),
    }
}
