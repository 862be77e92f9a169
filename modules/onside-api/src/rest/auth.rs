use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json};
use onside_common::User;
use onside_store::users;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{hash_password, verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::rest::clean;
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    token: String,
    user: User,
}

fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::bad_request("A valid email address is required")),
    }
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let email = normalize_email(&body.email)?;
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let hash = hash_password(&body.password)?;
    let name = clean(body.name);
    let user = match users::create(state.deps.pool(), &email, &hash, name.as_deref()).await {
        Ok(user) => user,
        Err(e) if onside_store::is_unique_violation(&e) => {
            return Err(ApiError::Conflict("Email already registered".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "User registered");
    let token = state.jwt.create_token(user.id, &user.email)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token, user })))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let email = body.email.trim().to_lowercase();
    let user = users::find_by_email(state.deps.pool(), &email)
        .await?
        .filter(|u| u.is_active)
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&body.password, &user.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let token = state.jwt.create_token(user.id, &user.email)?;
    Ok(Json(TokenResponse { token, user }))
}

pub async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Json<User>> {
    users::find_by_id(state.deps.pool(), user.id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("User"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_lowercased_and_checked() {
        assert_eq!(normalize_email(" Ceo@Acme.COM ").unwrap(), "ceo@acme.com");
        assert!(normalize_email("nobody").is_err());
        assert!(normalize_email("@acme.com").is_err());
        assert!(normalize_email("a@localhost").is_err());
    }
}
