use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

use super::{blocking, ApiJson, AppState};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{ClaimUsername, LinkWallet, NewSite};
use crate::{sites, users};

pub async fn profile(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let user = blocking(move || Ok(users::profile(state.accounts.as_ref(), &user.clerk_id)?)).await?;
    Ok(Json(json!({ "user": user })))
}

pub async fn claim_username(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<ClaimUsername>,
) -> Result<Json<Value>, ApiError> {
    let user = blocking(move || {
        Ok(users::claim_username(
            state.accounts.as_ref(),
            &user.clerk_id,
            &request.username,
        )?)
    })
    .await?;
    Ok(Json(json!({ "user": user })))
}

pub async fn link_wallet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<LinkWallet>,
) -> Result<Json<Value>, ApiError> {
    let user = blocking(move || {
        Ok(users::link_wallet(
            state.accounts.as_ref(),
            &user.clerk_id,
            &request.wallet_address,
        )?)
    })
    .await?;
    Ok(Json(json!({ "user": user })))
}

pub async fn list_sites(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let rows = blocking(move || Ok(sites::list_sites(state.accounts.as_ref(), &user.clerk_id)?)).await?;
    Ok(Json(json!({ "sites": rows })))
}

pub async fn create_site(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<NewSite>,
) -> Result<Json<Value>, ApiError> {
    let site = blocking(move || Ok(sites::create_site(state.accounts.as_ref(), &user.clerk_id, request)?)).await?;
    Ok(Json(json!({ "site": site })))
}
