use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, State},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::auth;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::ethscriptions::{self, EthscriptionLookup, NameAvailability};
use crate::store::{AccountStore, MarketplaceStore};

mod accounts;
mod marketplace;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub marketplace: Arc<dyn MarketplaceStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub ethscriptions: Arc<dyn EthscriptionLookup>,
}

/// `axum::Json` whose rejections render as `{"error": ..}` with 400.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Runs synchronous store work on the blocking pool.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn check_name(State(state): State<AppState>, ApiPath(name): ApiPath<String>) -> Result<Json<NameAvailability>, ApiError> {
    let availability = ethscriptions::check_name(state.ethscriptions.as_ref(), &name).await?;
    Ok(Json(availability))
}

pub fn router(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(state.clone(), auth::authenticate);

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/marketplace/listings",
            get(marketplace::list_listings).merge(post(marketplace::create_listing).route_layer(auth.clone())),
        )
        .route(
            "/api/marketplace/listings/:ethscription_id",
            delete(marketplace::cancel_listing).route_layer(auth.clone()),
        )
        .route(
            "/api/marketplace/purchase",
            post(marketplace::purchase).route_layer(auth.clone()),
        )
        .route(
            "/api/marketplace/offers",
            post(marketplace::create_offer).route_layer(auth.clone()),
        )
        .route(
            "/api/marketplace/offers/:id/respond",
            post(marketplace::respond_to_offer).route_layer(auth.clone()),
        )
        .route("/api/marketplace/activity", get(marketplace::activity))
        .route("/api/marketplace/history", get(marketplace::history))
        .route("/api/marketplace/stats", get(marketplace::stats))
        .route("/api/names/:name", get(check_name))
        .route("/api/user", get(accounts::profile).route_layer(auth.clone()))
        .route(
            "/api/user/username",
            post(accounts::claim_username).route_layer(auth.clone()),
        )
        .route(
            "/api/user/wallet",
            post(accounts::link_wallet).route_layer(auth.clone()),
        )
        .route(
            "/api/sites",
            get(accounts::list_sites)
                .post(accounts::create_site)
                .route_layer(auth),
        )
        .with_state(state)
}
