use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{blocking, ApiJson, ApiPath, ApiQuery, AppState};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::marketplace::history::{HistoryKey, PriceHistory};
use crate::marketplace::listings::{CancelOutcome, ListingQuery};
use crate::marketplace::{activity as feed, history as price_history, listings, offers, stats as market};
use crate::models::{NewListing, NewOffer, OfferResponse, PurchaseRequest};
use crate::users;

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub name: Option<String>,
    pub ethscription_id: Option<String>,
}

pub async fn list_listings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListingQuery>,
) -> Result<Json<Value>, ApiError> {
    let rows = blocking(move || Ok(listings::list_listings(state.marketplace.as_ref(), &query)?)).await?;
    Ok(Json(json!({ "listings": rows })))
}

pub async fn create_listing(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<NewListing>,
) -> Result<Json<Value>, ApiError> {
    let listing = blocking(move || {
        let seller = users::wallet_of(state.accounts.as_ref(), &user.clerk_id)?;
        Ok(listings::create_listing(state.marketplace.as_ref(), &seller, request)?)
    })
    .await?;
    Ok(Json(json!({ "listing": listing })))
}

pub async fn cancel_listing(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(ethscription_id): ApiPath<String>,
) -> Result<Json<Value>, ApiError> {
    let outcome = blocking(move || {
        let seller = users::wallet_of(state.accounts.as_ref(), &user.clerk_id)?;
        Ok(listings::cancel_listing(
            state.marketplace.as_ref(),
            &ethscription_id,
            Some(&seller),
        )?)
    })
    .await?;
    match outcome {
        CancelOutcome::Cancelled(listing) => Ok(Json(json!({ "success": true, "listing": listing }))),
        CancelOutcome::NoActiveListing => Err(ApiError::NotFound("No active listing found".to_string())),
    }
}

pub async fn purchase(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<PurchaseRequest>,
) -> Result<Json<Value>, ApiError> {
    let sale = blocking(move || {
        let buyer = users::wallet_of(state.accounts.as_ref(), &user.clerk_id)?;
        Ok(listings::purchase(
            state.marketplace.as_ref(),
            &buyer,
            &request.ethscription_id,
            &request.purchase_tx,
        )?)
    })
    .await?;
    Ok(Json(json!({ "sale": sale })))
}

pub async fn create_offer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<NewOffer>,
) -> Result<Json<Value>, ApiError> {
    let offer = blocking(move || {
        let buyer = users::wallet_of(state.accounts.as_ref(), &user.clerk_id)?;
        Ok(offers::create_offer(state.marketplace.as_ref(), &buyer, request)?)
    })
    .await?;
    Ok(Json(json!({ "offer": offer })))
}

pub async fn respond_to_offer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(offer_id): ApiPath<Uuid>,
    ApiJson(response): ApiJson<OfferResponse>,
) -> Result<Json<Value>, ApiError> {
    let decision = blocking(move || {
        let seller = users::wallet_of(state.accounts.as_ref(), &user.clerk_id)?;
        Ok(offers::respond_to_offer(
            state.marketplace.as_ref(),
            &seller,
            offer_id,
            response.accept,
        )?)
    })
    .await?;
    Ok(Json(json!({ "offer": decision.offer, "sale": decision.sale })))
}

pub async fn activity(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ActivityParams>,
) -> Result<Json<Value>, ApiError> {
    let items = blocking(move || {
        Ok(feed::activity(
            state.marketplace.as_ref(),
            params.kind.as_deref(),
            params.limit,
        )?)
    })
    .await?;
    Ok(Json(json!({ "activity": items })))
}

pub async fn history(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HistoryParams>,
) -> Result<Json<PriceHistory>, ApiError> {
    let key = match (params.ethscription_id, params.name) {
        (Some(id), _) => HistoryKey::EthscriptionId(id),
        (None, Some(name)) => HistoryKey::Name(name),
        (None, None) => return Err(ApiError::BadRequest("name or ethscriptionId is required".to_string())),
    };
    let history = blocking(move || Ok(price_history::history(state.marketplace.as_ref(), key)?)).await?;
    Ok(Json(history))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = blocking(move || Ok(market::market_stats(state.marketplace.as_ref())?)).await?;
    Ok(Json(json!({ "stats": stats })))
}
