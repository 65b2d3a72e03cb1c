//! Persistence seam between the marketplace services and the database.
//!
//! Both traits are synchronous: the Postgres implementation runs diesel on
//! a pooled connection, and HTTP handlers call into it from tokio's blocking
//! pool.

use uuid::Uuid;

use crate::models::{Listing, ListingStatus, MarketStats, Offer, OfferStatus, Sale, Site, User};

#[cfg(test)]
pub mod memory;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("Unique constraint violated: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Query(diesel::result::Error),
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            ) => StoreError::Conflict(info.message().to_string()),
            other => StoreError::Query(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub status: Option<ListingStatus>,
    pub seller_address: Option<String>,
    pub ethscription_id: Option<String>,
    pub name: Option<String>,
    pub limit: Option<i64>,
}

pub trait MarketplaceStore: Send + Sync {
    fn insert_listing(&self, listing: &Listing) -> StoreResult<()>;
    fn active_listing(&self, ethscription_id: &str) -> StoreResult<Option<Listing>>;
    /// Newest first.
    fn listings(&self, filter: &ListingFilter) -> StoreResult<Vec<Listing>>;
    fn set_listing_status(&self, id: Uuid, status: ListingStatus) -> StoreResult<()>;
    fn count_active_listings(&self) -> StoreResult<i64>;

    /// Sells the listing: flips it to `sold` and inserts `sale`. With an
    /// accepted offer, also marks that offer `accepted` and rejects the other
    /// pending offers on the same ethscription. All or nothing; fails with
    /// `Conflict` when the listing is no longer active.
    fn complete_sale(&self, listing_id: Uuid, sale: &Sale, accepted_offer: Option<Uuid>) -> StoreResult<()>;
    /// Newest first.
    fn recent_sales(&self, limit: i64) -> StoreResult<Vec<Sale>>;
    fn sales_for(&self, ethscription_id: &str) -> StoreResult<Vec<Sale>>;
    fn all_sales(&self) -> StoreResult<Vec<Sale>>;

    fn insert_offer(&self, offer: &Offer) -> StoreResult<()>;
    fn offer(&self, id: Uuid) -> StoreResult<Option<Offer>>;
    fn set_offer_status(&self, id: Uuid, status: OfferStatus) -> StoreResult<()>;
    /// Newest first.
    fn recent_offers(&self, limit: i64) -> StoreResult<Vec<Offer>>;

    /// `None` when the stats view is not installed.
    fn stats_view(&self) -> StoreResult<Option<MarketStats>>;
}

pub trait AccountStore: Send + Sync {
    fn user(&self, clerk_id: &str) -> StoreResult<Option<User>>;
    /// Case-insensitive match.
    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// Creates the user row when it does not exist yet.
    fn upsert_username(&self, clerk_id: &str, username: &str) -> StoreResult<User>;
    fn upsert_wallet(&self, clerk_id: &str, wallet_address: &str) -> StoreResult<User>;

    fn insert_site(&self, site: &Site) -> StoreResult<()>;
    fn site_by_slug(&self, slug: &str) -> StoreResult<Option<Site>>;
    fn sites_for(&self, clerk_id: &str) -> StoreResult<Vec<Site>>;
}
