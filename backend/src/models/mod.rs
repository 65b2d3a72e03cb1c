use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Cancelled,
    Sold,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Cancelled => "cancelled",
            ListingStatus::Sold => "sold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ListingStatus::Active),
            "cancelled" => Some(ListingStatus::Cancelled),
            "sold" => Some(ListingStatus::Sold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::marketplace_listings)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub ethscription_id: String,
    pub name: String,
    pub price_eth: f64,
    pub seller_address: String,
    pub chain: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::marketplace_sales)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub ethscription_id: String,
    pub name: Option<String>,
    pub sale_price_eth: f64,
    pub seller_address: String,
    pub buyer_address: String,
    pub purchase_tx: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::marketplace_offers)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: Uuid,
    pub ethscription_id: String,
    pub offer_eth: f64,
    pub buyer_address: String,
    pub offer_tx: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn is_pending(&self) -> bool {
        self.status == OfferStatus::Pending.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub clerk_id: String,
    pub username: Option<String>,
    pub wallet_address: Option<String>,
    pub plan: String,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(clerk_id: &str) -> Self {
        Self {
            clerk_id: clerk_id.to_string(),
            username: None,
            wallet_address: None,
            plan: "free".to_string(),
            stripe_customer_id: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::sites)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: Uuid,
    pub user_id: String,
    pub slug: String,
    pub manifest_tx: Option<String>,
    pub inscription_tx: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Row shape of the `marketplace_stats` view, also produced by the fallback
/// aggregation when the view is missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, QueryableByName)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    #[diesel(sql_type = BigInt)]
    pub active_listings: i64,
    #[diesel(sql_type = BigInt)]
    pub total_sales: i64,
    #[diesel(sql_type = Double)]
    pub total_volume_eth: f64,
    #[diesel(sql_type = Double)]
    pub avg_sale_price_eth: f64,
    #[diesel(sql_type = BigInt)]
    pub unique_sellers: i64,
    #[diesel(sql_type = BigInt)]
    pub unique_buyers: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub ethscription_id: String,
    pub name: String,
    pub price_eth: f64,
    pub chain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOffer {
    pub ethscription_id: String,
    pub offer_eth: f64,
    pub offer_tx: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResponse {
    pub accept: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub ethscription_id: String,
    pub purchase_tx: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimUsername {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkWallet {
    pub wallet_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSite {
    pub slug: String,
    pub manifest_tx: Option<String>,
    pub inscription_tx: Option<String>,
}
