use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{clamp_limit, ServiceError, ServiceResult};
use crate::models::{Listing, Offer, Sale};
use crate::store::{ListingFilter, MarketplaceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Listing,
    Sale,
    Offer,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Listing => "listing",
            ActivityType::Sale => "sale",
            ActivityType::Offer => "offer",
        }
    }

    pub fn parse(value: &str) -> ServiceResult<Self> {
        match value {
            "listing" => Ok(ActivityType::Listing),
            "sale" => Ok(ActivityType::Sale),
            "offer" => Ok(ActivityType::Offer),
            other => Err(ServiceError::Invalid(format!(
                "Invalid type: {} (expected listing, sale or offer)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    /// `"{type}-{row_id}"`, unique across the three source tables.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub ethscription_id: String,
    pub name: Option<String>,
    pub price_eth: f64,
    pub seller: Option<String>,
    pub buyer: Option<String>,
    pub tx_hash: Option<String>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Listing> for ActivityItem {
    fn from(listing: Listing) -> Self {
        Self {
            id: format!("listing-{}", listing.id),
            kind: ActivityType::Listing,
            ethscription_id: listing.ethscription_id,
            name: Some(listing.name),
            price_eth: listing.price_eth,
            seller: Some(listing.seller_address),
            buyer: None,
            tx_hash: None,
            status: Some(listing.status),
            created_at: listing.created_at,
        }
    }
}

impl From<Sale> for ActivityItem {
    fn from(sale: Sale) -> Self {
        Self {
            id: format!("sale-{}", sale.id),
            kind: ActivityType::Sale,
            ethscription_id: sale.ethscription_id,
            name: sale.name,
            price_eth: sale.sale_price_eth,
            seller: Some(sale.seller_address),
            buyer: Some(sale.buyer_address),
            tx_hash: Some(sale.purchase_tx),
            status: None,
            created_at: sale.created_at,
        }
    }
}

impl From<Offer> for ActivityItem {
    fn from(offer: Offer) -> Self {
        Self {
            id: format!("offer-{}", offer.id),
            kind: ActivityType::Offer,
            ethscription_id: offer.ethscription_id,
            name: None,
            price_eth: offer.offer_eth,
            seller: None,
            buyer: Some(offer.buyer_address),
            tx_hash: Some(offer.offer_tx),
            status: Some(offer.status),
            created_at: offer.created_at,
        }
    }
}

/// Merges per-table pages into one feed, newest first, truncated to `limit`.
///
/// Each input is already capped at `limit`, so a type that dominates recent
/// activity can crowd out older rows of the other types.
pub fn merge_activity(listings: Vec<Listing>, sales: Vec<Sale>, offers: Vec<Offer>, limit: usize) -> Vec<ActivityItem> {
    let mut items: Vec<ActivityItem> = listings
        .into_iter()
        .map(ActivityItem::from)
        .chain(sales.into_iter().map(ActivityItem::from))
        .chain(offers.into_iter().map(ActivityItem::from))
        .collect();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items.truncate(limit);
    items
}

pub fn activity(
    store: &dyn MarketplaceStore,
    type_filter: Option<&str>,
    limit: Option<i64>,
) -> ServiceResult<Vec<ActivityItem>> {
    let kind = type_filter.map(ActivityType::parse).transpose()?;
    let limit = clamp_limit(limit);
    let wants = |t: ActivityType| kind.map_or(true, |k| k == t);

    let listings = if wants(ActivityType::Listing) {
        store.listings(&ListingFilter {
            limit: Some(limit),
            ..Default::default()
        })?
    } else {
        Vec::new()
    };
    let sales = if wants(ActivityType::Sale) {
        store.recent_sales(limit)?
    } else {
        Vec::new()
    };
    let offers = if wants(ActivityType::Offer) {
        store.recent_offers(limit)?
    } else {
        Vec::new()
    };

    Ok(merge_activity(listings, sales, offers, limit as usize))
}
