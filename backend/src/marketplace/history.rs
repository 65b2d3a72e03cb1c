use chrono::{DateTime, Utc};
use serde::Serialize;

use super::activity::ActivityType;
use super::{normalize_hash, ServiceError, ServiceResult};
use crate::ethscriptions::ethscription_id_for_name;
use crate::models::{Listing, Sale};
use crate::store::{ListingFilter, MarketplaceStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryKey {
    EthscriptionId(String),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub price: f64,
    pub seller: String,
    pub buyer: Option<String>,
    pub tx_hash: Option<String>,
    pub status: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceStats {
    pub total_sales: usize,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub last_sale_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    pub ethscription_id: String,
    pub name: Option<String>,
    pub history: Vec<HistoryEntry>,
    pub stats: PriceStats,
}

/// Summary over sale prices. Listings never count towards it.
pub fn price_stats(sales: &[Sale]) -> PriceStats {
    if sales.is_empty() {
        return PriceStats {
            total_sales: 0,
            avg_price: 0.0,
            min_price: 0.0,
            max_price: 0.0,
            last_sale_price: None,
        };
    }

    let prices = sales.iter().map(|s| s.sale_price_eth);
    let total: f64 = prices.clone().sum();
    PriceStats {
        total_sales: sales.len(),
        avg_price: total / sales.len() as f64,
        min_price: prices.clone().fold(f64::INFINITY, f64::min),
        max_price: prices.fold(f64::NEG_INFINITY, f64::max),
        last_sale_price: sales
            .iter()
            .max_by_key(|s| s.created_at)
            .map(|s| s.sale_price_eth),
    }
}

/// Interleaves listings and sales, oldest first.
pub fn build_history(listings: &[Listing], sales: &[Sale]) -> Vec<HistoryEntry> {
    let mut history: Vec<HistoryEntry> = listings
        .iter()
        .map(|l| HistoryEntry {
            kind: ActivityType::Listing,
            price: l.price_eth,
            seller: l.seller_address.clone(),
            buyer: None,
            tx_hash: None,
            status: Some(l.status.clone()),
            date: l.created_at,
        })
        .chain(sales.iter().map(|s| HistoryEntry {
            kind: ActivityType::Sale,
            price: s.sale_price_eth,
            seller: s.seller_address.clone(),
            buyer: Some(s.buyer_address.clone()),
            tx_hash: Some(s.purchase_tx.clone()),
            status: None,
            date: s.created_at,
        }))
        .collect();
    history.sort_by(|a, b| a.date.cmp(&b.date));
    history
}

/// Resolves a name through its latest listing, falling back to the content
/// hash of `data:,{name}` for names that were never listed.
fn resolve(store: &dyn MarketplaceStore, key: HistoryKey) -> ServiceResult<(String, Option<String>)> {
    match key {
        HistoryKey::EthscriptionId(id) => Ok((normalize_hash(&id, "ethscription id")?, None)),
        HistoryKey::Name(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::Invalid("Name is required".to_string()));
            }
            let latest = store.listings(&ListingFilter {
                name: Some(name.clone()),
                limit: Some(1),
                ..Default::default()
            })?;
            let id = latest
                .into_iter()
                .next()
                .map(|l| l.ethscription_id)
                .unwrap_or_else(|| ethscription_id_for_name(&name));
            Ok((id, Some(name)))
        }
    }
}

pub fn history(store: &dyn MarketplaceStore, key: HistoryKey) -> ServiceResult<PriceHistory> {
    let (ethscription_id, name) = resolve(store, key)?;
    let listings = store.listings(&ListingFilter {
        ethscription_id: Some(ethscription_id.clone()),
        ..Default::default()
    })?;
    let sales = store.sales_for(&ethscription_id)?;

    Ok(PriceHistory {
        name: name.or_else(|| listings.first().map(|l| l.name.clone())),
        history: build_history(&listings, &sales),
        stats: price_stats(&sales),
        ethscription_id,
    })
}
