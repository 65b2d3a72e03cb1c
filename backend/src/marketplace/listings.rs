use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{clamp_limit, normalize_address, normalize_hash, validate_price, ServiceError, ServiceResult};
use crate::models::{Listing, ListingStatus, NewListing, Sale};
use crate::store::{ListingFilter, MarketplaceStore, StoreError};

pub const DEFAULT_CHAIN: &str = "mainnet";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    /// `active` when absent; `all` disables the filter.
    pub status: Option<String>,
    pub seller: Option<String>,
    pub ethscription_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled(Listing),
    NoActiveListing,
}

pub fn create_listing(
    store: &dyn MarketplaceStore,
    seller_address: &str,
    request: NewListing,
) -> ServiceResult<Listing> {
    let ethscription_id = normalize_hash(&request.ethscription_id, "ethscription id")?;
    let seller_address = normalize_address(seller_address)?;
    let price_eth = validate_price(request.price_eth, "Price")?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ServiceError::Invalid("Name is required".to_string()));
    }

    if store.active_listing(&ethscription_id)?.is_some() {
        return Err(ServiceError::Invalid("Already listed".to_string()));
    }

    let listing = Listing {
        id: Uuid::new_v4(),
        ethscription_id,
        name: name.to_string(),
        price_eth,
        seller_address,
        chain: request
            .chain
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CHAIN.to_string()),
        status: ListingStatus::Active.as_str().to_string(),
        created_at: Utc::now(),
    };
    store.insert_listing(&listing)?;
    log::info!(
        "Listed {} ({}) at {} ETH by {}",
        listing.name,
        listing.ethscription_id,
        listing.price_eth,
        listing.seller_address
    );
    Ok(listing)
}

pub fn list_listings(store: &dyn MarketplaceStore, query: &ListingQuery) -> ServiceResult<Vec<Listing>> {
    let status = match query.status.as_deref() {
        None => Some(ListingStatus::Active),
        Some("all") => None,
        Some(other) => Some(
            ListingStatus::parse(other)
                .ok_or_else(|| ServiceError::Invalid(format!("Unknown listing status: {}", other)))?,
        ),
    };
    let filter = ListingFilter {
        status,
        seller_address: query.seller.as_deref().map(normalize_address).transpose()?,
        ethscription_id: query
            .ethscription_id
            .as_deref()
            .map(|id| normalize_hash(id, "ethscription id"))
            .transpose()?,
        name: None,
        limit: Some(clamp_limit(query.limit)),
    };
    Ok(store.listings(&filter)?)
}

/// Moves the active listing for `ethscription_id` to `cancelled`.
///
/// A missing active listing is reported, not treated as a failure. When a
/// requester is given it must be the seller.
pub fn cancel_listing(
    store: &dyn MarketplaceStore,
    ethscription_id: &str,
    requester: Option<&str>,
) -> ServiceResult<CancelOutcome> {
    let ethscription_id = normalize_hash(ethscription_id, "ethscription id")?;
    let Some(listing) = store.active_listing(&ethscription_id)? else {
        log::info!("No active listing found for {}", ethscription_id);
        return Ok(CancelOutcome::NoActiveListing);
    };

    if let Some(requester) = requester {
        if normalize_address(requester)? != listing.seller_address {
            return Err(ServiceError::Forbidden("Only the seller can cancel this listing".to_string()));
        }
    }

    store.set_listing_status(listing.id, ListingStatus::Cancelled)?;
    log::info!("Cancelled listing {} for {}", listing.id, ethscription_id);
    Ok(CancelOutcome::Cancelled(Listing {
        status: ListingStatus::Cancelled.as_str().to_string(),
        ..listing
    }))
}

/// Records a completed purchase of the active listing at its asking price.
pub fn purchase(
    store: &dyn MarketplaceStore,
    buyer_address: &str,
    ethscription_id: &str,
    purchase_tx: &str,
) -> ServiceResult<Sale> {
    let ethscription_id = normalize_hash(ethscription_id, "ethscription id")?;
    let purchase_tx = normalize_hash(purchase_tx, "transaction hash")?;
    let buyer_address = normalize_address(buyer_address)?;

    let listing = store
        .active_listing(&ethscription_id)?
        .ok_or_else(|| ServiceError::NotFound("No active listing found".to_string()))?;
    if listing.seller_address == buyer_address {
        return Err(ServiceError::Invalid("Cannot buy your own listing".to_string()));
    }

    record_sale(store, &listing, buyer_address, listing.price_eth, purchase_tx, None)
}

/// Sells `listing` in one store write; `accepted_offer` is set when the sale
/// comes from accepting an offer.
pub(super) fn record_sale(
    store: &dyn MarketplaceStore,
    listing: &Listing,
    buyer_address: String,
    price_eth: f64,
    purchase_tx: String,
    accepted_offer: Option<Uuid>,
) -> ServiceResult<Sale> {
    let sale = Sale {
        id: Uuid::new_v4(),
        ethscription_id: listing.ethscription_id.clone(),
        name: Some(listing.name.clone()),
        sale_price_eth: price_eth,
        seller_address: listing.seller_address.clone(),
        buyer_address,
        purchase_tx,
        created_at: Utc::now(),
    };
    match store.complete_sale(listing.id, &sale, accepted_offer) {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => {
            return Err(ServiceError::Invalid("Listing is no longer active".to_string()));
        }
        Err(e) => return Err(e.into()),
    }
    log::info!(
        "Sold {} for {} ETH to {}",
        sale.ethscription_id,
        sale.sale_price_eth,
        sale.buyer_address
    );
    Ok(sale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{address, hash, MemoryStore};
    use std::sync::atomic::Ordering;

    fn new_listing(id: u64, price: f64) -> NewListing {
        NewListing {
            ethscription_id: hash(id),
            name: format!("name{}", id),
            price_eth: price,
            chain: None,
        }
    }

    #[test]
    fn create_listing_normalizes_and_defaults_chain() {
        let store = MemoryStore::default();
        let request = NewListing {
            ethscription_id: hash(1).to_uppercase().replace("0X", "0x"),
            ..new_listing(1, 0.5)
        };
        let listing = create_listing(&store, &address(7).to_uppercase().replace("0X", "0x"), request).unwrap();

        assert_eq!(listing.ethscription_id, hash(1));
        assert_eq!(listing.seller_address, address(7));
        assert_eq!(listing.chain, DEFAULT_CHAIN);
        assert!(listing.is_active());
    }

    #[test]
    fn second_active_listing_for_same_id_is_rejected() {
        let store = MemoryStore::default();
        create_listing(&store, &address(1), new_listing(1, 0.5)).unwrap();
        let err = create_listing(&store, &address(1), new_listing(1, 0.6)).unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(msg) if msg == "Already listed"));
    }

    #[test]
    fn relisting_after_cancel_is_allowed() {
        let store = MemoryStore::default();
        create_listing(&store, &address(1), new_listing(1, 0.5)).unwrap();
        cancel_listing(&store, &hash(1), None).unwrap();
        assert!(create_listing(&store, &address(1), new_listing(1, 0.4)).is_ok());
    }

    #[test]
    fn invalid_listing_requests_are_rejected() {
        let store = MemoryStore::default();
        assert!(create_listing(&store, &address(1), new_listing(1, 0.0)).is_err());
        let blank = NewListing {
            name: "  ".to_string(),
            ..new_listing(2, 1.0)
        };
        assert!(create_listing(&store, &address(1), blank).is_err());
        let bad_id = NewListing {
            ethscription_id: "0x12".to_string(),
            ..new_listing(3, 1.0)
        };
        assert!(create_listing(&store, &address(1), bad_id).is_err());
    }

    #[test]
    fn cancel_without_active_listing_is_a_noop() {
        let store = MemoryStore::default();
        assert_eq!(cancel_listing(&store, &hash(9), None).unwrap(), CancelOutcome::NoActiveListing);

        create_listing(&store, &address(1), new_listing(9, 0.5)).unwrap();
        assert!(matches!(
            cancel_listing(&store, &hash(9), None).unwrap(),
            CancelOutcome::Cancelled(_)
        ));
        assert_eq!(cancel_listing(&store, &hash(9), None).unwrap(), CancelOutcome::NoActiveListing);
    }

    #[test]
    fn only_the_seller_can_cancel() {
        let store = MemoryStore::default();
        create_listing(&store, &address(1), new_listing(1, 0.5)).unwrap();
        let err = cancel_listing(&store, &hash(1), Some(&address(2))).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert!(store.active_listing(&hash(1)).unwrap().is_some());
    }

    #[test]
    fn purchase_marks_listing_sold_and_records_sale() {
        let store = MemoryStore::default();
        create_listing(&store, &address(1), new_listing(1, 0.25)).unwrap();

        let sale = purchase(&store, &address(2), &hash(1), &hash(100)).unwrap();
        assert_eq!(sale.sale_price_eth, 0.25);
        assert_eq!(sale.seller_address, address(1));
        assert_eq!(sale.buyer_address, address(2));
        assert_eq!(sale.name.as_deref(), Some("name1"));
        assert!(store.active_listing(&hash(1)).unwrap().is_none());
        assert_eq!(store.sales_for(&hash(1)).unwrap().len(), 1);

        let again = purchase(&store, &address(3), &hash(1), &hash(101)).unwrap_err();
        assert!(matches!(again, ServiceError::NotFound(_)));
    }

    #[test]
    fn failed_sale_write_leaves_listing_for_sale() {
        let store = MemoryStore::default();
        create_listing(&store, &address(1), new_listing(1, 0.25)).unwrap();
        store.fail_sales.store(true, Ordering::SeqCst);

        let err = purchase(&store, &address(2), &hash(1), &hash(100)).unwrap_err();
        assert!(matches!(err, ServiceError::Store(_)));
        assert!(store.active_listing(&hash(1)).unwrap().is_some());
        assert!(store.sales_for(&hash(1)).unwrap().is_empty());

        store.fail_sales.store(false, Ordering::SeqCst);
        assert!(purchase(&store, &address(2), &hash(1), &hash(100)).is_ok());
    }

    #[test]
    fn selling_a_stale_listing_is_rejected() {
        let store = MemoryStore::default();
        let listing = create_listing(&store, &address(1), new_listing(1, 0.25)).unwrap();
        cancel_listing(&store, &hash(1), None).unwrap();

        let err = record_sale(&store, &listing, address(2), 0.25, hash(100), None).unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(msg) if msg == "Listing is no longer active"));
        assert!(store.sales_for(&hash(1)).unwrap().is_empty());
    }

    #[test]
    fn seller_cannot_buy_own_listing() {
        let store = MemoryStore::default();
        create_listing(&store, &address(1), new_listing(1, 0.25)).unwrap();
        let err = purchase(&store, &address(1), &hash(1), &hash(100)).unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
    }

    #[test]
    fn list_filters_by_status() {
        let store = MemoryStore::default();
        create_listing(&store, &address(1), new_listing(1, 0.1)).unwrap();
        create_listing(&store, &address(1), new_listing(2, 0.2)).unwrap();
        cancel_listing(&store, &hash(2), None).unwrap();

        let active = list_listings(&store, &ListingQuery::default()).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].ethscription_id, hash(1));

        let all = list_listings(
            &store,
            &ListingQuery {
                status: Some("all".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(all.len(), 2);

        let bogus = ListingQuery {
            status: Some("pending".to_string()),
            ..Default::default()
        };
        assert!(list_listings(&store, &bogus).is_err());
    }
}
