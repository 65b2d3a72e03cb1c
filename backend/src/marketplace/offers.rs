use chrono::Utc;
use uuid::Uuid;

use super::listings::record_sale;
use super::{normalize_address, normalize_hash, validate_price, ServiceError, ServiceResult};
use crate::models::{NewOffer, Offer, OfferStatus, Sale};
use crate::store::MarketplaceStore;

#[derive(Debug, Clone, PartialEq)]
pub struct OfferDecision {
    pub offer: Offer,
    /// Present when the offer was accepted.
    pub sale: Option<Sale>,
}

pub fn create_offer(store: &dyn MarketplaceStore, buyer_address: &str, request: NewOffer) -> ServiceResult<Offer> {
    let ethscription_id = normalize_hash(&request.ethscription_id, "ethscription id")?;
    let offer_tx = normalize_hash(&request.offer_tx, "transaction hash")?;
    let buyer_address = normalize_address(buyer_address)?;
    let offer_eth = validate_price(request.offer_eth, "Offer")?;

    let listing = store
        .active_listing(&ethscription_id)?
        .ok_or_else(|| ServiceError::NotFound("No active listing found".to_string()))?;
    if listing.seller_address == buyer_address {
        return Err(ServiceError::Invalid("Cannot make an offer on your own listing".to_string()));
    }

    let offer = Offer {
        id: Uuid::new_v4(),
        ethscription_id,
        offer_eth,
        buyer_address,
        offer_tx,
        status: OfferStatus::Pending.as_str().to_string(),
        created_at: Utc::now(),
    };
    store.insert_offer(&offer)?;
    log::info!("Offer {} of {} ETH on {}", offer.id, offer.offer_eth, offer.ethscription_id);
    Ok(offer)
}

/// Accepting sells the listing to the offer's buyer and rejects every other
/// pending offer on the same ethscription.
pub fn respond_to_offer(
    store: &dyn MarketplaceStore,
    responder_address: &str,
    offer_id: Uuid,
    accept: bool,
) -> ServiceResult<OfferDecision> {
    let responder_address = normalize_address(responder_address)?;
    let offer = store
        .offer(offer_id)?
        .ok_or_else(|| ServiceError::NotFound("Offer not found".to_string()))?;
    if !offer.is_pending() {
        return Err(ServiceError::Invalid(format!("Offer is already {}", offer.status)));
    }

    let listing = store
        .active_listing(&offer.ethscription_id)?
        .ok_or_else(|| ServiceError::NotFound("No active listing found".to_string()))?;
    if listing.seller_address != responder_address {
        return Err(ServiceError::Forbidden("Only the seller can respond to this offer".to_string()));
    }

    if !accept {
        store.set_offer_status(offer.id, OfferStatus::Rejected)?;
        log::info!("Offer {} rejected", offer.id);
        return Ok(OfferDecision {
            offer: Offer {
                status: OfferStatus::Rejected.as_str().to_string(),
                ..offer
            },
            sale: None,
        });
    }

    let sale = record_sale(
        store,
        &listing,
        offer.buyer_address.clone(),
        offer.offer_eth,
        offer.offer_tx.clone(),
        Some(offer.id),
    )?;
    log::info!("Offer {} accepted", offer.id);

    Ok(OfferDecision {
        offer: Offer {
            status: OfferStatus::Accepted.as_str().to_string(),
            ..offer
        },
        sale: Some(sale),
    })
}
