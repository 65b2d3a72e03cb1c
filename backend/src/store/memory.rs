use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use super::{AccountStore, ListingFilter, MarketplaceStore, StoreError, StoreResult};
use crate::models::{Listing, ListingStatus, MarketStats, Offer, OfferStatus, Sale, Site, User};

/// Vec-backed store for tests.
#[derive(Default)]
pub struct MemoryStore {
    listings: Mutex<Vec<Listing>>,
    sales: Mutex<Vec<Sale>>,
    offers: Mutex<Vec<Offer>>,
    users: Mutex<Vec<User>>,
    sites: Mutex<Vec<Site>>,
    pub stats_view: Mutex<Option<MarketStats>>,
    /// Makes `complete_sale` fail the way a rolled-back transaction does.
    pub fail_sales: AtomicBool,
}

impl MemoryStore {
    /// Seeds a sale row directly, bypassing the listing lifecycle.
    pub fn insert_sale(&self, sale: &Sale) -> StoreResult<()> {
        self.sales.lock().unwrap().push(sale.clone());
        Ok(())
    }
}

fn newest_first<T, F>(mut rows: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows
}

impl MarketplaceStore for MemoryStore {
    fn insert_listing(&self, listing: &Listing) -> StoreResult<()> {
        self.listings.lock().unwrap().push(listing.clone());
        Ok(())
    }

    fn active_listing(&self, ethscription_id: &str) -> StoreResult<Option<Listing>> {
        Ok(self
            .listings
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.ethscription_id == ethscription_id && l.is_active())
            .cloned())
    }

    fn listings(&self, filter: &ListingFilter) -> StoreResult<Vec<Listing>> {
        let rows: Vec<Listing> = self
            .listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| filter.status.map_or(true, |s| l.status == s.as_str()))
            .filter(|l| {
                filter
                    .seller_address
                    .as_ref()
                    .map_or(true, |s| &l.seller_address == s)
            })
            .filter(|l| {
                filter
                    .ethscription_id
                    .as_ref()
                    .map_or(true, |id| &l.ethscription_id == id)
            })
            .filter(|l| filter.name.as_ref().map_or(true, |n| &l.name == n))
            .cloned()
            .collect();
        let mut rows = newest_first(rows, |l| l.created_at);
        if let Some(limit) = filter.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    fn set_listing_status(&self, id: Uuid, status: ListingStatus) -> StoreResult<()> {
        for listing in self.listings.lock().unwrap().iter_mut().filter(|l| l.id == id) {
            listing.status = status.as_str().to_string();
        }
        Ok(())
    }

    fn count_active_listings(&self) -> StoreResult<i64> {
        Ok(self.listings.lock().unwrap().iter().filter(|l| l.is_active()).count() as i64)
    }

    fn complete_sale(&self, listing_id: Uuid, sale: &Sale, accepted_offer: Option<Uuid>) -> StoreResult<()> {
        if self.fail_sales.load(Ordering::SeqCst) {
            return Err(StoreError::Query(diesel::result::Error::RollbackTransaction));
        }
        let mut listings = self.listings.lock().unwrap();
        let listing = listings
            .iter_mut()
            .find(|l| l.id == listing_id && l.is_active())
            .ok_or_else(|| StoreError::Conflict("listing is no longer active".to_string()))?;
        listing.status = ListingStatus::Sold.as_str().to_string();
        self.sales.lock().unwrap().push(sale.clone());

        if let Some(offer_id) = accepted_offer {
            for offer in self.offers.lock().unwrap().iter_mut() {
                if offer.id == offer_id {
                    offer.status = OfferStatus::Accepted.as_str().to_string();
                } else if offer.ethscription_id == sale.ethscription_id && offer.is_pending() {
                    offer.status = OfferStatus::Rejected.as_str().to_string();
                }
            }
        }
        Ok(())
    }

    fn recent_sales(&self, limit: i64) -> StoreResult<Vec<Sale>> {
        let mut rows = newest_first(self.sales.lock().unwrap().clone(), |s| s.created_at);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    fn sales_for(&self, ethscription_id: &str) -> StoreResult<Vec<Sale>> {
        Ok(self
            .sales
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.ethscription_id == ethscription_id)
            .cloned()
            .collect())
    }

    fn all_sales(&self) -> StoreResult<Vec<Sale>> {
        Ok(self.sales.lock().unwrap().clone())
    }

    fn insert_offer(&self, offer: &Offer) -> StoreResult<()> {
        self.offers.lock().unwrap().push(offer.clone());
        Ok(())
    }

    fn offer(&self, id: Uuid) -> StoreResult<Option<Offer>> {
        Ok(self.offers.lock().unwrap().iter().find(|o| o.id == id).cloned())
    }

    fn set_offer_status(&self, id: Uuid, status: OfferStatus) -> StoreResult<()> {
        for offer in self.offers.lock().unwrap().iter_mut().filter(|o| o.id == id) {
            offer.status = status.as_str().to_string();
        }
        Ok(())
    }

    fn recent_offers(&self, limit: i64) -> StoreResult<Vec<Offer>> {
        let mut rows = newest_first(self.offers.lock().unwrap().clone(), |o| o.created_at);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    fn stats_view(&self) -> StoreResult<Option<MarketStats>> {
        Ok(self.stats_view.lock().unwrap().clone())
    }
}

impl AccountStore for MemoryStore {
    fn user(&self, clerk_id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.clerk_id == clerk_id).cloned())
    }

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| {
                u.username
                    .as_ref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(username))
            })
            .cloned())
    }

    fn upsert_username(&self, clerk_id: &str, username: &str) -> StoreResult<User> {
        let mut users = self.users.lock().unwrap();
        let taken = users.iter().any(|u| {
            u.clerk_id != clerk_id
                && u.username
                    .as_ref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(username))
        });
        if taken {
            return Err(StoreError::Conflict("users_username_lower_idx".to_string()));
        }
        if !users.iter().any(|u| u.clerk_id == clerk_id) {
            users.push(User::new(clerk_id));
        }
        let user = users
            .iter_mut()
            .find(|u| u.clerk_id == clerk_id)
            .expect("user row was just ensured");
        user.username = Some(username.to_string());
        Ok(user.clone())
    }

    fn upsert_wallet(&self, clerk_id: &str, wallet_address: &str) -> StoreResult<User> {
        let mut users = self.users.lock().unwrap();
        if !users.iter().any(|u| u.clerk_id == clerk_id) {
            users.push(User::new(clerk_id));
        }
        let user = users
            .iter_mut()
            .find(|u| u.clerk_id == clerk_id)
            .expect("user row was just ensured");
        user.wallet_address = Some(wallet_address.to_string());
        Ok(user.clone())
    }

    fn insert_site(&self, site: &Site) -> StoreResult<()> {
        let mut sites = self.sites.lock().unwrap();
        if sites.iter().any(|s| s.slug == site.slug) {
            return Err(StoreError::Conflict("sites_slug_key".to_string()));
        }
        sites.push(site.clone());
        Ok(())
    }

    fn site_by_slug(&self, slug: &str) -> StoreResult<Option<Site>> {
        Ok(self.sites.lock().unwrap().iter().find(|s| s.slug == slug).cloned())
    }

    fn sites_for(&self, clerk_id: &str) -> StoreResult<Vec<Site>> {
        Ok(self
            .sites
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == clerk_id)
            .cloned()
            .collect())
    }
}

/// `0x`-prefixed 32-byte hex value derived from `n`.
pub fn hash(n: u64) -> String {
    format!("0x{:064x}", n)
}

/// `0x`-prefixed 20-byte hex address derived from `n`.
pub fn address(n: u64) -> String {
    format!("0x{:040x}", n)
}
