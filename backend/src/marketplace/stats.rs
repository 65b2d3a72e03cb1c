use std::collections::HashSet;

use super::ServiceResult;
use crate::models::{MarketStats, Sale};
use crate::store::MarketplaceStore;

fn distinct<'a>(addresses: impl Iterator<Item = &'a str>) -> i64 {
    addresses.map(str::to_lowercase).collect::<HashSet<_>>().len() as i64
}

pub fn compute_market_stats(active_listings: i64, sales: &[Sale]) -> MarketStats {
    let total_volume_eth = sales.iter().fold(0.0, |acc, s| acc + s.sale_price_eth);

    MarketStats {
        active_listings,
        total_sales: sales.len() as i64,
        total_volume_eth,
        avg_sale_price_eth: if sales.is_empty() {
            0.0
        } else {
            total_volume_eth / sales.len() as f64
        },
        unique_sellers: distinct(sales.iter().map(|s| s.seller_address.as_str())),
        unique_buyers: distinct(sales.iter().map(|s| s.buyer_address.as_str())),
    }
}

/// Reads the precomputed view when it exists and scans the tables otherwise.
pub fn market_stats(store: &dyn MarketplaceStore) -> ServiceResult<MarketStats> {
    if let Some(stats) = store.stats_view()? {
        return Ok(stats);
    }
    let active = store.count_active_listings()?;
    let sales = store.all_sales()?;
    Ok(compute_market_stats(active, &sales))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::listings::create_listing;
    use crate::models::NewListing;
    use crate::store::memory::{address, hash, MemoryStore};
    use chrono::Utc;
    use uuid::Uuid;

    fn sale(seller: &str, buyer: &str, price: f64) -> Sale {
        Sale {
            id: Uuid::new_v4(),
            ethscription_id: hash(1),
            name: None,
            sale_price_eth: price,
            seller_address: seller.to_string(),
            buyer_address: buyer.to_string(),
            purchase_tx: hash(2),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_market_has_zero_averages() {
        let stats = compute_market_stats(0, &[]);
        assert_eq!(stats, MarketStats::default());
    }

    #[test]
    fn unique_counts_ignore_address_case() {
        let a = address(0xa);
        let sales = vec![
            sale(&a, &address(2), 1.0),
            sale(&a.to_uppercase().replace("0X", "0x"), &address(3), 2.0),
            sale(&address(4), &address(2), 3.0),
        ];
        let stats = compute_market_stats(5, &sales);
        assert_eq!(stats.active_listings, 5);
        assert_eq!(stats.total_sales, 3);
        assert_eq!(stats.total_volume_eth, 6.0);
        assert_eq!(stats.avg_sale_price_eth, 2.0);
        assert_eq!(stats.unique_sellers, 2);
        assert_eq!(stats.unique_buyers, 2);
    }

    #[test]
    fn falls_back_to_tables_without_view() {
        let store = MemoryStore::default();
        create_listing(
            &store,
            &address(1),
            NewListing {
                ethscription_id: hash(1),
                name: "one".to_string(),
                price_eth: 1.0,
                chain: None,
            },
        )
        .unwrap();
        store.insert_sale(&sale(&address(1), &address(2), 0.5)).unwrap();

        let stats = market_stats(&store).unwrap();
        assert_eq!(stats.active_listings, 1);
        assert_eq!(stats.total_sales, 1);
        assert_eq!(stats.avg_sale_price_eth, 0.5);
    }

    #[test]
    fn prefers_the_view_when_present() {
        let store = MemoryStore::default();
        let view = MarketStats {
            active_listings: 9,
            total_sales: 4,
            total_volume_eth: 2.0,
            avg_sale_price_eth: 0.5,
            unique_sellers: 3,
            unique_buyers: 2,
        };
        *store.stats_view.lock().unwrap() = Some(view.clone());
        assert_eq!(market_stats(&store).unwrap(), view);
    }
}
