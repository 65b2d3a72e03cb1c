use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PoolError, PooledConnection};
use diesel::sql_types::{Nullable, Text};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{Listing, ListingStatus, MarketStats, Offer, OfferStatus, Sale, Site, User};
use crate::schema::{marketplace_listings, marketplace_offers, marketplace_sales, sites, users};
use crate::store::{AccountStore, ListingFilter, MarketplaceStore, StoreError, StoreResult};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

diesel::define_sql_function!(fn lower(x: Nullable<Text>) -> Nullable<Text>);

#[derive(Debug, thiserror::Error)]
pub enum DbInitError {
    #[error("Failed to connect to database: {0}")]
    Pool(#[from] PoolError),
    #[error("Failed to run migrations: {0}")]
    Migrations(String),
    #[error("Database test query failed: {0}")]
    TestQuery(#[from] diesel::result::Error),
}

pub fn establish_pool(config: &DatabaseConfig) -> Result<PgPool, DbInitError> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let pool = Pool::builder().max_size(config.db_pool_size).build(manager)?;

    let mut conn = pool.get()?;
    if config.run_migrations {
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbInitError::Migrations(e.to_string()))?;
        log::info!("Applied {} pending migrations", applied.len());
    }
    let test_query: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1"))
        .get_result(&mut conn)?;
    log::info!("Database test query result: {}", test_query);

    Ok(pool)
}

/// Postgres-backed implementation of both store traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<PgPooled> {
        Ok(self.pool.get()?)
    }
}

impl MarketplaceStore for PgStore {
    fn insert_listing(&self, listing: &Listing) -> StoreResult<()> {
        diesel::insert_into(marketplace_listings::table)
            .values(listing)
            .execute(&mut self.conn()?)?;
        Ok(())
    }

    fn active_listing(&self, ethscription_id: &str) -> StoreResult<Option<Listing>> {
        let listing = marketplace_listings::table
            .filter(marketplace_listings::ethscription_id.eq(ethscription_id))
            .filter(marketplace_listings::status.eq(ListingStatus::Active.as_str()))
            .order(marketplace_listings::created_at.desc())
            .select(Listing::as_select())
            .first(&mut self.conn()?)
            .optional()?;
        Ok(listing)
    }

    fn listings(&self, filter: &ListingFilter) -> StoreResult<Vec<Listing>> {
        let mut query = marketplace_listings::table
            .select(Listing::as_select())
            .into_boxed();
        if let Some(status) = filter.status {
            query = query.filter(marketplace_listings::status.eq(status.as_str()));
        }
        if let Some(seller) = &filter.seller_address {
            query = query.filter(marketplace_listings::seller_address.eq(seller.clone()));
        }
        if let Some(id) = &filter.ethscription_id {
            query = query.filter(marketplace_listings::ethscription_id.eq(id.clone()));
        }
        if let Some(name) = &filter.name {
            query = query.filter(marketplace_listings::name.eq(name.clone()));
        }
        query = query.order(marketplace_listings::created_at.desc());
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        Ok(query.load(&mut self.conn()?)?)
    }

    fn set_listing_status(&self, id: Uuid, status: ListingStatus) -> StoreResult<()> {
        diesel::update(marketplace_listings::table.find(id))
            .set(marketplace_listings::status.eq(status.as_str()))
            .execute(&mut self.conn()?)?;
        Ok(())
    }

    fn count_active_listings(&self) -> StoreResult<i64> {
        let count = marketplace_listings::table
            .filter(marketplace_listings::status.eq(ListingStatus::Active.as_str()))
            .count()
            .get_result(&mut self.conn()?)?;
        Ok(count)
    }

    fn complete_sale(&self, listing_id: Uuid, sale: &Sale, accepted_offer: Option<Uuid>) -> StoreResult<()> {
        self.conn()?.transaction::<_, StoreError, _>(|conn| {
            let sold = diesel::update(
                marketplace_listings::table
                    .find(listing_id)
                    .filter(marketplace_listings::status.eq(ListingStatus::Active.as_str())),
            )
            .set(marketplace_listings::status.eq(ListingStatus::Sold.as_str()))
            .execute(conn)?;
            if sold != 1 {
                return Err(StoreError::Conflict("listing is no longer active".to_string()));
            }

            diesel::insert_into(marketplace_sales::table)
                .values(sale)
                .execute(conn)?;

            if let Some(offer_id) = accepted_offer {
                diesel::update(marketplace_offers::table.find(offer_id))
                    .set(marketplace_offers::status.eq(OfferStatus::Accepted.as_str()))
                    .execute(conn)?;
                diesel::update(
                    marketplace_offers::table
                        .filter(marketplace_offers::ethscription_id.eq(&sale.ethscription_id))
                        .filter(marketplace_offers::status.eq(OfferStatus::Pending.as_str())),
                )
                .set(marketplace_offers::status.eq(OfferStatus::Rejected.as_str()))
                .execute(conn)?;
            }
            Ok(())
        })
    }

    fn recent_sales(&self, limit: i64) -> StoreResult<Vec<Sale>> {
        let sales = marketplace_sales::table
            .order(marketplace_sales::created_at.desc())
            .limit(limit)
            .select(Sale::as_select())
            .load(&mut self.conn()?)?;
        Ok(sales)
    }

    fn sales_for(&self, ethscription_id: &str) -> StoreResult<Vec<Sale>> {
        let sales = marketplace_sales::table
            .filter(marketplace_sales::ethscription_id.eq(ethscription_id))
            .select(Sale::as_select())
            .load(&mut self.conn()?)?;
        Ok(sales)
    }

    fn all_sales(&self) -> StoreResult<Vec<Sale>> {
        let sales = marketplace_sales::table
            .select(Sale::as_select())
            .load(&mut self.conn()?)?;
        Ok(sales)
    }

    fn insert_offer(&self, offer: &Offer) -> StoreResult<()> {
        diesel::insert_into(marketplace_offers::table)
            .values(offer)
            .execute(&mut self.conn()?)?;
        Ok(())
    }

    fn offer(&self, id: Uuid) -> StoreResult<Option<Offer>> {
        let offer = marketplace_offers::table
            .find(id)
            .select(Offer::as_select())
            .first(&mut self.conn()?)
            .optional()?;
        Ok(offer)
    }

    fn set_offer_status(&self, id: Uuid, status: OfferStatus) -> StoreResult<()> {
        diesel::update(marketplace_offers::table.find(id))
            .set(marketplace_offers::status.eq(status.as_str()))
            .execute(&mut self.conn()?)?;
        Ok(())
    }

    fn recent_offers(&self, limit: i64) -> StoreResult<Vec<Offer>> {
        let offers = marketplace_offers::table
            .order(marketplace_offers::created_at.desc())
            .limit(limit)
            .select(Offer::as_select())
            .load(&mut self.conn()?)?;
        Ok(offers)
    }

    fn stats_view(&self) -> StoreResult<Option<MarketStats>> {
        let result = diesel::sql_query(
            "SELECT active_listings, total_sales, total_volume_eth, avg_sale_price_eth, \
             unique_sellers, unique_buyers FROM marketplace_stats",
        )
        .get_result::<MarketStats>(&mut self.conn()?);
        match result {
            Ok(stats) => Ok(Some(stats)),
            Err(diesel::result::Error::NotFound) => Ok(None),
            Err(diesel::result::Error::DatabaseError(_, info))
                if info.message().contains("does not exist") =>
            {
                log::warn!("marketplace_stats view missing, falling back to table scan");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl AccountStore for PgStore {
    fn user(&self, clerk_id: &str) -> StoreResult<Option<User>> {
        let user = users::table
            .find(clerk_id)
            .select(User::as_select())
            .first(&mut self.conn()?)
            .optional()?;
        Ok(user)
    }

    fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = users::table
            .filter(lower(users::username).eq(username.to_lowercase()))
            .select(User::as_select())
            .first(&mut self.conn()?)
            .optional()?;
        Ok(user)
    }

    fn upsert_username(&self, clerk_id: &str, username: &str) -> StoreResult<User> {
        let row = User {
            username: Some(username.to_string()),
            ..User::new(clerk_id)
        };
        let user = diesel::insert_into(users::table)
            .values(&row)
            .on_conflict(users::clerk_id)
            .do_update()
            .set(users::username.eq(username))
            .returning(User::as_returning())
            .get_result(&mut self.conn()?)?;
        Ok(user)
    }

    fn upsert_wallet(&self, clerk_id: &str, wallet_address: &str) -> StoreResult<User> {
        let row = User {
            wallet_address: Some(wallet_address.to_string()),
            ..User::new(clerk_id)
        };
        let user = diesel::insert_into(users::table)
            .values(&row)
            .on_conflict(users::clerk_id)
            .do_update()
            .set(users::wallet_address.eq(wallet_address))
            .returning(User::as_returning())
            .get_result(&mut self.conn()?)?;
        Ok(user)
    }

    fn insert_site(&self, site: &Site) -> StoreResult<()> {
        diesel::insert_into(sites::table)
            .values(site)
            .execute(&mut self.conn()?)?;
        Ok(())
    }

    fn site_by_slug(&self, slug: &str) -> StoreResult<Option<Site>> {
        let site = sites::table
            .filter(sites::slug.eq(slug))
            .select(Site::as_select())
            .first(&mut self.conn()?)
            .optional()?;
        Ok(site)
    }

    fn sites_for(&self, clerk_id: &str) -> StoreResult<Vec<Site>> {
        let rows = sites::table
            .filter(sites::user_id.eq(clerk_id))
            .order(sites::created_at.desc())
            .select(Site::as_select())
            .load(&mut self.conn()?)?;
        Ok(rows)
    }
}
