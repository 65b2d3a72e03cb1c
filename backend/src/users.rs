use crate::error::{ServiceError, ServiceResult};
use crate::marketplace::normalize_address;
use crate::models::User;
use crate::store::{AccountStore, StoreError};

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;

const USERNAME_TAKEN: &str = "Username already taken";

/// Usernames are stored lowercase so the unique index is case-insensitive.
pub fn validate_username(raw: &str) -> ServiceResult<String> {
    let username = raw.trim();
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ServiceError::Invalid(format!(
            "Username must be {}-{} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ServiceError::Invalid(
            "Username may only contain letters, numbers, '_' and '-'".to_string(),
        ));
    }
    Ok(username.to_ascii_lowercase())
}

pub fn claim_username(store: &dyn AccountStore, clerk_id: &str, raw: &str) -> ServiceResult<User> {
    let username = validate_username(raw)?;

    if let Some(holder) = store.user_by_username(&username)? {
        if holder.clerk_id == clerk_id {
            return Ok(holder);
        }
        return Err(ServiceError::Invalid(USERNAME_TAKEN.to_string()));
    }

    // A concurrent claim can still win between the check and the write.
    match store.upsert_username(clerk_id, &username) {
        Ok(user) => {
            log::info!("User {} claimed username {}", clerk_id, username);
            Ok(user)
        }
        Err(StoreError::Conflict(_)) => Err(ServiceError::Invalid(USERNAME_TAKEN.to_string())),
        Err(e) => Err(e.into()),
    }
}

pub fn link_wallet(store: &dyn AccountStore, clerk_id: &str, raw: &str) -> ServiceResult<User> {
    let wallet = normalize_address(raw)?;
    let user = store.upsert_wallet(clerk_id, &wallet)?;
    log::info!("User {} linked wallet {}", clerk_id, wallet);
    Ok(user)
}

pub fn profile(store: &dyn AccountStore, clerk_id: &str) -> ServiceResult<User> {
    store
        .user(clerk_id)?
        .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
}

/// The caller's linked wallet; marketplace writes act on its behalf.
pub fn wallet_of(store: &dyn AccountStore, clerk_id: &str) -> ServiceResult<String> {
    store
        .user(clerk_id)?
        .and_then(|u| u.wallet_address)
        .ok_or_else(|| ServiceError::Invalid("Link a wallet first".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Site;
    use crate::store::memory::{address, MemoryStore};
    use crate::store::StoreResult;

    #[test]
    fn username_rules() {
        assert_eq!(validate_username("  Alice_01 ").unwrap(), "alice_01");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LEN + 1)).is_err());
        assert!(validate_username("no spaces").is_err());
        assert!(validate_username("émile").is_err());
    }

    #[test]
    fn claim_creates_user_row() {
        let store = MemoryStore::default();
        let user = claim_username(&store, "user_a", "Alice").unwrap();
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.plan, "free");
    }

    #[test]
    fn taken_username_fails_without_touching_requester() {
        let store = MemoryStore::default();
        claim_username(&store, "user_a", "alice").unwrap();
        claim_username(&store, "user_b", "bob").unwrap();

        let err = claim_username(&store, "user_b", "ALICE").unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(msg) if msg == USERNAME_TAKEN));
        assert_eq!(
            store.user("user_b").unwrap().unwrap().username.as_deref(),
            Some("bob")
        );
    }

    #[test]
    fn reclaiming_own_username_is_a_noop() {
        let store = MemoryStore::default();
        claim_username(&store, "user_a", "alice").unwrap();
        let user = claim_username(&store, "user_a", "Alice").unwrap();
        assert_eq!(user.username.as_deref(), Some("alice"));
    }

    /// Hides existing usernames from the pre-check so the write hits the
    /// unique index, as when two claims race.
    struct RacingStore(MemoryStore);

    impl AccountStore for RacingStore {
        fn user(&self, clerk_id: &str) -> StoreResult<Option<User>> {
            self.0.user(clerk_id)
        }
        fn user_by_username(&self, _username: &str) -> StoreResult<Option<User>> {
            Ok(None)
        }
        fn upsert_username(&self, clerk_id: &str, username: &str) -> StoreResult<User> {
            self.0.upsert_username(clerk_id, username)
        }
        fn upsert_wallet(&self, clerk_id: &str, wallet_address: &str) -> StoreResult<User> {
            self.0.upsert_wallet(clerk_id, wallet_address)
        }
        fn insert_site(&self, site: &Site) -> StoreResult<()> {
            self.0.insert_site(site)
        }
        fn site_by_slug(&self, slug: &str) -> StoreResult<Option<Site>> {
            self.0.site_by_slug(slug)
        }
        fn sites_for(&self, clerk_id: &str) -> StoreResult<Vec<Site>> {
            self.0.sites_for(clerk_id)
        }
    }

    #[test]
    fn unique_violation_on_write_reads_as_taken() {
        let store = RacingStore(MemoryStore::default());
        claim_username(&store, "user_a", "alice").unwrap();
        let err = claim_username(&store, "user_b", "alice").unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(msg) if msg == USERNAME_TAKEN));
        assert!(store.user("user_b").unwrap().is_none());
    }

    #[test]
    fn wallet_is_required_for_trading() {
        let store = MemoryStore::default();
        assert!(matches!(wallet_of(&store, "user_a"), Err(ServiceError::Invalid(_))));

        let upper = address(0xbeef).to_uppercase().replace("0X", "0x");
        link_wallet(&store, "user_a", &upper).unwrap();
        assert_eq!(wallet_of(&store, "user_a").unwrap(), address(0xbeef));
        assert!(link_wallet(&store, "user_a", "0x123").is_err());
    }

    #[test]
    fn profile_of_unknown_user_is_not_found() {
        let store = MemoryStore::default();
        assert!(matches!(profile(&store, "nobody"), Err(ServiceError::NotFound(_))));
    }
}
