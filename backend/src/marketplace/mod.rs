//! Name marketplace: listings, offers, sales and the read-side aggregations
//! over them.

pub mod activity;
pub mod history;
pub mod listings;
pub mod offers;
pub mod stats;

pub use crate::error::{ServiceError, ServiceResult};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

/// Clamps a caller-supplied page size to `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn normalize_hex(value: &str, digits: usize) -> Option<String> {
    let value = value.trim().to_ascii_lowercase();
    let body = value.strip_prefix("0x")?;
    (body.len() == digits && body.chars().all(|c| c.is_ascii_hexdigit())).then_some(value)
}

/// Ethscription ids and transaction hashes: `0x` followed by 64 hex digits.
pub fn normalize_hash(value: &str, field: &str) -> ServiceResult<String> {
    normalize_hex(value, 64).ok_or_else(|| ServiceError::Invalid(format!("Invalid {}", field)))
}

pub fn normalize_address(value: &str) -> ServiceResult<String> {
    normalize_hex(value, 40).ok_or_else(|| ServiceError::Invalid("Invalid wallet address".to_string()))
}

pub fn validate_price(value: f64, field: &str) -> ServiceResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ServiceError::Invalid(format!("{} must be greater than 0", field)))
    }
}
