//! Name ethscriptions: content hashing and existence lookups against the
//! public ethscriptions indexer.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum EthscriptionsError {
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Ethscriptions API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Ethscriptions API returned {0}")]
    Status(reqwest::StatusCode),
}

/// Hash the indexer keys name ethscriptions by: sha256 of `data:,{name}`.
pub fn ethscription_id_for_name(name: &str) -> String {
    let digest = Sha256::digest(format!("data:,{}", name).as_bytes());
    format!("0x{}", hex::encode(digest))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthscriptionSummary {
    pub transaction_hash: String,
    pub current_owner: Option<String>,
    pub creator: Option<String>,
}

#[derive(Deserialize)]
struct ExistsEnvelope {
    result: ExistsResult,
}

#[derive(Deserialize)]
struct ExistsResult {
    exists: bool,
    ethscription: Option<EthscriptionSummary>,
}

#[async_trait]
pub trait EthscriptionLookup: Send + Sync {
    /// The ethscription whose content hashes to `content_hash`, if any.
    async fn exists(&self, content_hash: &str) -> Result<Option<EthscriptionSummary>, EthscriptionsError>;
}

pub struct EthscriptionsClient {
    http: reqwest::Client,
    base_url: String,
}

impl EthscriptionsClient {
    pub fn new(base_url: &str) -> Result<Self, EthscriptionsError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EthscriptionLookup for EthscriptionsClient {
    async fn exists(&self, content_hash: &str) -> Result<Option<EthscriptionSummary>, EthscriptionsError> {
        let url = format!("{}/ethscriptions/exists/{}", self.base_url, content_hash);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EthscriptionsError::Status(response.status()));
        }
        let ExistsEnvelope {
            result: ExistsResult { exists, ethscription },
        } = response.json().await?;
        Ok(ethscription.filter(|_| exists))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameAvailability {
    pub name: String,
    pub ethscription_id: String,
    pub available: bool,
    pub owner: Option<String>,
}

pub fn validate_name(name: &str) -> Result<&str, EthscriptionsError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EthscriptionsError::InvalidName("name is empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(EthscriptionsError::InvalidName(format!(
            "name is longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(EthscriptionsError::InvalidName("name contains whitespace".to_string()));
    }
    Ok(name)
}

pub async fn check_name(lookup: &dyn EthscriptionLookup, name: &str) -> Result<NameAvailability, EthscriptionsError> {
    let name = validate_name(name)?;
    let ethscription_id = ethscription_id_for_name(name);
    let existing = lookup.exists(&ethscription_id).await?;
    Ok(NameAvailability {
        name: name.to_string(),
        ethscription_id,
        available: existing.is_none(),
        owner: existing.and_then(|e| e.current_owner),
    })
}

/// Checks `names` in chunks of `chunk_size` concurrent requests.
///
/// Failed lookups are logged and left out of the result; the rest keep their
/// input order.
pub async fn scan_names(lookup: &dyn EthscriptionLookup, names: &[String], chunk_size: usize) -> Vec<NameAvailability> {
    let mut results = Vec::with_capacity(names.len());
    for chunk in names.chunks(chunk_size.max(1)) {
        let checks = join_all(chunk.iter().map(|name| check_name(lookup, name))).await;
        for (name, check) in chunk.iter().zip(checks) {
            match check {
                Ok(availability) => results.push(availability),
                Err(e) => log::warn!("Skipping {}: {}", name, e),
            }
        }
    }
    results
}
