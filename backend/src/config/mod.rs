use config::{Config, ConfigError, Environment};
use dotenv::dotenv;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DEFAULT_ETHSCRIPTIONS_API_URL: &str = "https://api.ethscriptions.com/v2";

/// Everything the HTTP server needs.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub db_pool_size: u32,
    pub run_migrations: bool,
    pub ethscriptions_api_url: String,
    pub scan_chunk_size: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub db_pool_size: u32,
    pub run_migrations: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScanConfig {
    pub ethscriptions_api_url: String,
    pub scan_chunk_size: usize,
}

/// Signer settings for the escrow contract. Only the operator tool loads these.
#[derive(Clone, Debug, Deserialize)]
pub struct EscrowConfig {
    pub eth_rpc_url: String,
    pub escrow_contract_address: String,
    pub escrow_private_key: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        load()
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig {
            database_url: self.database_url.clone(),
            db_pool_size: self.db_pool_size,
            run_migrations: self.run_migrations,
        }
    }
}

/// Reads `.env` and the environment into any of the config structs. Keys the
/// target does not name are ignored, so each caller only needs its own.
pub fn load<T: DeserializeOwned>() -> Result<T, ConfigError> {
    dotenv().ok(); // Load .env file if present
    from_source(Environment::default().try_parsing(true))
}

fn from_source<T: DeserializeOwned>(env: Environment) -> Result<T, ConfigError> {
    Config::builder()
        .set_default("port", 3000)?
        .set_default("db_pool_size", 10)?
        .set_default("run_migrations", true)?
        .set_default("ethscriptions_api_url", DEFAULT_ETHSCRIPTIONS_API_URL)?
        .set_default("scan_chunk_size", 50)?
        .add_source(env)
        .build()?
        .try_deserialize()
}
