use std::net::SocketAddr;
use std::sync::Arc;

use chainhost_backend::api::{self, AppState};
use chainhost_backend::config::AppConfig;
use chainhost_backend::db::{self, PgStore};
use chainhost_backend::ethscriptions::EthscriptionsClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = AppConfig::load()?;
    log::info!("Loaded config, port {} pool size {}", config.port, config.db_pool_size);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let pool = db::establish_pool(&config.database())?;
    let store = Arc::new(PgStore::new(pool));
    let ethscriptions = Arc::new(EthscriptionsClient::new(&config.ethscriptions_api_url)?);
    log::info!("Ethscriptions API: {}", config.ethscriptions_api_url);

    let state = AppState {
        config,
        marketplace: store.clone(),
        accounts: store,
        ethscriptions,
    };
    let app = api::router(state);

    log::info!("Starting server on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app.into_make_service()).await?;

    Ok(())
}
