use std::fs;

use clap::{Parser, Subcommand};

use chainhost_backend::config::{self, DatabaseConfig, EscrowConfig, ScanConfig};
use chainhost_backend::db::{self, PgStore};
use chainhost_backend::escrow::{self, EthEscrow};
use chainhost_backend::ethscriptions::{self, EthscriptionsClient};
use chainhost_backend::marketplace::listings::{self, CancelOutcome};

#[derive(Parser)]
#[command(name = "chainhost-ops", version, about = "Operator tasks for the Chainhost marketplace")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull ethscriptions back out of the escrow contract
    Rescue {
        /// Ethscription ids (0x-prefixed, 32 bytes)
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Cancel the active listing of each ethscription id
    CancelListings {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Print which names in a file are still unregistered
    ScanNames {
        /// One name per line
        #[arg(long)]
        file: String,
        /// Concurrent lookups per chunk; defaults to SCAN_CHUNK_SIZE
        #[arg(long)]
        chunk_size: Option<usize>,
    },
}

async fn rescue(config: &EscrowConfig, ids: &[String]) -> Result<bool, Box<dyn std::error::Error>> {
    let contract = EthEscrow::connect(
        &config.eth_rpc_url,
        &config.escrow_contract_address,
        &config.escrow_private_key,
    )
    .await?;

    let reports = escrow::rescue(&contract, ids).await;
    let mut all_ok = true;
    for report in &reports {
        match &report.withdraw {
            Ok(tx) => println!(
                "{} withdrawn in {:?}{}",
                report.ethscription_id,
                tx,
                report
                    .deposit_tx
                    .map(|d| format!(" (deposited in {:?})", d))
                    .unwrap_or_default()
            ),
            Err(e) => {
                all_ok = false;
                println!("{} failed: {}", report.ethscription_id, e);
            }
        }
    }
    Ok(all_ok)
}

fn cancel_listings(config: &DatabaseConfig, ids: &[String]) -> Result<bool, Box<dyn std::error::Error>> {
    let store = PgStore::new(db::establish_pool(config)?);
    let mut all_ok = true;
    for id in ids {
        match listings::cancel_listing(&store, id, None) {
            Ok(CancelOutcome::Cancelled(listing)) => println!("{} cancelled listing {}", id, listing.id),
            Ok(CancelOutcome::NoActiveListing) => println!("{} no active listing found", id),
            Err(e) => {
                all_ok = false;
                println!("{} failed: {}", id, e);
            }
        }
    }
    Ok(all_ok)
}

async fn scan_names(config: &ScanConfig, file: &str, chunk_size: Option<usize>) -> Result<bool, Box<dyn std::error::Error>> {
    let names: Vec<String> = fs::read_to_string(file)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    log::info!("Scanning {} names from {}", names.len(), file);

    let client = EthscriptionsClient::new(&config.ethscriptions_api_url)?;
    let results = ethscriptions::scan_names(&client, &names, chunk_size.unwrap_or(config.scan_chunk_size)).await;
    let available: Vec<_> = results.iter().filter(|r| r.available).collect();
    for result in &available {
        println!("{}", result.name);
    }
    log::info!(
        "{} of {} checked names are available ({} lookups failed)",
        available.len(),
        results.len(),
        names.len() - results.len()
    );
    Ok(results.len() == names.len())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    // Each command loads only the keys it uses.
    let cli = Cli::parse();
    let all_ok = match cli.command {
        Commands::Rescue { ids } => rescue(&config::load()?, &ids).await?,
        Commands::CancelListings { ids } => {
            let config: DatabaseConfig = config::load()?;
            tokio::task::spawn_blocking(move || cancel_listings(&config, &ids).map_err(|e| e.to_string())).await??
        }
        Commands::ScanNames { file, chunk_size } => scan_names(&config::load()?, &file, chunk_size).await?,
    };

    if !all_ok {
        std::process::exit(1);
    }
    Ok(())
}
