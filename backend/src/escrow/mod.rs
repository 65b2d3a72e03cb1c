//! Client for the name escrow contract and the rescue routine that pulls
//! deposited ethscriptions back out of it.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::*;

use crate::marketplace::normalize_hash;

abigen!(
    NameEscrow,
    r#"[
        function deposit(bytes32 ethscriptionId)
        function cancelAndWithdraw(bytes32 ethscriptionId)
        function depositors(bytes32 ethscriptionId) external view returns (address)
    ]"#
);

#[derive(Debug, thiserror::Error)]
pub enum EscrowError {
    #[error("Invalid ethscription id: {0}")]
    InvalidId(String),
    #[error("Escrow configuration error: {0}")]
    Config(String),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Transaction {0:?} was dropped before confirmation")]
    Dropped(TxHash),
    #[error("Transaction {0:?} reverted")]
    Reverted(TxHash),
}

#[async_trait]
pub trait EscrowContract: Send + Sync {
    /// Zero address when nothing is deposited for `ethscription_id`.
    async fn depositor(&self, ethscription_id: H256) -> Result<Address, EscrowError>;
    async fn deposit(&self, ethscription_id: H256) -> Result<TxHash, EscrowError>;
    async fn cancel_and_withdraw(&self, ethscription_id: H256) -> Result<TxHash, EscrowError>;
}

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct EthEscrow {
    contract: NameEscrow<Client>,
}

impl EthEscrow {
    pub async fn connect(rpc_url: &str, contract_address: &str, private_key: &str) -> Result<Self, EscrowError> {
        let provider = Provider::<Http>::try_from(rpc_url).map_err(|e| EscrowError::Config(e.to_string()))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| EscrowError::Rpc(e.to_string()))?;
        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(|e| EscrowError::Config(format!("invalid private key: {}", e)))?
            .with_chain_id(chain_id.as_u64());
        let address: Address = contract_address
            .parse()
            .map_err(|_| EscrowError::Config(format!("invalid contract address: {}", contract_address)))?;

        log::info!(
            "Escrow client for {:?} on chain {} as {:?}",
            address,
            chain_id,
            wallet.address()
        );
        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        Ok(Self {
            contract: NameEscrow::new(address, client),
        })
    }
}

/// Sends the call and waits for one confirmation; only a status-1 receipt
/// counts as success.
async fn send_and_confirm(call: ContractCall<Client, ()>) -> Result<TxHash, EscrowError> {
    let pending = call.send().await.map_err(|e| EscrowError::Rpc(e.to_string()))?;
    let tx_hash = pending.tx_hash();
    log::info!("Submitted {:?}", tx_hash);

    let receipt = pending
        .await
        .map_err(|e| EscrowError::Rpc(e.to_string()))?
        .ok_or(EscrowError::Dropped(tx_hash))?;
    if receipt.status != Some(U64::from(1)) {
        return Err(EscrowError::Reverted(tx_hash));
    }
    Ok(tx_hash)
}

#[async_trait]
impl EscrowContract for EthEscrow {
    async fn depositor(&self, ethscription_id: H256) -> Result<Address, EscrowError> {
        self.contract
            .depositors(ethscription_id.0)
            .call()
            .await
            .map_err(|e| EscrowError::Rpc(e.to_string()))
    }

    async fn deposit(&self, ethscription_id: H256) -> Result<TxHash, EscrowError> {
        send_and_confirm(self.contract.deposit(ethscription_id.0)).await
    }

    async fn cancel_and_withdraw(&self, ethscription_id: H256) -> Result<TxHash, EscrowError> {
        send_and_confirm(self.contract.cancel_and_withdraw(ethscription_id.0)).await
    }
}

pub fn parse_ethscription_id(value: &str) -> Result<H256, EscrowError> {
    let normalized = normalize_hash(value, "ethscription id").map_err(|_| EscrowError::InvalidId(value.to_string()))?;
    let bytes = hex::decode(&normalized[2..]).map_err(|_| EscrowError::InvalidId(value.to_string()))?;
    Ok(H256::from_slice(&bytes))
}

#[derive(Debug)]
pub struct RescueReport {
    pub ethscription_id: String,
    /// Set when the id had no depositor and had to be deposited first.
    pub deposit_tx: Option<TxHash>,
    pub withdraw: Result<TxHash, EscrowError>,
}

async fn rescue_one(
    contract: &dyn EscrowContract,
    ethscription_id: &str,
    deposit_tx: &mut Option<TxHash>,
) -> Result<TxHash, EscrowError> {
    let id = parse_ethscription_id(ethscription_id)?;
    let depositor = contract.depositor(id).await?;
    if depositor.is_zero() {
        log::info!("{} has no depositor, depositing first", ethscription_id);
        *deposit_tx = Some(contract.deposit(id).await?);
    } else {
        log::info!("{} deposited by {:?}", ethscription_id, depositor);
    }
    contract.cancel_and_withdraw(id).await
}

/// Runs deposit-if-needed then cancelAndWithdraw for each id, in order.
/// A failed id is reported and the remaining ids still run.
pub async fn rescue(contract: &dyn EscrowContract, ethscription_ids: &[String]) -> Vec<RescueReport> {
    let mut reports = Vec::with_capacity(ethscription_ids.len());
    for ethscription_id in ethscription_ids {
        let mut deposit_tx = None;
        let withdraw = rescue_one(contract, ethscription_id, &mut deposit_tx).await;
        match &withdraw {
            Ok(tx) => log::info!("Rescued {} in {:?}", ethscription_id, tx),
            Err(e) => log::error!("Rescue of {} failed: {}", ethscription_id, e),
        }
        reports.push(RescueReport {
            ethscription_id: ethscription_id.clone(),
            deposit_tx,
            withdraw,
        });
    }
    reports
}
