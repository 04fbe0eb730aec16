use alloy::{
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{TransactionInput, TransactionRequest},
    transports::{RpcError, TransportError},
};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{error, warn};

use super::{LedgerClient, Receipt};
use crate::error::LedgerError;

/// Currently selected node
struct ActiveEndpoint {
    url: String,
    provider: DynProvider,
    /// `None` while on the primary endpoint
    fallback_index: Option<usize>,
}

/// JSON-RPC ledger client with primary / fallback endpoint switching
///
/// Calls clone the provider handle under a read lock; a switch takes the
/// write lock, so replacing the handle never races a caller reading it.
pub struct RpcLedgerClient {
    fallbacks: Vec<String>,
    active: RwLock<ActiveEndpoint>,
}

impl RpcLedgerClient {
    pub fn new(primary: &str, fallbacks: Vec<String>) -> Result<Self, LedgerError> {
        let provider = connect(primary)?;
        Ok(Self {
            fallbacks,
            active: RwLock::new(ActiveEndpoint {
                url: primary.to_string(),
                provider,
                fallback_index: None,
            }),
        })
    }

    pub async fn current_endpoint(&self) -> String {
        self.active.read().await.url.clone()
    }

    /// Rotate to the next fallback endpoint, wrapping around the list
    pub async fn switch_to_fallback(&self) -> Result<(), LedgerError> {
        if self.fallbacks.is_empty() {
            return Ok(());
        }

        let mut active = self.active.write().await;
        let next = match active.fallback_index {
            Some(index) => (index + 1) % self.fallbacks.len(),
            None => 0,
        };
        let url = &self.fallbacks[next];

        warn!("🔀 Switching to fallback RPC endpoint: {}", url);

        let provider = connect(url).map_err(|e| {
            error!("Failed to connect fallback RPC endpoint {}: {}", url, e);
            e
        })?;

        active.provider = provider;
        active.url = url.clone();
        active.fallback_index = Some(next);
        Ok(())
    }

    async fn provider(&self) -> (DynProvider, String) {
        let active = self.active.read().await;
        (active.provider.clone(), active.url.clone())
    }

    /// Classify a transport failure, switching endpoints on connection loss
    async fn observe<T>(
        &self,
        endpoint: String,
        result: Result<T, TransportError>,
    ) -> Result<T, LedgerError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                let err = classify(endpoint, err);
                if matches!(err, LedgerError::Connection { .. }) {
                    if let Err(switch_err) = self.switch_to_fallback().await {
                        warn!("Fallback switch failed: {}", switch_err);
                    }
                }
                Err(err)
            }
        }
    }
}

fn connect(url: &str) -> Result<DynProvider, LedgerError> {
    let url = url
        .parse()
        .map_err(|_| LedgerError::InvalidEndpoint(url.to_string()))?;
    Ok(ProviderBuilder::new().connect_http(url).erased())
}

fn classify(endpoint: String, err: TransportError) -> LedgerError {
    match err {
        RpcError::Transport(kind) => LedgerError::Connection {
            endpoint,
            message: kind.to_string(),
        },
        other => LedgerError::Rpc(other.to_string()),
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn read_call(&self, to: Address, data: Bytes) -> Result<Bytes, LedgerError> {
        let (provider, endpoint) = self.provider().await;
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(data));
        let result = provider.call(request).await;
        self.observe(endpoint, result).await
    }

    async fn submit_raw(&self, raw: Bytes) -> Result<B256, LedgerError> {
        let (provider, endpoint) = self.provider().await;
        let result = provider
            .send_raw_transaction(&raw)
            .await
            .map(|pending| *pending.tx_hash());
        self.observe(endpoint, result).await
    }

    async fn pending_nonce(&self, account: Address) -> Result<u64, LedgerError> {
        let (provider, endpoint) = self.provider().await;
        let result = provider.get_transaction_count(account).pending().await;
        self.observe(endpoint, result).await
    }

    async fn suggested_gas_price(&self) -> Result<u128, LedgerError> {
        let (provider, endpoint) = self.provider().await;
        let result = provider.get_gas_price().await;
        self.observe(endpoint, result).await
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<Receipt>, LedgerError> {
        let (provider, endpoint) = self.provider().await;
        let result = provider.get_transaction_receipt(tx_hash).await;
        let receipt = self.observe(endpoint, result).await?;

        Ok(receipt.map(|receipt| Receipt {
            tx_hash: receipt.transaction_hash,
            success: receipt.status(),
            gas_used: receipt.gas_used,
            block_number: receipt.block_number,
        }))
    }

    async fn balance(&self, account: Address) -> Result<U256, LedgerError> {
        let (provider, endpoint) = self.provider().await;
        let result = provider.get_balance(account).await;
        self.observe(endpoint, result).await
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        let (provider, endpoint) = self.provider().await;
        let result = provider.get_block_number().await;
        self.observe(endpoint, result).await
    }
}
