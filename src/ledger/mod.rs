pub mod rpc;

#[cfg(test)]
pub mod mock;

use std::str::FromStr;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use sqlx::types::BigDecimal;

use crate::error::LedgerError;

pub use rpc::RpcLedgerClient;

/// Confirmed outcome of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    /// `true` when the transaction executed without reverting
    pub success: bool,
    pub gas_used: u64,
    pub block_number: Option<u64>,
}

/// Connection to a remote ledger node
///
/// The keeper never touches the node directly; the gateway and the
/// pipeline go through this trait so tests can script node behaviour.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Read-only contract call, returns the raw ABI payload
    async fn read_call(&self, to: Address, data: Bytes) -> Result<Bytes, LedgerError>;

    /// Broadcast a signed, 2718-encoded transaction
    async fn submit_raw(&self, raw: Bytes) -> Result<B256, LedgerError>;

    async fn pending_nonce(&self, account: Address) -> Result<u64, LedgerError>;

    /// Suggested legacy gas price in wei
    async fn suggested_gas_price(&self) -> Result<u128, LedgerError>;

    /// `Ok(None)` while the transaction is unknown or still pending
    async fn receipt(&self, tx_hash: B256) -> Result<Option<Receipt>, LedgerError>;

    async fn balance(&self, account: Address) -> Result<U256, LedgerError>;

    async fn block_number(&self) -> Result<u64, LedgerError>;
}

/// Render a wei amount as ether with six decimals
pub fn format_ether(wei: U256) -> String {
    let wei = BigDecimal::from_str(&wei.to_string()).unwrap_or_default();
    let ether = wei / BigDecimal::from(1_000_000_000_000_000_000u64);
    ether.with_scale(6).to_string()
}
