use std::{sync::Arc, time::Duration};

use alloy::{
    consensus::{SignableTransaction, TxEnvelope, TxLegacy},
    eips::eip2718::Encodable2718,
    network::TxSignerSync,
    primitives::{Address, Bytes, TxKind, B256, U256},
    signers::local::PrivateKeySigner,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::KeeperConfig;
use crate::contract::ContractGateway;
use crate::error::{LedgerError, PipelineError};
use crate::keeper::shutdown::ShutdownSignal;
use crate::ledger::{LedgerClient, Receipt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    Compound,
    Rebalance,
}

/// A state-changing call a policy wants on chain; consumed by [`TransactionPipeline::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub kind: SubmissionKind,
    pub amount: U256,
    pub direction_a_to_b: bool,
}

impl SubmissionRequest {
    pub fn compound() -> Self {
        Self {
            kind: SubmissionKind::Compound,
            amount: U256::ZERO,
            direction_a_to_b: false,
        }
    }

    pub fn rebalance(amount: U256, direction_a_to_b: bool) -> Self {
        Self {
            kind: SubmissionKind::Rebalance,
            amount,
            direction_a_to_b,
        }
    }
}

/// Network acknowledgement of a signed submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTx {
    pub tx_hash: B256,
    pub nonce: u64,
    pub gas_price: u128,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chain_id: u64,
    pub gas_limit: u64,
    pub max_gas_price_wei: u128,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl From<&KeeperConfig> for PipelineConfig {
    fn from(config: &KeeperConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            gas_limit: config.gas_limit,
            max_gas_price_wei: config.max_gas_price_wei(),
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay,
        }
    }
}

/// Serialized nonce / sign / submit sequence for the custodial key
///
/// The submission lock is held from nonce fetch until the node acknowledges
/// the raw transaction, so two policies can never sign with the same nonce.
/// Receipt polling happens outside the lock.
pub struct TransactionPipeline {
    ledger: Arc<dyn LedgerClient>,
    gateway: ContractGateway,
    signer: PrivateKeySigner,
    config: PipelineConfig,
    submission_lock: Mutex<()>,
    shutdown: ShutdownSignal,
}

impl TransactionPipeline {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        gateway: ContractGateway,
        signer: PrivateKeySigner,
        config: PipelineConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            ledger,
            gateway,
            signer,
            config,
            submission_lock: Mutex::new(()),
            shutdown,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub async fn balance(&self) -> Result<U256, LedgerError> {
        self.ledger.balance(self.address()).await
    }

    #[instrument(skip(self, request), fields(kind = ?request.kind, amount = %request.amount))]
    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmittedTx, PipelineError> {
        let payload = self.encode(&request)?;

        let _guard = self.submission_lock.lock().await;
        if self.shutdown.is_triggered() {
            return Err(PipelineError::ShuttingDown);
        }

        let nonce = self
            .ledger
            .pending_nonce(self.address())
            .await
            .map_err(PipelineError::NonceFetch)?;
        let suggested = self
            .ledger
            .suggested_gas_price()
            .await
            .map_err(PipelineError::GasPriceFetch)?;
        let gas_price = clamp_gas_price(suggested, self.config.max_gas_price_wei);

        let raw = self.sign(nonce, gas_price, payload)?;
        let tx_hash = self
            .ledger
            .submit_raw(raw)
            .await
            .map_err(PipelineError::SubmitFailure)?;

        info!(
            "📤 Submitted {:?} transaction {} (nonce {}, gas price {} wei)",
            request.kind, tx_hash, nonce, gas_price
        );

        Ok(SubmittedTx {
            tx_hash,
            nonce,
            gas_price,
        })
    }

    /// Poll for the receipt, sleeping `retry_delay` before each of `retry_attempts` lookups
    #[instrument(skip(self))]
    pub async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Receipt, PipelineError> {
        for attempt in 1..=self.config.retry_attempts {
            tokio::select! {
                _ = tokio::time::sleep(self.config.retry_delay) => {}
                _ = self.shutdown.triggered() => {
                    warn!("Shutdown while waiting for {}; transaction already submitted", tx_hash);
                    return Err(PipelineError::Cancelled(tx_hash.to_string()));
                }
            }

            match self.ledger.receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    info!(
                        "✅ Transaction {} mined (status: {}, gas used: {})",
                        tx_hash,
                        if receipt.success { "success" } else { "failed" },
                        receipt.gas_used
                    );
                    return Ok(receipt);
                }
                Ok(None) => debug!("Receipt for {} not available (attempt {})", tx_hash, attempt),
                Err(e) => warn!("Receipt lookup for {} failed (attempt {}): {}", tx_hash, attempt, e),
            }
        }

        Err(PipelineError::ConfirmationTimeout {
            tx_hash: tx_hash.to_string(),
            attempts: self.config.retry_attempts,
        })
    }

    fn encode(&self, request: &SubmissionRequest) -> Result<Bytes, PipelineError> {
        let payload = match request.kind {
            SubmissionKind::Compound => self.gateway.build_compound_call(),
            SubmissionKind::Rebalance => self
                .gateway
                .build_rebalance_call(request.amount, request.direction_a_to_b)?,
        };
        Ok(payload)
    }

    fn sign(&self, nonce: u64, gas_price: u128, input: Bytes) -> Result<Bytes, PipelineError> {
        let mut tx = TxLegacy {
            chain_id: Some(self.config.chain_id),
            nonce,
            gas_price,
            gas_limit: self.config.gas_limit,
            to: TxKind::Call(self.gateway.address()),
            value: U256::ZERO,
            input,
        };

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| PipelineError::Signing(e.to_string()))?;

        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(envelope.encoded_2718().into())
    }
}

/// Cap a node-suggested gas price at the configured ceiling
pub fn clamp_gas_price(suggested: u128, ceiling: u128) -> u128 {
    if suggested > ceiling {
        warn!(
            "⛽ Suggested gas price {} wei exceeds ceiling {} wei, clamping",
            suggested, ceiling
        );
        ceiling
    } else {
        suggested
    }
}
