pub mod compound;
pub mod price;
pub mod rebalance;

use std::sync::Arc;

use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info};

use crate::actions::models::{ActionStatus, ActionType, Direction, NewBotAction};
use crate::actions::ActionRecorder;
use crate::contract::ContractGateway;
use crate::error::AppResult;
use crate::execution::{SubmissionKind, SubmissionRequest, TransactionPipeline};
use crate::ledger::Receipt;

pub use compound::CompoundPolicy;
pub use rebalance::{RebalancePolicy, RebalanceStrategy};

/// Result of one policy tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Preconditions not met, nothing submitted
    Skipped(String),
    /// A transaction was mined; `success` is the receipt status
    Executed { tx_hash: B256, success: bool },
}

/// A periodic keeper policy
#[async_trait]
pub trait Policy: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-off setup before the first tick
    async fn prime(&self) -> AppResult<()> {
        Ok(())
    }

    async fn run_cycle(&self) -> AppResult<CycleOutcome>;
}

/// Collaborators shared by every policy
#[derive(Clone)]
pub struct PolicyContext {
    pub gateway: ContractGateway,
    pub pipeline: Arc<TransactionPipeline>,
    pub recorder: ActionRecorder,
}

/// Submit, wait for the receipt and record the action whatever its status
///
/// Pipeline errors propagate and leave no record.
pub async fn execute_and_record(
    ctx: &PolicyContext,
    request: SubmissionRequest,
    amount_a: U256,
    amount_b: U256,
) -> AppResult<Receipt> {
    let (action_type, direction) = match request.kind {
        SubmissionKind::Compound => (ActionType::Compound, None),
        SubmissionKind::Rebalance => (
            ActionType::Rebalance,
            Some(Direction::from_a_to_b(request.direction_a_to_b)),
        ),
    };

    let submitted = ctx.pipeline.submit(request).await?;
    let receipt = ctx.pipeline.wait_for_receipt(submitted.tx_hash).await?;

    if receipt.success {
        info!("✅ {} succeeded, gas used: {}", action_type, receipt.gas_used);
    } else {
        error!("❌ {} transaction {} reverted", action_type, submitted.tx_hash);
    }

    ctx.recorder
        .record(NewBotAction {
            timestamp: Utc::now(),
            action_type,
            amount_a: amount_a.to_string(),
            amount_b: amount_b.to_string(),
            tx_hash: submitted.tx_hash.to_string(),
            direction,
            status: ActionStatus::from_receipt(receipt.success),
            gas_used: receipt.gas_used,
        })
        .await;

    Ok(receipt)
}
