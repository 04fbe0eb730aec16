use alloy::primitives::U256;
use async_trait::async_trait;
use tracing::{debug, info};

use super::price::to_decimal;
use super::{execute_and_record, CycleOutcome, Policy, PolicyContext};
use crate::error::AppResult;
use crate::execution::SubmissionRequest;

/// Harvests accrued fees back into the pool once either side clears the floor
pub struct CompoundPolicy {
    ctx: PolicyContext,
    min_fee: U256,
}

impl CompoundPolicy {
    pub fn new(ctx: PolicyContext, min_fee: U256) -> Self {
        Self { ctx, min_fee }
    }
}

#[async_trait]
impl Policy for CompoundPolicy {
    fn name(&self) -> &'static str {
        "compound"
    }

    async fn run_cycle(&self) -> AppResult<CycleOutcome> {
        info!("🔍 Checking accrued fees");

        let pool = self.ctx.gateway.read_pool_state().await?;
        let (fee_a, fee_b) = (pool.fee_a, pool.fee_b);
        info!("Accrued fees: feeA={}, feeB={}", fee_a, fee_b);

        if fee_a < self.min_fee && fee_b < self.min_fee {
            info!("Fees below floor {}, skipping compound", self.min_fee);
            return Ok(CycleOutcome::Skipped("fees below floor".to_string()));
        }

        let (compound_a, compound_b) =
            calculate_optimal_amounts(fee_a, fee_b, pool.reserve_a, pool.reserve_b);
        debug!(
            "Reserve-balanced portion: A={}, B={}",
            compound_a, compound_b
        );

        info!("♻️ Compounding fees");
        let receipt =
            execute_and_record(&self.ctx, SubmissionRequest::compound(), fee_a, fee_b).await?;

        Ok(CycleOutcome::Executed {
            tx_hash: receipt.tx_hash,
            success: receipt.success,
        })
    }
}

/// Largest fee pair matching the pool's reserve ratio
///
/// Zero when either fee or either reserve is zero. Floor division.
pub fn calculate_optimal_amounts(
    fee_a: U256,
    fee_b: U256,
    reserve_a: U256,
    reserve_b: U256,
) -> (U256, U256) {
    if fee_a.is_zero() || fee_b.is_zero() || reserve_a.is_zero() || reserve_b.is_zero() {
        return (U256::ZERO, U256::ZERO);
    }

    let int = |value: U256| to_decimal(value).into_bigint_and_exponent().0;
    // both quotients are bounded by a fee, so they always fit
    let narrow = |value: String| U256::from_str_radix(&value, 10).unwrap_or_default();

    let optimal_b = int(fee_a) * int(reserve_b) / int(reserve_a);
    if optimal_b <= int(fee_b) {
        (fee_a, narrow(optimal_b.to_string()))
    } else {
        let optimal_a = int(fee_b) * int(reserve_a) / int(reserve_b);
        (narrow(optimal_a.to_string()), fee_b)
    }
}
