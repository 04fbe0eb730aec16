use std::str::FromStr;

use alloy::primitives::U256;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sqlx::types::BigDecimal;
use tracing::{debug, info, warn};

use super::price::{floor_to_u256, to_decimal, PriceSignal, PriceSource};
use super::{execute_and_record, CycleOutcome, Policy, PolicyContext};
use crate::config::{KeeperConfig, StrategyKind};
use crate::error::{AppResult, PriceError};
use crate::execution::SubmissionRequest;

/// What a strategy decided for this tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalancePlan {
    Hold(String),
    Trade { amount: U256, a_to_b: bool },
}

/// Tuning for the market-anchor strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketParams {
    pub threshold: BigDecimal,
    pub target_value_share: BigDecimal,
    pub max_rebalance_fraction: BigDecimal,
}

pub enum RebalanceStrategy {
    /// Trade back toward the price seen at startup / after the last rebalance
    InternalAnchor {
        anchor: Mutex<Option<PriceSignal>>,
        threshold: BigDecimal,
        min_amount: U256,
    },
    /// Trade toward a value split against a reference price, stateless
    MarketAnchor {
        price_source: PriceSource,
        params: MarketParams,
    },
}

impl RebalanceStrategy {
    pub fn internal_anchor(threshold: BigDecimal, min_amount: U256) -> Self {
        RebalanceStrategy::InternalAnchor {
            anchor: Mutex::new(None),
            threshold,
            min_amount,
        }
    }

    pub fn from_config(config: &KeeperConfig) -> AppResult<Self> {
        let threshold = to_big_decimal(config.rebalance_threshold);
        let strategy = match config.rebalance_strategy {
            StrategyKind::Internal => {
                Self::internal_anchor(threshold, config.min_rebalance_amount)
            }
            StrategyKind::Market => RebalanceStrategy::MarketAnchor {
                price_source: PriceSource::from_config(
                    config.market_price,
                    config.simulated_market_price,
                )?,
                params: MarketParams {
                    threshold,
                    target_value_share: to_big_decimal(config.target_value_share),
                    max_rebalance_fraction: to_big_decimal(config.max_rebalance_fraction),
                },
            },
        };
        Ok(strategy)
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            RebalanceStrategy::InternalAnchor { .. } => StrategyKind::Internal,
            RebalanceStrategy::MarketAnchor { .. } => StrategyKind::Market,
        }
    }
}

fn to_big_decimal(value: Decimal) -> BigDecimal {
    BigDecimal::from_str(&value.to_string()).unwrap_or_default()
}

/// Internal-anchor decision: fixed-size trade once the price drifts past the threshold
pub fn plan_internal(
    anchor: &PriceSignal,
    current: &PriceSignal,
    reserve_a: U256,
    threshold: &BigDecimal,
    min_amount: U256,
) -> Result<RebalancePlan, PriceError> {
    let deviation = current.deviation_from(anchor)?;
    debug!("Price deviation from anchor: {}", deviation.with_scale(6));

    if deviation <= *threshold {
        return Ok(RebalancePlan::Hold(format!(
            "deviation {} within threshold",
            deviation.with_scale(6)
        )));
    }

    warn!(
        "Price deviation {} exceeds threshold {}, rebalancing",
        deviation.with_scale(6),
        threshold
    );

    let amount = (reserve_a / U256::from(100u64)).max(min_amount);
    Ok(RebalancePlan::Trade {
        amount,
        a_to_b: current.value() > anchor.value(),
    })
}

/// Market-anchor decision against `price`, computed fresh from the reserves
pub fn plan_market(
    reserve_a: U256,
    reserve_b: U256,
    price: &PriceSignal,
    params: &MarketParams,
) -> Result<RebalancePlan, PriceError> {
    if reserve_a.is_zero() || reserve_b.is_zero() {
        return Ok(RebalancePlan::Hold("pool reserves empty".to_string()));
    }

    let zero = BigDecimal::from(0);
    let price = price.value();
    let value_a = to_decimal(reserve_a) * price.clone();
    let value_b = to_decimal(reserve_b);
    let total = value_a.clone() + value_b.clone();
    if total == zero {
        return Ok(RebalancePlan::Hold("pool value is zero".to_string()));
    }

    let target_value = total.clone() * params.target_value_share.clone();
    let target_a = (target_value.clone() / price.clone()).with_scale(0);
    let target_b = target_value.with_scale(0);

    info!("Current reserves: A={}, B={}", reserve_a, reserve_b);
    info!("Target reserves: A={}, B={}", target_a, target_b);

    let ceiling = to_decimal(U256::from(1u64) << 255usize);
    if target_a > ceiling || target_b > ceiling {
        warn!(
            "Target reserves out of range, skipping rebalance: A={}, B={}",
            target_a, target_b
        );
        return Ok(RebalancePlan::Hold("target reserves out of range".to_string()));
    }

    let deviation = (value_a - value_b).abs() / total;
    if deviation <= params.threshold {
        return Ok(RebalancePlan::Hold(format!(
            "value deviation {} within threshold",
            deviation.with_scale(6)
        )));
    }

    let target_a = floor_to_u256(&target_a)?;
    let target_b = floor_to_u256(&target_b)?;

    let (diff, a_to_b) = if reserve_a > target_a {
        (reserve_a - target_a, true)
    } else if reserve_b > target_b {
        (reserve_b - target_b, false)
    } else {
        return Ok(RebalancePlan::Hold("no side above target".to_string()));
    };

    let one = BigDecimal::from(1);
    let fraction = if params.max_rebalance_fraction > zero && params.max_rebalance_fraction <= one {
        params.max_rebalance_fraction.clone()
    } else {
        BigDecimal::from_str("0.1").unwrap_or(one)
    };

    let capped = floor_to_u256(&(to_decimal(diff) * fraction))?;
    let amount = capped.max(U256::from(1u64));

    Ok(RebalancePlan::Trade { amount, a_to_b })
}

/// Nudges reserves back toward balance with the configured strategy
pub struct RebalancePolicy {
    ctx: PolicyContext,
    strategy: RebalanceStrategy,
}

impl RebalancePolicy {
    pub fn new(ctx: PolicyContext, strategy: RebalanceStrategy) -> Self {
        Self { ctx, strategy }
    }

    pub fn strategy(&self) -> &RebalanceStrategy {
        &self.strategy
    }

    /// Anchor to the current pool price; a no-op until both reserves are funded
    async fn anchor_to_pool(&self, anchor: &Mutex<Option<PriceSignal>>) -> AppResult<bool> {
        let (reserve_a, reserve_b) = self.ctx.gateway.read_reserves().await?;
        if reserve_a.is_zero() || reserve_b.is_zero() {
            warn!("Pool is empty, waiting for liquidity before anchoring");
            return Ok(false);
        }

        let price = PriceSignal::from_reserves(reserve_a, reserve_b)?;
        info!("📌 Anchored rebalance price: {}", price);
        *anchor.lock() = Some(price);
        Ok(true)
    }

    async fn run_internal(
        &self,
        anchor: &Mutex<Option<PriceSignal>>,
        threshold: &BigDecimal,
        min_amount: U256,
    ) -> AppResult<CycleOutcome> {
        let initial = anchor.lock().clone();
        let initial = match initial {
            Some(price) => price,
            None => {
                if !self.anchor_to_pool(anchor).await? {
                    return Ok(CycleOutcome::Skipped("pool empty, no anchor".to_string()));
                }
                return Ok(CycleOutcome::Skipped("anchored initial price".to_string()));
            }
        };

        let (reserve_a, reserve_b) = self.ctx.gateway.read_reserves().await?;
        if reserve_a.is_zero() || reserve_b.is_zero() {
            return Ok(CycleOutcome::Skipped("pool reserves empty".to_string()));
        }

        let current = PriceSignal::from_reserves(reserve_a, reserve_b)?;
        let (amount, a_to_b) = match plan_internal(&initial, &current, reserve_a, threshold, min_amount)? {
            RebalancePlan::Hold(reason) => return Ok(CycleOutcome::Skipped(reason)),
            RebalancePlan::Trade { amount, a_to_b } => (amount, a_to_b),
        };

        info!("⚖️ Rebalancing: amount={}, AtoB={}", amount, a_to_b);
        let receipt = execute_and_record(
            &self.ctx,
            SubmissionRequest::rebalance(amount, a_to_b),
            amount,
            U256::ZERO,
        )
        .await?;

        if receipt.success {
            if let Err(e) = self.anchor_to_pool(anchor).await {
                warn!("Failed to re-anchor after rebalance, keeping previous anchor: {}", e);
            }
        }

        Ok(CycleOutcome::Executed {
            tx_hash: receipt.tx_hash,
            success: receipt.success,
        })
    }

    async fn run_market(
        &self,
        price_source: &PriceSource,
        params: &MarketParams,
    ) -> AppResult<CycleOutcome> {
        let (reserve_a, reserve_b) = self.ctx.gateway.read_reserves().await?;
        if reserve_a.is_zero() || reserve_b.is_zero() {
            info!("Pool reserves insufficient, skipping rebalance");
            return Ok(CycleOutcome::Skipped("pool reserves empty".to_string()));
        }

        let price = price_source.price(reserve_a, reserve_b)?;
        let (amount, a_to_b) = match plan_market(reserve_a, reserve_b, &price, params)? {
            RebalancePlan::Hold(reason) => {
                debug!("No rebalance needed: {}", reason);
                return Ok(CycleOutcome::Skipped(reason));
            }
            RebalancePlan::Trade { amount, a_to_b } => (amount, a_to_b),
        };

        info!("⚖️ Rebalancing toward market price {}: amount={}, AtoB={}", price, amount, a_to_b);
        let receipt = execute_and_record(
            &self.ctx,
            SubmissionRequest::rebalance(amount, a_to_b),
            amount,
            U256::ZERO,
        )
        .await?;

        Ok(CycleOutcome::Executed {
            tx_hash: receipt.tx_hash,
            success: receipt.success,
        })
    }
}

#[async_trait]
impl Policy for RebalancePolicy {
    fn name(&self) -> &'static str {
        "rebalance"
    }

    async fn prime(&self) -> AppResult<()> {
        if let RebalanceStrategy::InternalAnchor { anchor, .. } = &self.strategy {
            self.anchor_to_pool(anchor).await?;
        }
        Ok(())
    }

    async fn run_cycle(&self) -> AppResult<CycleOutcome> {
        info!("🔍 Running rebalance check ({:?})", self.strategy.kind());

        match &self.strategy {
            RebalanceStrategy::InternalAnchor {
                anchor,
                threshold,
                min_amount,
            } => self.run_internal(anchor, threshold, *min_amount).await,
            RebalanceStrategy::MarketAnchor {
                price_source,
                params,
            } => self.run_market(price_source, params).await,
        }
    }
}
