use std::collections::HashMap;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::actions::models::{ActionFilter, ActionType, BotAction};
use crate::config::{KeeperConfig, StrategyKind};

// ========== REQUEST MODELS ==========

const DEFAULT_LIMIT: i64 = 20;

/// Lenient `?limit&offset&type` parsing; malformed values fall back to defaults
pub fn parse_action_filter(params: &HashMap<String, String>) -> ActionFilter {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_LIMIT);

    let offset = params
        .get("offset")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .unwrap_or(0);

    let action_type = params
        .get("type")
        .and_then(|v| v.parse::<ActionType>().ok());

    ActionFilter {
        action_type,
        limit,
        offset,
    }
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BotActionsResponse {
    pub success: bool,
    pub data: Vec<BotAction>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct BotActionResponse {
    pub success: bool,
    pub data: BotAction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatsResponse {
    pub success: bool,
    pub compound_count: i64,
    pub rebalance_count: i64,
    pub latest_action: Option<BotAction>,
}

/// Non-secret view of the running configuration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub keeper_address: Address,
    pub contract_address: Address,
    pub chain_id: u64,
    pub rebalance_strategy: StrategyKind,
    pub compound_interval_secs: u64,
    pub rebalance_interval_secs: u64,
    pub rebalance_threshold: Decimal,
    pub gas_limit: u64,
    pub max_gas_price_gwei: u64,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub target_value_share: Decimal,
    pub max_rebalance_fraction: Decimal,
    pub min_rebalance_amount: String,
    pub min_compound_fee: String,
    pub simulated_market_price: Option<f64>,
    pub market_price: Option<f64>,
    pub persistent_store: bool,
}

impl From<&KeeperConfig> for ConfigSnapshot {
    fn from(config: &KeeperConfig) -> Self {
        Self {
            keeper_address: config.signer.address(),
            contract_address: config.contract_address,
            chain_id: config.chain_id,
            rebalance_strategy: config.rebalance_strategy,
            compound_interval_secs: config.compound_interval.as_secs(),
            rebalance_interval_secs: config.rebalance_interval.as_secs(),
            rebalance_threshold: config.rebalance_threshold,
            gas_limit: config.gas_limit,
            max_gas_price_gwei: config.max_gas_price_gwei,
            retry_attempts: config.retry_attempts,
            retry_delay_secs: config.retry_delay.as_secs(),
            target_value_share: config.target_value_share,
            max_rebalance_fraction: config.max_rebalance_fraction,
            min_rebalance_amount: config.min_rebalance_amount.to_string(),
            min_compound_fee: config.min_compound_fee.to_string(),
            simulated_market_price: config.simulated_market_price,
            market_price: config.market_price,
            persistent_store: config.database_url.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BotConfigResponse {
    pub success: bool,
    pub config: ConfigSnapshot,
}
