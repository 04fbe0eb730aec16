use std::{str::FromStr, time::Duration};

use alloy::{
    primitives::{Address, U256},
    signers::local::PrivateKeySigner,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;

use crate::error::{AppError, AppResult};

/// Which rebalance evaluator the deployment runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Anchor to the pool price observed at startup / after the last rebalance
    Internal,
    /// Target a value split against the live market price
    Market,
}

/// Environment shape, one field per variable (lowercased by the `config` crate)
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_rpc_endpoint")]
    rpc_endpoint: String,
    #[serde(default)]
    fallback_rpc_endpoints: Option<String>,
    #[serde(default)]
    contract_address: Option<String>,
    #[serde(default)]
    private_key: Option<String>,
    #[serde(default = "default_chain_id")]
    chain_id: u64,
    #[serde(default = "default_interval_secs")]
    compound_interval: u64,
    #[serde(default = "default_interval_secs")]
    rebalance_interval: u64,
    #[serde(default = "default_rebalance_threshold")]
    rebalance_threshold: Decimal,
    #[serde(default = "default_gas_limit")]
    gas_limit: u64,
    #[serde(default = "default_max_gas_price")]
    max_gas_price: u64,
    #[serde(default = "default_retry_attempts")]
    retry_attempts: u32,
    #[serde(default = "default_retry_delay")]
    retry_delay: u64,
    #[serde(default = "default_target_value_share")]
    target_value_share: Decimal,
    #[serde(default = "default_max_rebalance_fraction")]
    max_rebalance_fraction: Decimal,
    #[serde(default = "default_min_amount")]
    min_rebalance_amount: String,
    #[serde(default = "default_min_amount")]
    min_compound_fee: String,
    #[serde(default)]
    simulated_market_price: Option<f64>,
    #[serde(default)]
    market_price: Option<f64>,
    #[serde(default = "default_strategy")]
    rebalance_strategy: StrategyKind,
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default = "default_bind_address")]
    bind_address: String,
    #[serde(default = "default_shutdown_grace")]
    shutdown_grace: u64,
}

fn default_rpc_endpoint() -> String {
    "http://localhost:8545".to_string()
}
fn default_chain_id() -> u64 {
    31337
}
fn default_interval_secs() -> u64 {
    300
}
fn default_rebalance_threshold() -> Decimal {
    dec!(0.10)
}
fn default_gas_limit() -> u64 {
    300_000
}
fn default_max_gas_price() -> u64 {
    100
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    5
}
fn default_target_value_share() -> Decimal {
    dec!(0.5)
}
fn default_max_rebalance_fraction() -> Decimal {
    dec!(0.005)
}
fn default_min_amount() -> String {
    "1e15".to_string()
}
fn default_strategy() -> StrategyKind {
    StrategyKind::Market
}
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_shutdown_grace() -> u64 {
    5
}

/// Validated keeper configuration
#[derive(Debug, Clone)]
pub struct KeeperConfig {
    pub rpc_endpoint: String,
    pub fallback_rpc_endpoints: Vec<String>,
    pub contract_address: Address,
    /// Custodial key; only the address is ever logged
    pub signer: PrivateKeySigner,
    pub chain_id: u64,
    pub compound_interval: Duration,
    pub rebalance_interval: Duration,
    pub rebalance_threshold: Decimal,
    pub gas_limit: u64,
    /// Gas price ceiling in gwei
    pub max_gas_price_gwei: u64,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub target_value_share: Decimal,
    pub max_rebalance_fraction: Decimal,
    pub min_rebalance_amount: U256,
    pub min_compound_fee: U256,
    pub simulated_market_price: Option<f64>,
    /// Fixed reference price; takes precedence over the simulated source
    pub market_price: Option<f64>,
    pub rebalance_strategy: StrategyKind,
    pub database_url: Option<String>,
    pub bind_address: String,
    pub shutdown_grace: Duration,
}

impl KeeperConfig {
    /// Load from any environment-shaped source
    pub fn load(environment: config::Environment) -> AppResult<Self> {
        let raw: RawConfig = config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> AppResult<Self> {
        let contract_address = raw
            .contract_address
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::Config("CONTRACT_ADDRESS is not set".to_string()))?;
        let contract_address = Address::from_str(contract_address.trim())
            .map_err(|e| AppError::Config(format!("Invalid CONTRACT_ADDRESS: {}", e)))?;

        let private_key = raw
            .private_key
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::Config("PRIVATE_KEY is not set".to_string()))?;
        let signer = parse_private_key(&private_key)?;

        let fallback_rpc_endpoints = raw
            .fallback_rpc_endpoints
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        ensure_fraction("REBALANCE_THRESHOLD", raw.rebalance_threshold)?;
        ensure_fraction("TARGET_VALUE_SHARE", raw.target_value_share)?;

        if raw.compound_interval == 0 || raw.rebalance_interval == 0 {
            return Err(AppError::Config(
                "COMPOUND_INTERVAL and REBALANCE_INTERVAL must be positive".to_string(),
            ));
        }

        let simulated_market_price =
            ensure_positive_price("SIMULATED_MARKET_PRICE", raw.simulated_market_price)?;
        let market_price = ensure_positive_price("MARKET_PRICE", raw.market_price)?;

        Ok(Self {
            rpc_endpoint: raw.rpc_endpoint,
            fallback_rpc_endpoints,
            contract_address,
            signer,
            chain_id: raw.chain_id,
            compound_interval: Duration::from_secs(raw.compound_interval),
            rebalance_interval: Duration::from_secs(raw.rebalance_interval),
            rebalance_threshold: raw.rebalance_threshold,
            gas_limit: raw.gas_limit,
            max_gas_price_gwei: raw.max_gas_price,
            retry_attempts: raw.retry_attempts,
            retry_delay: Duration::from_secs(raw.retry_delay),
            target_value_share: raw.target_value_share,
            max_rebalance_fraction: raw.max_rebalance_fraction,
            min_rebalance_amount: parse_token_amount("MIN_REBALANCE_AMOUNT", &raw.min_rebalance_amount)?,
            min_compound_fee: parse_token_amount("MIN_COMPOUND_FEE", &raw.min_compound_fee)?,
            simulated_market_price,
            market_price,
            rebalance_strategy: raw.rebalance_strategy,
            database_url: raw.database_url.filter(|url| !url.trim().is_empty()),
            bind_address: raw.bind_address,
            shutdown_grace: Duration::from_secs(raw.shutdown_grace),
        })
    }

    /// Gas price ceiling in wei
    pub fn max_gas_price_wei(&self) -> u128 {
        u128::from(self.max_gas_price_gwei) * 1_000_000_000
    }
}

/// Accepts 64 hex characters with or without a `0x` prefix
pub fn parse_private_key(raw: &str) -> AppResult<PrivateKeySigner> {
    let trimmed = raw.trim();
    let hex_key = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if hex_key.len() != 64 {
        return Err(AppError::Config(format!(
            "PRIVATE_KEY must be 64 hex characters, got {}",
            hex_key.len()
        )));
    }

    let bytes = hex::decode(hex_key)
        .map_err(|e| AppError::Config(format!("PRIVATE_KEY is not valid hex: {}", e)))?;

    PrivateKeySigner::from_slice(&bytes)
        .map_err(|e| AppError::Config(format!("PRIVATE_KEY is not a valid secp256k1 key: {}", e)))
}

/// Integer or scientific notation ("1e15"), truncated to a whole amount
pub fn parse_token_amount(name: &str, raw: &str) -> AppResult<U256> {
    let trimmed = raw.trim();
    if let Ok(value) = U256::from_str_radix(trimmed, 10) {
        return Ok(value);
    }

    let decimal = BigDecimal::from_str(trimmed)
        .map_err(|e| AppError::Config(format!("{} is not a number: {}", name, e)))?;
    if decimal < BigDecimal::from(0) {
        return Err(AppError::Config(format!("{} must not be negative", name)));
    }

    let (digits, _) = decimal.with_scale(0).into_bigint_and_exponent();
    U256::from_str_radix(&digits.to_string(), 10)
        .map_err(|e| AppError::Config(format!("{} is out of range: {}", name, e)))
}

fn ensure_positive_price(name: &str, price: Option<f64>) -> AppResult<Option<f64>> {
    match price {
        Some(value) if value > 0.0 && value.is_finite() => Ok(Some(value)),
        Some(value) => Err(AppError::Config(format!(
            "{} must be positive, got {}",
            name, value
        ))),
        None => Ok(None),
    }
}

fn ensure_fraction(name: &str, value: Decimal) -> AppResult<()> {
    if value <= Decimal::ZERO || value > Decimal::ONE {
        return Err(AppError::Config(format!(
            "{} must be within (0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn environment(vars: &[(&str, &str)]) -> config::Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<config::Map<String, String>>();
        config::Environment::default()
            .source(Some(map))
            .try_parsing(true)
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("CONTRACT_ADDRESS", "0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            ("PRIVATE_KEY", TEST_KEY),
        ]
    }

    #[test]
    fn test_defaults_applied() {
        let config = KeeperConfig::load(environment(&required())).unwrap();

        assert_eq!(config.rpc_endpoint, "http://localhost:8545");
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.compound_interval, Duration::from_secs(300));
        assert_eq!(config.rebalance_threshold, dec!(0.10));
        assert_eq!(config.gas_limit, 300_000);
        assert_eq!(config.max_gas_price_wei(), 100_000_000_000);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.max_rebalance_fraction, dec!(0.005));
        assert_eq!(config.min_rebalance_amount, U256::from(1_000_000_000_000_000u64));
        assert_eq!(config.rebalance_strategy, StrategyKind::Market);
        assert!(config.fallback_rpc_endpoints.is_empty());
        assert!(config.simulated_market_price.is_none());
        assert!(config.market_price.is_none());
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let mut vars = required();
        vars.push(("FALLBACK_RPC_ENDPOINTS", "http://a:8545, http://b:8545"));
        vars.push(("REBALANCE_STRATEGY", "internal"));
        vars.push(("REBALANCE_THRESHOLD", "0.25"));
        vars.push(("SIMULATED_MARKET_PRICE", "1.5"));
        vars.push(("MIN_COMPOUND_FEE", "2500"));

        let config = KeeperConfig::load(environment(&vars)).unwrap();

        assert_eq!(
            config.fallback_rpc_endpoints,
            vec!["http://a:8545".to_string(), "http://b:8545".to_string()]
        );
        assert_eq!(config.rebalance_strategy, StrategyKind::Internal);
        assert_eq!(config.rebalance_threshold, dec!(0.25));
        assert_eq!(config.simulated_market_price, Some(1.5));
        assert_eq!(config.min_compound_fee, U256::from(2500u64));
    }

    #[test]
    fn test_missing_contract_address_is_fatal() {
        let result = KeeperConfig::load(environment(&[("PRIVATE_KEY", TEST_KEY)]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_private_key_validation() {
        assert!(parse_private_key(TEST_KEY).is_ok());
        assert!(parse_private_key(&TEST_KEY[2..]).is_ok());
        assert!(parse_private_key("0x1234").is_err());
        assert!(parse_private_key(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_parse_token_amount() {
        assert_eq!(parse_token_amount("X", "1e15").unwrap(), U256::from(10u64).pow(U256::from(15u64)));
        assert_eq!(parse_token_amount("X", "42").unwrap(), U256::from(42u64));
        assert_eq!(parse_token_amount("X", "42.9").unwrap(), U256::from(42u64));
        assert!(parse_token_amount("X", "-1").is_err());
        assert!(parse_token_amount("X", "abc").is_err());
    }

    #[test]
    fn test_market_price_override() {
        let mut vars = required();
        vars.push(("MARKET_PRICE", "0.25"));
        let config = KeeperConfig::load(environment(&vars)).unwrap();
        assert_eq!(config.market_price, Some(0.25));

        let mut vars = required();
        vars.push(("MARKET_PRICE", "-2"));
        assert!(matches!(
            KeeperConfig::load(environment(&vars)),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut vars = required();
        vars.push(("REBALANCE_THRESHOLD", "1.5"));
        assert!(KeeperConfig::load(environment(&vars)).is_err());
    }
}
