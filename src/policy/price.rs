use std::{
    f64::consts::PI,
    fmt,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use alloy::primitives::U256;
use sqlx::types::BigDecimal;
use tracing::info;

use crate::error::PriceError;

const SIMULATED_AMPLITUDE: f64 = 0.05;
const SIMULATED_PERIOD_SECS: f64 = 1800.0;

/// Units of token B per unit of token A
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSignal(BigDecimal);

impl PriceSignal {
    /// Pool-implied price `reserve_b / reserve_a`
    pub fn from_reserves(reserve_a: U256, reserve_b: U256) -> Result<Self, PriceError> {
        if reserve_a.is_zero() {
            return Err(PriceError::ZeroDenominator);
        }
        Ok(Self(to_decimal(reserve_b) / to_decimal(reserve_a)))
    }

    /// Externally supplied price; must be strictly positive
    pub fn from_external(price: f64) -> Result<Self, PriceError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(PriceError::NonPositive(price.to_string()));
        }
        BigDecimal::from_str(&price.to_string())
            .map(Self)
            .map_err(|_| PriceError::NonPositive(price.to_string()))
    }

    pub fn value(&self) -> &BigDecimal {
        &self.0
    }

    /// Relative distance `|self - anchor| / anchor`
    pub fn deviation_from(&self, anchor: &PriceSignal) -> Result<BigDecimal, PriceError> {
        if anchor.0 == BigDecimal::from(0) {
            return Err(PriceError::ZeroDenominator);
        }
        Ok((&self.0 - &anchor.0).abs() / anchor.0.clone())
    }
}

impl fmt::Display for PriceSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.with_scale(8))
    }
}

/// Where the market-anchor strategy takes its reference price from
#[derive(Debug, Clone, PartialEq)]
pub enum PriceSource {
    /// The pool's own reserve ratio
    PoolReserves,
    /// Operator-supplied reference price
    Fixed(PriceSignal),
    /// Sine wave around `base`, for running without a price feed
    Simulated { base: f64 },
}

impl PriceSource {
    /// A fixed price wins over the simulated source; neither means pool reserves
    pub fn from_config(
        market_price: Option<f64>,
        simulated_market_price: Option<f64>,
    ) -> Result<Self, PriceError> {
        match (market_price, simulated_market_price) {
            (Some(price), _) => Ok(PriceSource::Fixed(PriceSignal::from_external(price)?)),
            (None, Some(base)) => Ok(PriceSource::Simulated { base }),
            (None, None) => Ok(PriceSource::PoolReserves),
        }
    }

    /// Price for this cycle; pool-derived prices use the reserves already read
    pub fn price(&self, reserve_a: U256, reserve_b: U256) -> Result<PriceSignal, PriceError> {
        match self {
            PriceSource::PoolReserves => PriceSignal::from_reserves(reserve_a, reserve_b),
            PriceSource::Fixed(price) => Ok(price.clone()),
            PriceSource::Simulated { base } => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default();
                let price = simulated_price(*base, now);
                info!(
                    "Using simulated market price {:.8} (base {}, swing {:.2}%)",
                    price,
                    base,
                    (price / base - 1.0) * 100.0
                );
                PriceSignal::from_external(price)
            }
        }
    }
}

/// `base * (1 + 0.05 * sin(2π * t / 1800))`
pub fn simulated_price(base: f64, unix_secs: u64) -> f64 {
    let phase = unix_secs as f64 / SIMULATED_PERIOD_SECS;
    base * (1.0 + SIMULATED_AMPLITUDE * (2.0 * PI * phase).sin())
}

pub fn to_decimal(value: U256) -> BigDecimal {
    // the decimal rendering of an integer always parses
    BigDecimal::from_str(&value.to_string()).unwrap_or_default()
}

/// Truncate a non-negative decimal to an integer amount
pub fn floor_to_u256(value: &BigDecimal) -> Result<U256, PriceError> {
    if *value < BigDecimal::from(0) {
        return Err(PriceError::Unrepresentable(value.to_string()));
    }
    let (digits, _) = value.with_scale(0).into_bigint_and_exponent();
    U256::from_str_radix(&digits.to_string(), 10)
        .map_err(|_| PriceError::Unrepresentable(value.to_string()))
}
