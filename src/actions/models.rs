use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Compound,
    Rebalance,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Compound => "COMPOUND",
            ActionType::Rebalance => "REBALANCE",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMPOUND" => Ok(ActionType::Compound),
            "REBALANCE" => Ok(ActionType::Rebalance),
            other => Err(AppError::InvalidInput(format!("Unknown action type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Failed,
}

impl ActionStatus {
    pub fn from_receipt(success: bool) -> Self {
        if success {
            ActionStatus::Success
        } else {
            ActionStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Success => "success",
            ActionStatus::Failed => "failed",
        }
    }
}

impl FromStr for ActionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ActionStatus::Success),
            "failed" => Ok(ActionStatus::Failed),
            other => Err(AppError::Internal(format!("Unknown action status: {}", other))),
        }
    }
}

/// Rebalance trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    AtoB,
    BtoA,
}

impl Direction {
    pub fn from_a_to_b(a_to_b: bool) -> Self {
        if a_to_b {
            Direction::AtoB
        } else {
            Direction::BtoA
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::AtoB => "AtoB",
            Direction::BtoA => "BtoA",
        }
    }
}

impl FromStr for Direction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AtoB" => Ok(Direction::AtoB),
            "BtoA" => Ok(Direction::BtoA),
            other => Err(AppError::Internal(format!("Unknown direction: {}", other))),
        }
    }
}

/// Completed action awaiting insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBotAction {
    pub timestamp: DateTime<Utc>,
    pub action_type: ActionType,
    /// Decimal string of base units
    pub amount_a: String,
    pub amount_b: String,
    /// 0x-prefixed transaction hash
    pub tx_hash: String,
    pub direction: Option<Direction>,
    pub status: ActionStatus,
    pub gas_used: u64,
}

/// Stored audit record, immutable once written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotAction {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub action_type: ActionType,
    pub amount_a: String,
    pub amount_b: String,
    pub tx_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub status: ActionStatus,
    pub gas_used: u64,
    pub created_at: DateTime<Utc>,
}

impl BotAction {
    pub fn from_new(id: i64, action: NewBotAction, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            timestamp: action.timestamp,
            action_type: action.action_type,
            amount_a: action.amount_a,
            amount_b: action.amount_b,
            tx_hash: action.tx_hash,
            direction: action.direction,
            status: action.status,
            gas_used: action.gas_used,
            created_at,
        }
    }
}

/// Raw `bot_actions` row
#[derive(Debug, FromRow)]
pub struct BotActionRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    pub amount_a: String,
    pub amount_b: String,
    pub tx_hash: String,
    pub direction: Option<String>,
    pub status: String,
    pub gas_used: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<BotActionRow> for BotAction {
    type Error = AppError;

    fn try_from(row: BotActionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            timestamp: row.timestamp,
            action_type: row.action_type.parse()?,
            amount_a: row.amount_a,
            amount_b: row.amount_b,
            tx_hash: row.tx_hash,
            direction: row.direction.as_deref().map(str::parse).transpose()?,
            status: row.status.parse()?,
            gas_used: row.gas_used.unwrap_or_default().max(0) as u64,
            created_at: row.created_at,
        })
    }
}

/// Listing filter for the query surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFilter {
    pub action_type: Option<ActionType>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ActionFilter {
    fn default() -> Self {
        Self {
            action_type: None,
            limit: 20,
            offset: 0,
        }
    }
}
