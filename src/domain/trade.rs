use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::MarketSide;

/// Action tag of a canonical trading instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TradeAction {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.to_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            "HOLD" => Ok(TradeAction::Hold),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// Validated, schema-conformant trading instruction produced by the
/// decision engine and consumed immediately by the trade executor.
///
/// `size_usd` is already clamped to the agent's per-trade cap;
/// HOLD carries `size_usd = 0` and no market reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalAction {
    pub action: TradeAction,
    pub market_id: Option<String>,
    pub side: Option<MarketSide>,
    pub size_usd: Decimal,
    pub max_price: Decimal,
    pub reasoning: String,
}

impl CanonicalAction {
    pub fn hold(reasoning: impl Into<String>) -> Self {
        Self {
            action: TradeAction::Hold,
            market_id: None,
            side: None,
            size_usd: Decimal::ZERO,
            max_price: Decimal::ONE,
            reasoning: reasoning.into(),
        }
    }

    pub fn is_hold(&self) -> bool {
        self.action == TradeAction::Hold
    }
}

/// Lifecycle of a trade record: pending -> {executed | failed}, exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Executed,
    Failed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Executed => "executed",
            TradeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TradeStatus {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "pending" => Ok(TradeStatus::Pending),
            "executed" => Ok(TradeStatus::Executed),
            "failed" => Ok(TradeStatus::Failed),
            other => Err(format!("unknown trade status: {other}")),
        }
    }
}

/// Immutable record of one attempted action against the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub market_id: String,
    pub action: TradeAction,
    pub side: MarketSide,
    pub size_usd: Decimal,
    /// Execution price, set on success
    pub price: Option<Decimal>,
    /// Derived size_usd / price, set on success
    pub shares: Option<Decimal>,
    pub reasoning: String,
    pub status: TradeStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Trade {
    /// New pending record for an attempted action
    pub fn pending(
        agent_id: Uuid,
        market_id: &str,
        action: TradeAction,
        side: MarketSide,
        size_usd: Decimal,
        reasoning: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            market_id: market_id.to_string(),
            action,
            side,
            size_usd,
            price: None,
            shares: None,
            reasoning: reasoning.to_string(),
            status: TradeStatus::Pending,
            error: None,
            created_at: Utc::now(),
            executed_at: None,
        }
    }

    /// Transition pending -> executed
    pub fn mark_executed(&mut self, price: Decimal, shares: Decimal) {
        self.status = TradeStatus::Executed;
        self.price = Some(price);
        self.shares = Some(shares);
        self.executed_at = Some(Utc::now());
    }

    /// Transition pending -> failed
    pub fn mark_failed(&mut self, error: &str) {
        self.status = TradeStatus::Failed;
        self.error = Some(error.to_string());
        self.executed_at = Some(Utc::now());
    }
}
