use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time performance snapshot for one agent.
///
/// Rows form an append-only time series; one is added after each
/// applied trade and none is ever mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub id: Uuid,
    pub agent_id: Uuid,
    /// (current - initial capital) + sum of unrealized PnL
    pub net_pnl: Decimal,
    /// Heuristic estimate bounded to [0.3, 0.7], not a per-trade
    /// outcome classifier
    pub win_rate: f64,
    /// Return over a fixed assumed volatility
    pub sharpe_ratio: f64,
    /// min(0, net_pnl / initial_capital)
    pub max_drawdown: f64,
    pub total_trades: u32,
    pub open_positions: u32,
    /// Sum of all executed trade sizes
    pub turnover: Decimal,
    pub created_at: DateTime<Utc>,
}
