//! Storage adapters behind the `LedgerStore` seam.
//!
//! `PostgresLedger` is the durable store; `MemoryLedger` backs tests and
//! database-free dry runs. The engine never touches a pool directly.

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PostgresLedger;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    Agent, Alert, CycleStats, CycleStatus, Market, MarketSide, NewAgent, PerformanceMetrics,
    Position, TickCycle, Trade, TradeStatus,
};
use crate::error::Result;

/// Narrow repository interface over the shared capital ledger.
///
/// The store is the single source of truth; components read and write
/// through it every cycle and never cache authoritative state.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ==================== Agents ====================

    /// Insert the agent if no row with that name exists; return the
    /// stored row either way.
    async fn upsert_agent(&self, agent: NewAgent) -> Result<Agent>;

    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>>;

    async fn list_agents(&self) -> Result<Vec<Agent>>;

    async fn list_active_agents(&self) -> Result<Vec<Agent>>;

    /// Capital writes are reserved to the trade executor.
    async fn set_agent_capital(&self, id: Uuid, capital: Decimal) -> Result<()>;

    // ==================== Markets ====================

    async fn upsert_market(&self, market: &Market) -> Result<()>;

    async fn get_market(&self, id: &str) -> Result<Option<Market>>;

    async fn list_unresolved_markets(&self) -> Result<Vec<Market>>;

    // ==================== Trades ====================

    async fn insert_trade(&self, trade: &Trade) -> Result<()>;

    /// Finalize a pending trade exactly once.
    async fn finalize_trade(
        &self,
        id: Uuid,
        status: TradeStatus,
        price: Option<Decimal>,
        shares: Option<Decimal>,
        error: Option<&str>,
    ) -> Result<()>;

    async fn list_executed_trades(&self, agent_id: Uuid) -> Result<Vec<Trade>>;

    // ==================== Positions ====================

    async fn get_position(
        &self,
        agent_id: Uuid,
        market_id: &str,
        side: MarketSide,
    ) -> Result<Option<Position>>;

    async fn upsert_position(&self, position: &Position) -> Result<()>;

    async fn delete_position(&self, id: Uuid) -> Result<()>;

    async fn list_agent_positions(&self, agent_id: Uuid) -> Result<Vec<Position>>;

    async fn list_open_positions(&self) -> Result<Vec<Position>>;

    // ==================== Metrics ====================

    async fn insert_metrics(&self, metrics: &PerformanceMetrics) -> Result<()>;

    async fn latest_metrics(&self, agent_id: Uuid) -> Result<Option<PerformanceMetrics>>;

    // ==================== Cycles ====================

    /// Highest persisted cycle number, 0 when none exist.
    async fn last_cycle_number(&self) -> Result<i64>;

    async fn last_cycle(&self) -> Result<Option<TickCycle>>;

    async fn insert_cycle(&self, cycle: &TickCycle) -> Result<()>;

    /// Move a running cycle into a terminal state with final counts.
    async fn finalize_cycle(&self, id: Uuid, status: CycleStatus, stats: CycleStats) -> Result<()>;

    // ==================== Alerts ====================

    async fn insert_alert(&self, alert: &Alert) -> Result<()>;

    async fn list_alerts(&self, unread_only: bool) -> Result<Vec<Alert>>;

    async fn mark_alert_read(&self, id: Uuid) -> Result<()>;

    async fn dismiss_alert(&self, id: Uuid) -> Result<()>;
}
