//! Metrics engine: recomputes an agent's aggregate performance after
//! each applied trade and appends it to the snapshot time series.
//!
//! Win rate, Sharpe and drawdown are deliberately coarse estimates
//! derived from the aggregate capital delta, not per-trade outcome
//! tracking. A rigorous rework would book realized PnL per closed
//! position; the stored contract stays as-is until then.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::adapters::LedgerStore;
use crate::domain::PerformanceMetrics;
use crate::error::{AgoraError, Result};

/// Fixed volatility assumption under the Sharpe proxy
pub const ASSUMED_VOLATILITY: f64 = 0.15;

const WIN_RATE_FLOOR: f64 = 0.3;
const WIN_RATE_CEIL: f64 = 0.7;

pub struct MetricsEngine {
    store: Arc<dyn LedgerStore>,
}

impl MetricsEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Recompute and append a performance snapshot for one agent.
    pub async fn recompute(&self, agent_id: Uuid) -> Result<PerformanceMetrics> {
        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| AgoraError::AgentNotFound(agent_id.to_string()))?;

        let trades = self.store.list_executed_trades(agent_id).await?;
        let positions = self.store.list_agent_positions(agent_id).await?;

        let unrealized: Decimal = positions.iter().map(|p| p.unrealized_pnl).sum();
        let net_pnl = (agent.current_capital - agent.initial_capital) + unrealized;
        let turnover: Decimal = trades.iter().map(|t| t.size_usd).sum();

        let return_pct = (net_pnl / agent.initial_capital).to_f64().unwrap_or(0.0);
        let win_rate = (0.5 + return_pct * 0.5).clamp(WIN_RATE_FLOOR, WIN_RATE_CEIL);
        let sharpe_ratio = return_pct / ASSUMED_VOLATILITY;
        let max_drawdown = return_pct.min(0.0);

        let metrics = PerformanceMetrics {
            id: Uuid::new_v4(),
            agent_id,
            net_pnl,
            win_rate,
            sharpe_ratio,
            max_drawdown,
            total_trades: trades.len() as u32,
            open_positions: positions.len() as u32,
            turnover,
            created_at: Utc::now(),
        };

        self.store.insert_metrics(&metrics).await?;
        debug!(
            agent = %agent.name,
            net_pnl = %net_pnl,
            trades = metrics.total_trades,
            "metrics snapshot appended"
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryLedger;
    use crate::domain::{MarketSide, NewAgent, Position};
    use rust_decimal_macros::dec;

    async fn seeded_store() -> (Arc<MemoryLedger>, Uuid) {
        let store = Arc::new(MemoryLedger::new());
        let agent = store
            .upsert_agent(NewAgent {
                name: "alpha".to_string(),
                model: "claude-sonnet".to_string(),
                strategy: "test".to_string(),
                initial_capital: dec!(500),
                active: true,
                max_trade_fraction: None,
            })
            .await
            .unwrap();
        (store, agent.id)
    }

    #[tokio::test]
    async fn test_flat_agent_has_neutral_metrics() {
        let (store, agent_id) = seeded_store().await;
        let engine = MetricsEngine::new(store.clone());

        let metrics = engine.recompute(agent_id).await.unwrap();
        assert_eq!(metrics.net_pnl, Decimal::ZERO);
        assert!((metrics.win_rate - 0.5).abs() < 1e-9);
        assert_eq!(metrics.max_drawdown, 0.0);
        assert_eq!(metrics.total_trades, 0);

        // Snapshot was appended
        assert!(store.latest_metrics(agent_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_net_pnl_includes_unrealized() {
        let (store, agent_id) = seeded_store().await;

        // Spent $50 on a position now worth $62.50
        store.set_agent_capital(agent_id, dec!(450)).await.unwrap();
        let mut position = Position::open(agent_id, "m1", MarketSide::Yes, dec!(125), dec!(0.40));
        position.revalue(dec!(0.50));
        store.upsert_position(&position).await.unwrap();

        let engine = MetricsEngine::new(store);
        let metrics = engine.recompute(agent_id).await.unwrap();

        // (450 - 500) + 12.50 = -37.50
        assert_eq!(metrics.net_pnl, dec!(-37.50));
        assert_eq!(metrics.open_positions, 1);
        assert!(metrics.max_drawdown < 0.0);
    }

    #[tokio::test]
    async fn test_win_rate_is_bounded() {
        let (store, agent_id) = seeded_store().await;
        // Absurd gain still caps the proxy at 0.7
        store.set_agent_capital(agent_id, dec!(5000)).await.unwrap();

        let engine = MetricsEngine::new(store);
        let metrics = engine.recompute(agent_id).await.unwrap();
        assert!((metrics.win_rate - 0.7).abs() < 1e-9);
    }
}
