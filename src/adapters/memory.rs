//! In-memory ledger for tests and database-free dry runs.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Agent, Alert, CycleStats, CycleStatus, Market, MarketSide, NewAgent, PerformanceMetrics,
    Position, TickCycle, Trade, TradeStatus,
};
use crate::error::{AgoraError, Result};

use super::LedgerStore;

#[derive(Default)]
struct State {
    agents: HashMap<Uuid, Agent>,
    markets: HashMap<String, Market>,
    trades: HashMap<Uuid, Trade>,
    positions: HashMap<Uuid, Position>,
    metrics: Vec<PerformanceMetrics>,
    cycles: HashMap<Uuid, TickCycle>,
    alerts: HashMap<Uuid, Alert>,
}

/// Non-durable `LedgerStore` holding everything behind one RwLock
#[derive(Default)]
pub struct MemoryLedger {
    state: RwLock<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn upsert_agent(&self, agent: NewAgent) -> Result<Agent> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.agents.values().find(|a| a.name == agent.name) {
            return Ok(existing.clone());
        }
        let agent = agent.into_agent();
        state.agents.insert(agent.id, agent.clone());
        Ok(agent)
    }

    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>> {
        Ok(self.state.read().await.agents.get(&id).cloned())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        let state = self.state.read().await;
        let mut agents: Vec<Agent> = state.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(agents)
    }

    async fn list_active_agents(&self) -> Result<Vec<Agent>> {
        Ok(self
            .list_agents()
            .await?
            .into_iter()
            .filter(|a| a.active)
            .collect())
    }

    async fn set_agent_capital(&self, id: Uuid, capital: Decimal) -> Result<()> {
        let mut state = self.state.write().await;
        let agent = state
            .agents
            .get_mut(&id)
            .ok_or_else(|| AgoraError::AgentNotFound(id.to_string()))?;
        agent.current_capital = capital;
        Ok(())
    }

    async fn upsert_market(&self, market: &Market) -> Result<()> {
        self.state
            .write()
            .await
            .markets
            .insert(market.id.clone(), market.clone());
        Ok(())
    }

    async fn get_market(&self, id: &str) -> Result<Option<Market>> {
        Ok(self.state.read().await.markets.get(id).cloned())
    }

    async fn list_unresolved_markets(&self) -> Result<Vec<Market>> {
        let state = self.state.read().await;
        let mut markets: Vec<Market> = state
            .markets
            .values()
            .filter(|m| !m.resolved)
            .cloned()
            .collect();
        markets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(markets)
    }

    async fn insert_trade(&self, trade: &Trade) -> Result<()> {
        self.state
            .write()
            .await
            .trades
            .insert(trade.id, trade.clone());
        Ok(())
    }

    async fn finalize_trade(
        &self,
        id: Uuid,
        status: TradeStatus,
        price: Option<Decimal>,
        shares: Option<Decimal>,
        error: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let trade = state
            .trades
            .get_mut(&id)
            .ok_or_else(|| AgoraError::Internal(format!("trade not found: {id}")))?;
        trade.status = status;
        trade.price = price;
        trade.shares = shares;
        trade.error = error.map(|e| e.to_string());
        trade.executed_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn list_executed_trades(&self, agent_id: Uuid) -> Result<Vec<Trade>> {
        let state = self.state.read().await;
        let mut trades: Vec<Trade> = state
            .trades
            .values()
            .filter(|t| t.agent_id == agent_id && t.status == TradeStatus::Executed)
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.created_at);
        Ok(trades)
    }

    async fn get_position(
        &self,
        agent_id: Uuid,
        market_id: &str,
        side: MarketSide,
    ) -> Result<Option<Position>> {
        Ok(self
            .state
            .read()
            .await
            .positions
            .values()
            .find(|p| p.agent_id == agent_id && p.market_id == market_id && p.side == side)
            .cloned())
    }

    async fn upsert_position(&self, position: &Position) -> Result<()> {
        self.state
            .write()
            .await
            .positions
            .insert(position.id, position.clone());
        Ok(())
    }

    async fn delete_position(&self, id: Uuid) -> Result<()> {
        self.state.write().await.positions.remove(&id);
        Ok(())
    }

    async fn list_agent_positions(&self, agent_id: Uuid) -> Result<Vec<Position>> {
        let state = self.state.read().await;
        let mut positions: Vec<Position> = state
            .positions
            .values()
            .filter(|p| p.agent_id == agent_id)
            .cloned()
            .collect();
        positions.sort_by(|a, b| a.market_id.cmp(&b.market_id));
        Ok(positions)
    }

    async fn list_open_positions(&self) -> Result<Vec<Position>> {
        let state = self.state.read().await;
        let mut positions: Vec<Position> = state.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.market_id.cmp(&b.market_id));
        Ok(positions)
    }

    async fn insert_metrics(&self, metrics: &PerformanceMetrics) -> Result<()> {
        self.state.write().await.metrics.push(metrics.clone());
        Ok(())
    }

    async fn latest_metrics(&self, agent_id: Uuid) -> Result<Option<PerformanceMetrics>> {
        Ok(self
            .state
            .read()
            .await
            .metrics
            .iter()
            .filter(|m| m.agent_id == agent_id)
            .last()
            .cloned())
    }

    async fn last_cycle_number(&self) -> Result<i64> {
        Ok(self
            .state
            .read()
            .await
            .cycles
            .values()
            .map(|c| c.cycle_number)
            .max()
            .unwrap_or(0))
    }

    async fn last_cycle(&self) -> Result<Option<TickCycle>> {
        Ok(self
            .state
            .read()
            .await
            .cycles
            .values()
            .max_by_key(|c| c.cycle_number)
            .cloned())
    }

    async fn insert_cycle(&self, cycle: &TickCycle) -> Result<()> {
        self.state
            .write()
            .await
            .cycles
            .insert(cycle.id, cycle.clone());
        Ok(())
    }

    async fn finalize_cycle(&self, id: Uuid, status: CycleStatus, stats: CycleStats) -> Result<()> {
        let mut state = self.state.write().await;
        let cycle = state
            .cycles
            .get_mut(&id)
            .ok_or_else(|| AgoraError::Internal(format!("cycle not found: {id}")))?;
        cycle.status = status;
        cycle.stats = stats;
        cycle.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        self.state
            .write()
            .await
            .alerts
            .insert(alert.id, alert.clone());
        Ok(())
    }

    async fn list_alerts(&self, unread_only: bool) -> Result<Vec<Alert>> {
        let state = self.state.read().await;
        let mut alerts: Vec<Alert> = state
            .alerts
            .values()
            .filter(|a| !unread_only || !a.is_read)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.created_at);
        Ok(alerts)
    }

    async fn mark_alert_read(&self, id: Uuid) -> Result<()> {
        if let Some(alert) = self.state.write().await.alerts.get_mut(&id) {
            alert.is_read = true;
        }
        Ok(())
    }

    async fn dismiss_alert(&self, id: Uuid) -> Result<()> {
        if let Some(alert) = self.state.write().await.alerts.get_mut(&id) {
            alert.is_dismissed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_agent(name: &str) -> NewAgent {
        NewAgent {
            name: name.to_string(),
            model: "claude-sonnet".to_string(),
            strategy: "test".to_string(),
            initial_capital: dec!(500),
            active: true,
            max_trade_fraction: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_agent_is_idempotent() {
        let store = MemoryLedger::new();
        let first = store.upsert_agent(new_agent("alpha")).await.unwrap();

        // Second upsert with the same name returns the original row
        let mut changed = new_agent("alpha");
        changed.initial_capital = dec!(9999);
        let second = store.upsert_agent(changed).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.initial_capital, dec!(500));
        assert_eq!(store.list_agents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_alert_read_and_dismiss() {
        use crate::domain::AlertSeverity;

        let store = MemoryLedger::new();
        let alert = Alert::new("large_trade", AlertSeverity::Info, "t", "m");
        store.insert_alert(&alert).await.unwrap();

        assert_eq!(store.list_alerts(true).await.unwrap().len(), 1);

        store.mark_alert_read(alert.id).await.unwrap();
        assert!(store.list_alerts(true).await.unwrap().is_empty());

        store.dismiss_alert(alert.id).await.unwrap();
        let all = store.list_alerts(false).await.unwrap();
        assert!(all[0].is_read && all[0].is_dismissed);
    }

    #[tokio::test]
    async fn test_cycle_number_resumes() {
        let store = MemoryLedger::new();
        assert_eq!(store.last_cycle_number().await.unwrap(), 0);

        let cycle = TickCycle::started(41);
        store.insert_cycle(&cycle).await.unwrap();
        store
            .finalize_cycle(cycle.id, CycleStatus::Completed, CycleStats::default())
            .await
            .unwrap();

        assert_eq!(store.last_cycle_number().await.unwrap(), 41);
    }
}
