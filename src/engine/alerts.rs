//! Alert engine: pure threshold evaluation over trade, performance and
//! cycle outcomes. Each satisfied threshold persists one alert and
//! publishes it; nothing here mutates trades, agents or metrics.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::adapters::LedgerStore;
use crate::config::AlertThresholds;
use crate::domain::{
    Agent, Alert, AlertSeverity, CycleStats, CycleStatus, PerformanceMetrics, Trade, TradeStatus,
};
use crate::error::Result;
use crate::events::{EngineEvent, EventBus};

pub struct AlertEngine {
    store: Arc<dyn LedgerStore>,
    events: EventBus,
    thresholds: AlertThresholds,
}

impl AlertEngine {
    pub fn new(store: Arc<dyn LedgerStore>, events: EventBus, thresholds: AlertThresholds) -> Self {
        Self {
            store,
            events,
            thresholds,
        }
    }

    /// Persist and publish one alert
    async fn raise(&self, alert: Alert) -> Result<()> {
        match alert.severity {
            AlertSeverity::Info => info!(kind = alert.kind.as_str(), "{}", alert.message),
            AlertSeverity::Warning => warn!(kind = alert.kind.as_str(), "{}", alert.message),
            AlertSeverity::Critical => error!(kind = alert.kind.as_str(), "{}", alert.message),
        }
        self.store.insert_alert(&alert).await?;
        self.events.publish(EngineEvent::AlertRaised { alert });
        Ok(())
    }

    /// Evaluate one finished trade attempt.
    pub async fn on_trade(&self, trade: &Trade, agent: &Agent) -> Result<()> {
        match trade.status {
            TradeStatus::Failed => {
                let detail = trade.error.as_deref().unwrap_or("unknown");
                self.raise(
                    Alert::new(
                        "trade_rejected",
                        AlertSeverity::Warning,
                        "Trade rejected",
                        &format!(
                            "{} {} ${} on {} rejected: {}",
                            agent.name, trade.action, trade.size_usd, trade.market_id, detail
                        ),
                    )
                    .for_agent(agent.id)
                    .for_trade(trade.id)
                    .for_market(&trade.market_id),
                )
                .await?;
            }
            TradeStatus::Executed => {
                if trade.size_usd >= self.thresholds.large_trade_usd {
                    self.raise(
                        Alert::new(
                            "large_trade",
                            AlertSeverity::Info,
                            "Large trade",
                            &format!(
                                "{} {} ${} of {} on {}",
                                agent.name,
                                trade.action,
                                trade.size_usd,
                                trade.side,
                                trade.market_id
                            ),
                        )
                        .for_agent(agent.id)
                        .for_trade(trade.id)
                        .for_market(&trade.market_id),
                    )
                    .await?;
                }

                // Open exposure against the risk limit
                let positions = self.store.list_agent_positions(agent.id).await?;
                let exposure: Decimal = positions.iter().map(|p| p.current_value).sum();
                let limit = agent.initial_capital * self.thresholds.exposure_fraction;
                if exposure >= limit {
                    self.raise(
                        Alert::new(
                            "risk_limit",
                            AlertSeverity::Warning,
                            "Exposure near risk limit",
                            &format!(
                                "{} has ${exposure} at risk across {} positions (limit ${limit})",
                                agent.name,
                                positions.len()
                            ),
                        )
                        .for_agent(agent.id),
                    )
                    .await?;
                }
            }
            TradeStatus::Pending => {}
        }
        Ok(())
    }

    /// Evaluate a fresh performance snapshot against the previous one;
    /// alerts fire on threshold crossings, not on every cycle spent
    /// beyond a threshold.
    pub async fn on_performance(
        &self,
        agent: &Agent,
        metrics: &PerformanceMetrics,
        previous: Option<&PerformanceMetrics>,
    ) -> Result<()> {
        let win_threshold = self.thresholds.large_win_usd;
        if metrics.net_pnl >= win_threshold
            && previous.map_or(true, |p| p.net_pnl < win_threshold)
        {
            self.raise(
                Alert::new(
                    "large_win",
                    AlertSeverity::Info,
                    "Strong performance",
                    &format!("{} is up ${} net", agent.name, metrics.net_pnl),
                )
                .for_agent(agent.id),
            )
            .await?;
        }

        let loss_threshold = -self.thresholds.large_loss_usd;
        if metrics.net_pnl <= loss_threshold
            && previous.map_or(true, |p| p.net_pnl > loss_threshold)
        {
            self.raise(
                Alert::new(
                    "large_loss",
                    AlertSeverity::Warning,
                    "Heavy loss",
                    &format!("{} is down ${} net", agent.name, metrics.net_pnl.abs()),
                )
                .for_agent(agent.id),
            )
            .await?;
        }

        let drawdown_limit = -self.thresholds.drawdown_fraction;
        if metrics.max_drawdown <= drawdown_limit
            && previous.map_or(true, |p| p.max_drawdown > drawdown_limit)
        {
            self.raise(
                Alert::new(
                    "drawdown",
                    AlertSeverity::Critical,
                    "Drawdown limit breached",
                    &format!(
                        "{} drawdown at {:.1}% of initial capital",
                        agent.name,
                        metrics.max_drawdown * 100.0
                    ),
                )
                .for_agent(agent.id),
            )
            .await?;
        }

        // Win-rate floor only means something once a few trades exist
        if metrics.total_trades >= 5
            && metrics.win_rate < self.thresholds.win_rate_floor
            && previous.map_or(true, |p| p.win_rate >= self.thresholds.win_rate_floor)
        {
            self.raise(
                Alert::new(
                    "win_rate",
                    AlertSeverity::Warning,
                    "Win rate below floor",
                    &format!(
                        "{} win rate {:.0}% under the {:.0}% floor",
                        agent.name,
                        metrics.win_rate * 100.0,
                        self.thresholds.win_rate_floor * 100.0
                    ),
                )
                .for_agent(agent.id),
            )
            .await?;
        }

        Ok(())
    }

    /// Evaluate a finished cycle.
    pub async fn on_cycle_complete(
        &self,
        cycle_number: i64,
        status: CycleStatus,
        stats: &CycleStats,
    ) -> Result<()> {
        if status == CycleStatus::Failed {
            self.raise(Alert::new(
                "cycle_failed",
                AlertSeverity::Critical,
                "Cycle failed",
                &format!(
                    "Cycle {cycle_number} failed after {} trades and {} errors",
                    stats.trades_executed, stats.errors
                ),
            ))
            .await?;
        } else if stats.errors > 0 {
            self.raise(Alert::new(
                "cycle_errors",
                AlertSeverity::Warning,
                "Cycle completed with errors",
                &format!(
                    "Cycle {cycle_number} completed with {} errors ({} trades)",
                    stats.errors, stats.trades_executed
                ),
            ))
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryLedger;
    use crate::domain::{MarketSide, NewAgent, TradeAction};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    async fn setup() -> (Arc<MemoryLedger>, AlertEngine, Agent) {
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
        let engine = AlertEngine::new(
            store.clone(),
            EventBus::default(),
            AlertThresholds::default(),
        );
        (store, engine, agent)
    }

    fn metrics(agent_id: Uuid, net_pnl: Decimal, drawdown: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            id: Uuid::new_v4(),
            agent_id,
            net_pnl,
            win_rate: 0.5,
            sharpe_ratio: 0.0,
            max_drawdown: drawdown,
            total_trades: 1,
            open_positions: 0,
            turnover: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_failed_trade_raises_warning() {
        let (store, engine, agent) = setup().await;
        let mut trade = Trade::pending(
            agent.id,
            "m1",
            TradeAction::Buy,
            MarketSide::Yes,
            dec!(60),
            "r",
        );
        trade.mark_failed("Trade size $60 exceeds limit $50");

        engine.on_trade(&trade, &agent).await.unwrap();

        let alerts = store.list_alerts(false).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, "trade_rejected");
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
        assert_eq!(alerts[0].trade_id, Some(trade.id));
    }

    #[tokio::test]
    async fn test_large_trade_raises_info() {
        let (store, engine, agent) = setup().await;
        let mut trade = Trade::pending(
            agent.id,
            "m1",
            TradeAction::Buy,
            MarketSide::Yes,
            dec!(50),
            "r",
        );
        trade.mark_executed(dec!(0.40), dec!(125));

        engine.on_trade(&trade, &agent).await.unwrap();

        let alerts = store.list_alerts(false).await.unwrap();
        assert!(alerts.iter().any(|a| a.kind == "large_trade"));
    }

    #[tokio::test]
    async fn test_drawdown_fires_once_per_crossing() {
        let (store, engine, agent) = setup().await;

        let breached = metrics(agent.id, dec!(-60), -0.12);
        let prior_ok = metrics(agent.id, dec!(-20), -0.04);

        engine
            .on_performance(&agent, &breached, Some(&prior_ok))
            .await
            .unwrap();
        // Second evaluation with an already-breached previous snapshot
        engine
            .on_performance(&agent, &breached, Some(&breached))
            .await
            .unwrap();

        let drawdowns: Vec<_> = store
            .list_alerts(false)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.kind == "drawdown")
            .collect();
        assert_eq!(drawdowns.len(), 1);
        assert_eq!(drawdowns[0].severity, AlertSeverity::Critical);
    }

    #[tokio::test]
    async fn test_failed_cycle_is_critical() {
        let (store, engine, _agent) = setup().await;
        engine
            .on_cycle_complete(
                3,
                CycleStatus::Failed,
                &CycleStats {
                    markets_processed: 0,
                    trades_executed: 0,
                    errors: 2,
                },
            )
            .await
            .unwrap();

        let alerts = store.list_alerts(false).await.unwrap();
        assert_eq!(alerts[0].kind, "cycle_failed");
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    }

    #[tokio::test]
    async fn test_clean_cycle_is_silent() {
        let (store, engine, _agent) = setup().await;
        engine
            .on_cycle_complete(4, CycleStatus::Completed, &CycleStats::default())
            .await
            .unwrap();
        assert!(store.list_alerts(false).await.unwrap().is_empty());
    }
}
