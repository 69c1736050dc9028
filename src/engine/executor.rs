//! Trade executor: validates canonical actions against risk, liquidity
//! and ledger rules, then applies them in simulation mode.
//!
//! The executor is the only writer of trades, positions and agent
//! capital. Validation runs in a fixed order and the first failure
//! short-circuits into a failed trade with no ledger mutation.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::LedgerStore;
use crate::config::{ExecutionConfig, RiskConfig};
use crate::domain::{
    Agent, CanonicalAction, Market, MarketSide, PerformanceMetrics, Position, Trade, TradeAction,
    TradeStatus,
};
use crate::error::{AgoraError, Result, ValidationError};

use super::metrics::MetricsEngine;

/// Fresh metrics produced right after an execution, with the prior
/// snapshot for threshold-crossing checks.
#[derive(Debug, Clone)]
pub struct MetricsUpdate {
    pub current: PerformanceMetrics,
    pub previous: Option<PerformanceMetrics>,
}

/// Result of one attempted action
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub trade: Trade,
    pub success: bool,
    pub error: Option<String>,
    /// Present on success only
    pub metrics: Option<MetricsUpdate>,
}

/// Quoted context assembled during validation
struct ValidatedOrder {
    price: Decimal,
    existing: Option<Position>,
}

pub struct TradeExecutor {
    store: Arc<dyn LedgerStore>,
    metrics: MetricsEngine,
    risk: RiskConfig,
    execution: ExecutionConfig,
}

impl TradeExecutor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        metrics: MetricsEngine,
        risk: RiskConfig,
        execution: ExecutionConfig,
    ) -> Self {
        Self {
            store,
            metrics,
            risk,
            execution,
        }
    }

    /// Validate and apply one canonical action. HOLD is never executed
    /// and returns `None`. Every non-HOLD attempt leaves exactly one
    /// trade record, pending first, then executed or failed.
    pub async fn execute(
        &self,
        agent_id: Uuid,
        action: &CanonicalAction,
    ) -> Result<Option<ExecutionOutcome>> {
        if action.is_hold() {
            return Ok(None);
        }

        // The decision engine guarantees these for non-HOLD actions;
        // absence here is a bug, not a rejected trade.
        let market_id = action
            .market_id
            .as_deref()
            .ok_or_else(|| AgoraError::Validation("non-HOLD action without market".to_string()))?;
        let side = action
            .side
            .ok_or_else(|| AgoraError::Validation("non-HOLD action without side".to_string()))?;

        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| AgoraError::AgentNotFound(agent_id.to_string()))?;

        let mut trade = Trade::pending(
            agent_id,
            market_id,
            action.action,
            side,
            action.size_usd,
            &action.reasoning,
        );
        self.store.insert_trade(&trade).await?;

        match self.validate(&agent, market_id, side, action).await? {
            Err(reason) => {
                let message = reason.to_string();
                warn!(
                    agent = %agent.name,
                    market = market_id,
                    action = %action.action,
                    "trade rejected: {}",
                    message
                );
                self.store
                    .finalize_trade(trade.id, TradeStatus::Failed, None, None, Some(&message))
                    .await?;
                trade.mark_failed(&message);
                Ok(Some(ExecutionOutcome {
                    trade,
                    success: false,
                    error: Some(message),
                    metrics: None,
                }))
            }
            Ok(order) => {
                if self.execution.live {
                    // Live routing is an extension point; until a venue
                    // adapter exists every fill is simulated.
                    if self.execution.venue.is_some() {
                        warn!("live execution configured but no venue adapter is wired; simulating");
                    } else {
                        debug!("live execution requested without venue credentials; simulating");
                    }
                }

                self.apply(&agent, &mut trade, side, action, &order).await?;

                let previous = self.store.latest_metrics(agent.id).await?;
                let current = self.metrics.recompute(agent.id).await?;

                Ok(Some(ExecutionOutcome {
                    trade,
                    success: true,
                    error: None,
                    metrics: Some(MetricsUpdate { current, previous }),
                }))
            }
        }
    }

    /// Ordered validation chain. Store errors propagate; rule failures
    /// come back as `Err` in the inner result.
    async fn validate(
        &self,
        agent: &Agent,
        market_id: &str,
        side: MarketSide,
        action: &CanonicalAction,
    ) -> Result<std::result::Result<ValidatedOrder, ValidationError>> {
        // Market must exist and still be open
        let market = match self.store.get_market(market_id).await? {
            Some(market) => market,
            None => {
                return Ok(Err(ValidationError::UnknownMarket {
                    market_id: market_id.to_string(),
                }))
            }
        };
        if market.resolved {
            return Ok(Err(ValidationError::MarketResolved {
                market_id: market_id.to_string(),
            }));
        }

        let price = market.price(side);
        if price <= Decimal::ZERO {
            return Ok(Err(ValidationError::PriceUnavailable {
                side: side.to_string(),
            }));
        }

        // BUY cannot exceed what the agent holds
        if action.action == TradeAction::Buy && action.size_usd > agent.current_capital {
            return Ok(Err(ValidationError::InsufficientCapital {
                requested: action.size_usd,
                available: agent.current_capital,
            }));
        }

        // Fixed cap against initial capital, independent of the
        // fluctuating balance
        let cap = agent.trade_cap(self.risk.max_trade_fraction);
        if action.size_usd > cap {
            return Ok(Err(ValidationError::ExceedsTradeLimit {
                requested: action.size_usd,
                limit: cap,
            }));
        }

        if market.liquidity < self.risk.min_liquidity_usd {
            return Ok(Err(ValidationError::InsufficientLiquidity {
                liquidity: market.liquidity,
                minimum: self.risk.min_liquidity_usd,
            }));
        }

        let existing = self.store.get_position(agent.id, market_id, side).await?;

        // SELL needs enough position value at the current price
        if action.action == TradeAction::Sell {
            let held = existing
                .as_ref()
                .map(|p| p.shares * price)
                .unwrap_or(Decimal::ZERO);
            if held < action.size_usd {
                return Ok(Err(ValidationError::InsufficientPosition {
                    held,
                    requested: action.size_usd,
                }));
            }
        }

        // BUY must not cross the agent's price limit
        if action.action == TradeAction::Buy && price > action.max_price {
            return Ok(Err(ValidationError::PriceAboveLimit {
                price,
                max_price: action.max_price,
            }));
        }

        Ok(Ok(ValidatedOrder { price, existing }))
    }

    /// Apply a validated order to the ledger (simulation fill).
    async fn apply(
        &self,
        agent: &Agent,
        trade: &mut Trade,
        side: MarketSide,
        action: &CanonicalAction,
        order: &ValidatedOrder,
    ) -> Result<()> {
        let price = order.price;
        let shares = action.size_usd / price;
        let market_id = trade.market_id.clone();

        match action.action {
            TradeAction::Buy => {
                let new_capital = agent.current_capital - action.size_usd;
                self.store.set_agent_capital(agent.id, new_capital).await?;

                match order.existing.clone() {
                    Some(mut position) => {
                        position.add_buy(action.size_usd, price);
                        self.store.upsert_position(&position).await?;
                    }
                    None => {
                        let position = Position::open(agent.id, &market_id, side, shares, price);
                        self.store.upsert_position(&position).await?;
                    }
                }
            }
            TradeAction::Sell => {
                let new_capital = agent.current_capital + action.size_usd;
                self.store.set_agent_capital(agent.id, new_capital).await?;

                // Validation guarantees a position with enough value
                let mut position = order.existing.clone().ok_or_else(|| {
                    AgoraError::Internal("validated SELL without position".to_string())
                })?;
                let remaining = position.reduce(action.size_usd, price);
                if position.is_dust() {
                    self.store.delete_position(position.id).await?;
                    debug!(market = market_id.as_str(), "position fully liquidated");
                } else {
                    self.store.upsert_position(&position).await?;
                    debug!(
                        market = market_id.as_str(),
                        remaining = %remaining,
                        "position reduced"
                    );
                }
            }
            TradeAction::Hold => unreachable!("hold actions never reach apply"),
        }

        self.store
            .finalize_trade(
                trade.id,
                TradeStatus::Executed,
                Some(price),
                Some(shares),
                None,
            )
            .await?;
        trade.mark_executed(price, shares);

        info!(
            agent = %agent.name,
            market = market_id.as_str(),
            action = %action.action,
            side = %side,
            size = %action.size_usd,
            price = %price,
            shares = %shares,
            "trade executed"
        );
        Ok(())
    }

    /// Refresh current_value and unrealized_pnl of every open position
    /// against latest market prices. Runs once per cycle after all
    /// trades are applied.
    pub async fn revalue_open_positions(&self) -> Result<()> {
        let positions = self.store.list_open_positions().await?;
        let mut refreshed = 0usize;

        for mut position in positions {
            let Some(market) = self.store.get_market(&position.market_id).await? else {
                debug!(market = position.market_id.as_str(), "no market for position; skipping");
                continue;
            };
            let price = market.price(position.side);
            if price <= Decimal::ZERO {
                continue;
            }
            position.revalue(price);
            self.store.upsert_position(&position).await?;
            refreshed += 1;
        }

        debug!(count = refreshed, "open positions revalued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryLedger;
    use crate::domain::NewAgent;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn buy(market: &str, size: Decimal, max_price: Decimal) -> CanonicalAction {
        CanonicalAction {
            action: TradeAction::Buy,
            market_id: Some(market.to_string()),
            side: Some(MarketSide::Yes),
            size_usd: size,
            max_price,
            reasoning: "test".to_string(),
        }
    }

    fn sell(market: &str, size: Decimal) -> CanonicalAction {
        CanonicalAction {
            action: TradeAction::Sell,
            market_id: Some(market.to_string()),
            side: Some(MarketSide::Yes),
            size_usd: size,
            max_price: Decimal::ONE,
            reasoning: "test".to_string(),
        }
    }

    async fn setup() -> (Arc<MemoryLedger>, TradeExecutor, Uuid) {
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

        store
            .upsert_market(&Market {
                id: "m1".to_string(),
                question: "Will it rain?".to_string(),
                category: "weather".to_string(),
                yes_price: dec!(0.40),
                no_price: dec!(0.60),
                liquidity: dec!(5000),
                resolved: false,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let executor = TradeExecutor::new(
            store.clone(),
            MetricsEngine::new(store.clone()),
            RiskConfig::default(),
            ExecutionConfig::default(),
        );
        (store, executor, agent.id)
    }

    #[tokio::test]
    async fn test_buy_fills_and_debits_capital() {
        let (store, executor, agent_id) = setup().await;

        let outcome = executor
            .execute(agent_id, &buy("m1", dec!(50), dec!(0.50)))
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.trade.status, TradeStatus::Executed);
        assert_eq!(outcome.trade.shares, Some(dec!(125)));

        let agent = store.get_agent(agent_id).await.unwrap().unwrap();
        assert_eq!(agent.current_capital, dec!(450));

        let position = store
            .get_position(agent_id, "m1", MarketSide::Yes)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.shares, dec!(125));
        assert_eq!(position.entry_price, dec!(0.40));

        // Post-trade metrics trigger fired
        assert!(store.latest_metrics(agent_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_buy_over_cap_rejected_without_mutation() {
        let (store, executor, agent_id) = setup().await;

        // Cap is 10% of 500 = $50
        let outcome = executor
            .execute(agent_id, &buy("m1", dec!(60), dec!(0.50)))
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.trade.status, TradeStatus::Failed);
        assert!(outcome.error.unwrap().contains("exceeds limit"));

        let agent = store.get_agent(agent_id).await.unwrap().unwrap();
        assert_eq!(agent.current_capital, dec!(500));
        assert!(store
            .get_position(agent_id, "m1", MarketSide::Yes)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_buy_over_capital_rejected() {
        let (store, executor, agent_id) = setup().await;
        // Capital below the $20 request; the capital check trips before
        // the cap check ever runs
        store.set_agent_capital(agent_id, dec!(10)).await.unwrap();

        let outcome = executor
            .execute(agent_id, &buy("m1", dec!(20), dec!(0.50)))
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Insufficient capital"));
        let agent = store.get_agent(agent_id).await.unwrap().unwrap();
        assert_eq!(agent.current_capital, dec!(10));
    }

    #[tokio::test]
    async fn test_buy_above_max_price_rejected() {
        let (store, executor, agent_id) = setup().await;

        let outcome = executor
            .execute(agent_id, &buy("m1", dec!(50), dec!(0.30)))
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("exceeds max price"));
        let agent = store.get_agent(agent_id).await.unwrap().unwrap();
        assert_eq!(agent.current_capital, dec!(500));
    }

    #[tokio::test]
    async fn test_low_liquidity_rejected() {
        let (store, executor, agent_id) = setup().await;
        store
            .upsert_market(&Market {
                id: "thin".to_string(),
                question: "q".to_string(),
                category: String::new(),
                yes_price: dec!(0.50),
                no_price: dec!(0.50),
                liquidity: dec!(100),
                resolved: false,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let outcome = executor
            .execute(agent_id, &buy("thin", dec!(10), dec!(0.90)))
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Insufficient liquidity"));
    }

    #[tokio::test]
    async fn test_resolved_market_rejected() {
        let (store, executor, agent_id) = setup().await;
        store
            .upsert_market(&Market {
                id: "done".to_string(),
                question: "q".to_string(),
                category: String::new(),
                yes_price: dec!(1),
                no_price: dec!(0),
                liquidity: dec!(5000),
                resolved: true,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let outcome = executor
            .execute(agent_id, &buy("done", dec!(10), dec!(1)))
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("resolved"));
    }

    #[tokio::test]
    async fn test_sell_without_position_rejected() {
        let (_store, executor, agent_id) = setup().await;

        let outcome = executor
            .execute(agent_id, &sell("m1", dec!(10)))
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Insufficient position"));
    }

    #[tokio::test]
    async fn test_full_liquidation_removes_position() {
        let (store, executor, agent_id) = setup().await;

        executor
            .execute(agent_id, &buy("m1", dec!(50), dec!(0.50)))
            .await
            .unwrap();

        // Price moved to 0.50; sell the full 125 shares = $62.50
        store
            .upsert_market(&Market {
                id: "m1".to_string(),
                question: "Will it rain?".to_string(),
                category: "weather".to_string(),
                yes_price: dec!(0.50),
                no_price: dec!(0.50),
                liquidity: dec!(5000),
                resolved: false,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let outcome = executor
            .execute(agent_id, &sell("m1", dec!(62.50)))
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.success);
        let agent = store.get_agent(agent_id).await.unwrap().unwrap();
        assert_eq!(agent.current_capital, dec!(512.50));
        assert!(store
            .get_position(agent_id, "m1", MarketSide::Yes)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_second_buy_weighted_average() {
        let (store, executor, agent_id) = setup().await;

        executor
            .execute(agent_id, &buy("m1", dec!(40), dec!(0.50)))
            .await
            .unwrap();

        // Price rises to 0.50, buy $30 more
        store
            .upsert_market(&Market {
                id: "m1".to_string(),
                question: "Will it rain?".to_string(),
                category: "weather".to_string(),
                yes_price: dec!(0.50),
                no_price: dec!(0.50),
                liquidity: dec!(5000),
                resolved: false,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        executor
            .execute(agent_id, &buy("m1", dec!(30), dec!(0.60)))
            .await
            .unwrap();

        let position = store
            .get_position(agent_id, "m1", MarketSide::Yes)
            .await
            .unwrap()
            .unwrap();

        // 100 shares @ 0.40 + 60 shares @ 0.50 -> 160 shares
        assert_eq!(position.shares, dec!(160));
        // (100 * 0.40 + 30) / 160 = 0.4375
        assert_eq!(position.entry_price, dec!(0.4375));
    }

    #[tokio::test]
    async fn test_revalue_refreshes_unrealized_pnl() {
        let (store, executor, agent_id) = setup().await;

        executor
            .execute(agent_id, &buy("m1", dec!(50), dec!(0.50)))
            .await
            .unwrap();

        store
            .upsert_market(&Market {
                id: "m1".to_string(),
                question: "Will it rain?".to_string(),
                category: "weather".to_string(),
                yes_price: dec!(0.50),
                no_price: dec!(0.50),
                liquidity: dec!(5000),
                resolved: false,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        executor.revalue_open_positions().await.unwrap();

        let position = store
            .get_position(agent_id, "m1", MarketSide::Yes)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.current_value, dec!(62.500));
        assert_eq!(position.unrealized_pnl, dec!(12.500));
    }

    #[tokio::test]
    async fn test_hold_is_not_executed() {
        let (_store, executor, agent_id) = setup().await;
        let outcome = executor
            .execute(agent_id, &CanonicalAction::hold("wait"))
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
