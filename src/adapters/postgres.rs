use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    Agent, Alert, AlertSeverity, CycleStats, CycleStatus, Market, MarketSide, NewAgent,
    PerformanceMetrics, Position, TickCycle, Trade, TradeAction, TradeStatus,
};
use crate::error::{AgoraError, Result};

use super::LedgerStore;

/// PostgreSQL-backed ledger store
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Connect a new pool
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Reuse an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_tag<T>(value: &str) -> Result<T>
where
    T: for<'a> TryFrom<&'a str, Error = String>,
{
    T::try_from(value).map_err(AgoraError::Internal)
}

fn agent_from_row(row: &PgRow) -> Result<Agent> {
    Ok(Agent {
        id: row.get("id"),
        name: row.get("name"),
        model: row.get("model"),
        strategy: row.get("strategy"),
        initial_capital: row.get("initial_capital"),
        current_capital: row.get("current_capital"),
        active: row.get("active"),
        max_trade_fraction: row.get("max_trade_fraction"),
        created_at: row.get("created_at"),
    })
}

fn market_from_row(row: &PgRow) -> Market {
    Market {
        id: row.get("id"),
        question: row.get("question"),
        category: row.get("category"),
        yes_price: row.get("yes_price"),
        no_price: row.get("no_price"),
        liquidity: row.get("liquidity"),
        resolved: row.get("resolved"),
        updated_at: row.get("updated_at"),
    }
}

fn trade_from_row(row: &PgRow) -> Result<Trade> {
    Ok(Trade {
        id: row.get("id"),
        agent_id: row.get("agent_id"),
        market_id: row.get("market_id"),
        action: parse_tag::<TradeAction>(row.get::<String, _>("action").as_str())?,
        side: parse_tag::<MarketSide>(row.get::<String, _>("side").as_str())?,
        size_usd: row.get("size_usd"),
        price: row.get("price"),
        shares: row.get("shares"),
        reasoning: row.get("reasoning"),
        status: parse_tag::<TradeStatus>(row.get::<String, _>("status").as_str())?,
        error: row.get("error"),
        created_at: row.get("created_at"),
        executed_at: row.get("executed_at"),
    })
}

fn position_from_row(row: &PgRow) -> Result<Position> {
    Ok(Position {
        id: row.get("id"),
        agent_id: row.get("agent_id"),
        market_id: row.get("market_id"),
        side: parse_tag::<MarketSide>(row.get::<String, _>("side").as_str())?,
        shares: row.get("shares"),
        entry_price: row.get("entry_price"),
        current_value: row.get("current_value"),
        unrealized_pnl: row.get("unrealized_pnl"),
        updated_at: row.get("updated_at"),
    })
}

fn metrics_from_row(row: &PgRow) -> PerformanceMetrics {
    PerformanceMetrics {
        id: row.get("id"),
        agent_id: row.get("agent_id"),
        net_pnl: row.get("net_pnl"),
        win_rate: row.get("win_rate"),
        sharpe_ratio: row.get("sharpe_ratio"),
        max_drawdown: row.get("max_drawdown"),
        total_trades: row.get::<i32, _>("total_trades") as u32,
        open_positions: row.get::<i32, _>("open_positions") as u32,
        turnover: row.get("turnover"),
        created_at: row.get("created_at"),
    }
}

fn cycle_from_row(row: &PgRow) -> Result<TickCycle> {
    Ok(TickCycle {
        id: row.get("id"),
        cycle_number: row.get("cycle_number"),
        status: parse_tag::<CycleStatus>(row.get::<String, _>("status").as_str())?,
        stats: CycleStats {
            markets_processed: row.get::<i32, _>("markets_processed") as u32,
            trades_executed: row.get::<i32, _>("trades_executed") as u32,
            errors: row.get::<i32, _>("errors") as u32,
        },
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    })
}

fn alert_from_row(row: &PgRow) -> Result<Alert> {
    Ok(Alert {
        id: row.get("id"),
        kind: row.get("kind"),
        severity: parse_tag::<AlertSeverity>(row.get::<String, _>("severity").as_str())?,
        title: row.get("title"),
        message: row.get("message"),
        agent_id: row.get("agent_id"),
        trade_id: row.get("trade_id"),
        market_id: row.get("market_id"),
        is_read: row.get("is_read"),
        is_dismissed: row.get("is_dismissed"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    #[instrument(skip(self, agent), fields(name = %agent.name))]
    async fn upsert_agent(&self, agent: NewAgent) -> Result<Agent> {
        // Insert-if-absent; an existing row wins so restarts never
        // reset a live ledger.
        let fresh = agent.into_agent();
        sqlx::query(
            r#"
            INSERT INTO agents
                (id, name, model, strategy, initial_capital, current_capital,
                 max_trade_fraction, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(fresh.id)
        .bind(&fresh.name)
        .bind(&fresh.model)
        .bind(&fresh.strategy)
        .bind(fresh.initial_capital)
        .bind(fresh.current_capital)
        .bind(fresh.max_trade_fraction)
        .bind(fresh.active)
        .bind(fresh.created_at)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT * FROM agents WHERE name = $1")
            .bind(&fresh.name)
            .fetch_one(&self.pool)
            .await?;
        agent_from_row(&row)
    }

    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(agent_from_row).transpose()
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        let rows = sqlx::query("SELECT * FROM agents ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(agent_from_row).collect()
    }

    async fn list_active_agents(&self) -> Result<Vec<Agent>> {
        let rows = sqlx::query("SELECT * FROM agents WHERE active ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(agent_from_row).collect()
    }

    async fn set_agent_capital(&self, id: Uuid, capital: Decimal) -> Result<()> {
        let result = sqlx::query("UPDATE agents SET current_capital = $2 WHERE id = $1")
            .bind(id)
            .bind(capital)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AgoraError::AgentNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn upsert_market(&self, market: &Market) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO markets
                (id, question, category, yes_price, no_price, liquidity, resolved, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                question = EXCLUDED.question,
                category = EXCLUDED.category,
                yes_price = EXCLUDED.yes_price,
                no_price = EXCLUDED.no_price,
                liquidity = EXCLUDED.liquidity,
                resolved = EXCLUDED.resolved,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&market.id)
        .bind(&market.question)
        .bind(&market.category)
        .bind(market.yes_price)
        .bind(market.no_price)
        .bind(market.liquidity)
        .bind(market.resolved)
        .bind(market.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_market(&self, id: &str) -> Result<Option<Market>> {
        let row = sqlx::query("SELECT * FROM markets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(market_from_row))
    }

    async fn list_unresolved_markets(&self) -> Result<Vec<Market>> {
        let rows = sqlx::query("SELECT * FROM markets WHERE NOT resolved ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(market_from_row).collect())
    }

    async fn insert_trade(&self, trade: &Trade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades
                (id, agent_id, market_id, action, side, size_usd, price, shares,
                 reasoning, status, error, created_at, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(trade.id)
        .bind(trade.agent_id)
        .bind(&trade.market_id)
        .bind(trade.action.as_str())
        .bind(trade.side.as_str())
        .bind(trade.size_usd)
        .bind(trade.price)
        .bind(trade.shares)
        .bind(&trade.reasoning)
        .bind(trade.status.as_str())
        .bind(&trade.error)
        .bind(trade.created_at)
        .bind(trade.executed_at)
        .execute(&self.pool)
        .await?;
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
        // Only a pending row may transition; terminal rows stay put.
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET status = $2, price = $3, shares = $4, error = $5, executed_at = $6
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(price)
        .bind(shares)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AgoraError::Internal(format!(
                "trade {id} is not pending; refusing to finalize twice"
            )));
        }
        Ok(())
    }

    async fn list_executed_trades(&self, agent_id: Uuid) -> Result<Vec<Trade>> {
        let rows = sqlx::query(
            "SELECT * FROM trades WHERE agent_id = $1 AND status = 'executed' ORDER BY created_at",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(trade_from_row).collect()
    }

    async fn get_position(
        &self,
        agent_id: Uuid,
        market_id: &str,
        side: MarketSide,
    ) -> Result<Option<Position>> {
        let row = sqlx::query(
            "SELECT * FROM positions WHERE agent_id = $1 AND market_id = $2 AND side = $3",
        )
        .bind(agent_id)
        .bind(market_id)
        .bind(side.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(position_from_row).transpose()
    }

    async fn upsert_position(&self, position: &Position) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions
                (id, agent_id, market_id, side, shares, entry_price,
                 current_value, unrealized_pnl, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (agent_id, market_id, side) DO UPDATE SET
                shares = EXCLUDED.shares,
                entry_price = EXCLUDED.entry_price,
                current_value = EXCLUDED.current_value,
                unrealized_pnl = EXCLUDED.unrealized_pnl,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(position.id)
        .bind(position.agent_id)
        .bind(&position.market_id)
        .bind(position.side.as_str())
        .bind(position.shares)
        .bind(position.entry_price)
        .bind(position.current_value)
        .bind(position.unrealized_pnl)
        .bind(position.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_position(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM positions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_agent_positions(&self, agent_id: Uuid) -> Result<Vec<Position>> {
        let rows = sqlx::query("SELECT * FROM positions WHERE agent_id = $1 ORDER BY market_id")
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(position_from_row).collect()
    }

    async fn list_open_positions(&self) -> Result<Vec<Position>> {
        let rows = sqlx::query("SELECT * FROM positions ORDER BY market_id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(position_from_row).collect()
    }

    async fn insert_metrics(&self, metrics: &PerformanceMetrics) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO performance_metrics
                (id, agent_id, net_pnl, win_rate, sharpe_ratio, max_drawdown,
                 total_trades, open_positions, turnover, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(metrics.id)
        .bind(metrics.agent_id)
        .bind(metrics.net_pnl)
        .bind(metrics.win_rate)
        .bind(metrics.sharpe_ratio)
        .bind(metrics.max_drawdown)
        .bind(metrics.total_trades as i32)
        .bind(metrics.open_positions as i32)
        .bind(metrics.turnover)
        .bind(metrics.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_metrics(&self, agent_id: Uuid) -> Result<Option<PerformanceMetrics>> {
        let row = sqlx::query(
            "SELECT * FROM performance_metrics WHERE agent_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(metrics_from_row))
    }

    async fn last_cycle_number(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COALESCE(MAX(cycle_number), 0) AS n FROM tick_cycles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    async fn last_cycle(&self) -> Result<Option<TickCycle>> {
        let row = sqlx::query("SELECT * FROM tick_cycles ORDER BY cycle_number DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(cycle_from_row).transpose()
    }

    async fn insert_cycle(&self, cycle: &TickCycle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tick_cycles
                (id, cycle_number, status, markets_processed, trades_executed,
                 errors, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(cycle.id)
        .bind(cycle.cycle_number)
        .bind(cycle.status.as_str())
        .bind(cycle.stats.markets_processed as i32)
        .bind(cycle.stats.trades_executed as i32)
        .bind(cycle.stats.errors as i32)
        .bind(cycle.started_at)
        .bind(cycle.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finalize_cycle(&self, id: Uuid, status: CycleStatus, stats: CycleStats) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tick_cycles
            SET status = $2, markets_processed = $3, trades_executed = $4,
                errors = $5, completed_at = $6
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(stats.markets_processed as i32)
        .bind(stats.trades_executed as i32)
        .bind(stats.errors as i32)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AgoraError::Internal(format!(
                "cycle {id} is not running; terminal states are final"
            )));
        }
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts
                (id, kind, severity, title, message, agent_id, trade_id, market_id,
                 is_read, is_dismissed, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(alert.id)
        .bind(&alert.kind)
        .bind(alert.severity.as_str())
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(alert.agent_id)
        .bind(alert.trade_id)
        .bind(&alert.market_id)
        .bind(alert.is_read)
        .bind(alert.is_dismissed)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_alerts(&self, unread_only: bool) -> Result<Vec<Alert>> {
        let rows = sqlx::query(
            "SELECT * FROM alerts WHERE NOT is_read OR NOT $1 ORDER BY created_at DESC",
        )
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(alert_from_row).collect()
    }

    async fn mark_alert_read(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE alerts SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn dismiss_alert(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE alerts SET is_dismissed = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
