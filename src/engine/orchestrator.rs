//! Cycle orchestrator: owns the scheduling loop and drives one trading
//! cycle at a time across the whole agent fleet.
//!
//! A cycle is a single logical unit of work: intel snapshot, one
//! decision per active agent, execution of every non-HOLD action,
//! position revaluation, then cycle bookkeeping. Per-agent and
//! per-trade failures are contained; only persistence failures abort
//! the cycle, and nothing escapes into the scheduler loop.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::adapters::LedgerStore;
use crate::config::AgentSpec;
use crate::domain::{CycleStats, CycleStatus, NewAgent, TickCycle};
use crate::error::Result;
use crate::events::{AgentSummary, EngineEvent, EventBus};
use crate::intel::{format_brief, IntelProvider, IntelSnapshot};

use super::alerts::AlertEngine;
use super::decision::DecisionEngine;
use super::executor::TradeExecutor;

struct Inner {
    store: Arc<dyn LedgerStore>,
    intel: Arc<dyn IntelProvider>,
    decisions: DecisionEngine,
    executor: TradeExecutor,
    alerts: AlertEngine,
    events: EventBus,
    roster: Vec<AgentSpec>,
    interval: Duration,
    running: AtomicBool,
    cycle_number: AtomicI64,
    /// In-flight guard: a manual trigger racing the timer is coalesced,
    /// never interleaved against the same ledger rows.
    cycle_lock: Mutex<()>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

/// Handle to the orchestrator. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct CycleOrchestrator {
    inner: Arc<Inner>,
}

impl CycleOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        intel: Arc<dyn IntelProvider>,
        decisions: DecisionEngine,
        executor: TradeExecutor,
        alerts: AlertEngine,
        events: EventBus,
        roster: Vec<AgentSpec>,
        interval_secs: u64,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                intel,
                decisions,
                executor,
                alerts,
                events,
                roster,
                interval: Duration::from_secs(interval_secs),
                running: AtomicBool::new(false),
                cycle_number: AtomicI64::new(0),
                cycle_lock: Mutex::new(()),
                stop_tx: Mutex::new(None),
            }),
        }
    }

    /// Resume the cycle counter, ensure the roster exists, run one cycle
    /// immediately, then arm the periodic timer. No-op with a warning if
    /// already running.
    pub async fn start(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("orchestrator already running; start ignored");
            return Ok(());
        }

        match self.start_inner().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.inner.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn start_inner(&self) -> Result<()> {
        let last = self.inner.store.last_cycle_number().await?;
        self.inner.cycle_number.store(last, Ordering::SeqCst);
        self.inner.ensure_agents().await?;
        info!(
            resumed_from = last,
            interval_secs = self.inner.interval.as_secs(),
            "orchestrator started"
        );

        // First cycle fires immediately, before the timer arms
        self.inner.run_cycle_guarded().await;

        let (tx, rx) = watch::channel(false);
        *self.inner.stop_tx.lock().await = Some(tx);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            timer_loop(inner, rx).await;
        });
        Ok(())
    }

    /// Disarm the timer. Idempotent; an in-flight cycle always runs to
    /// completion or failure.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            debug!("orchestrator already stopped");
            return;
        }
        if let Some(tx) = self.inner.stop_tx.lock().await.take() {
            let _ = tx.send(true);
        }
        info!("orchestrator stopped; future cycles disarmed");
    }

    /// Run one cycle now. Starts the orchestrator if it is not running;
    /// otherwise the extra cycle is independent of the timer phase.
    pub async fn trigger_cycle(&self) -> Result<()> {
        if !self.is_active() {
            return self.start().await;
        }
        info!("manual cycle trigger");
        self.inner.run_cycle_guarded().await;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn current_cycle_number(&self) -> i64 {
        self.inner.cycle_number.load(Ordering::SeqCst)
    }
}

async fn timer_loop(inner: Arc<Inner>, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = interval(inner.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The initial cycle already ran inside start(); consume the
    // immediate first tick
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                inner.run_cycle_guarded().await;
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }
    info!("scheduler loop exited");
}

impl Inner {
    /// Upsert every configured agent by name (idempotent across
    /// restarts).
    async fn ensure_agents(&self) -> Result<()> {
        for spec in &self.roster {
            let agent = self
                .store
                .upsert_agent(NewAgent {
                    name: spec.name.clone(),
                    model: spec.model.clone(),
                    strategy: spec.strategy.clone(),
                    initial_capital: spec.initial_capital,
                    active: spec.active,
                    max_trade_fraction: spec.max_trade_fraction,
                })
                .await?;
            debug!(agent = %agent.name, "agent ensured");
            self.events.publish(EngineEvent::AgentUpdated { agent });
        }
        Ok(())
    }

    /// Entry point shared by the timer and manual triggers. Nothing may
    /// escape this function; the next scheduled cycle must always fire.
    async fn run_cycle_guarded(&self) {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            warn!("cycle already in flight; trigger coalesced");
            return;
        };

        let number = self.cycle_number.fetch_add(1, Ordering::SeqCst) + 1;
        let cycle = TickCycle::started(number);
        if let Err(e) = self.store.insert_cycle(&cycle).await {
            error!(cycle = number, "failed to open cycle record: {}", e);
            return;
        }
        self.events.publish(EngineEvent::CycleStarted {
            cycle_number: number,
        });
        info!(cycle = number, "cycle started");

        let mut stats = CycleStats::default();
        let status = match self.run_cycle_body(&mut stats).await {
            Ok(()) => CycleStatus::Completed,
            Err(e) => {
                error!(cycle = number, "cycle failed: {}", e);
                stats.errors += 1;
                CycleStatus::Failed
            }
        };

        if let Err(e) = self.store.finalize_cycle(cycle.id, status, stats).await {
            error!(cycle = number, "failed to finalize cycle record: {}", e);
        }
        if let Err(e) = self.alerts.on_cycle_complete(number, status, &stats).await {
            warn!(cycle = number, "cycle alert failed: {}", e);
        }

        let agents = self.agent_summaries().await.unwrap_or_default();
        self.events.publish(EngineEvent::CycleCompleted {
            cycle_number: number,
            status,
            stats,
            agents,
        });
        info!(
            cycle = number,
            status = %status,
            markets = stats.markets_processed,
            trades = stats.trades_executed,
            errors = stats.errors,
            "cycle finished"
        );
    }

    /// The cycle routine proper. Store errors bubble up and fail the
    /// cycle; provider and validation failures only bump the error
    /// count.
    async fn run_cycle_body(&self, stats: &mut CycleStats) -> Result<()> {
        // Intelligence intake; a dead feed degrades the brief, it does
        // not abort the cycle
        let snapshot = match self.intel.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("intelligence snapshot failed: {}", e);
                stats.errors += 1;
                IntelSnapshot::default()
            }
        };
        stats.errors += snapshot.fetch_errors;
        stats.markets_processed = snapshot.markets.len() as u32;

        for market in &snapshot.markets {
            self.store.upsert_market(market).await?;
        }
        let brief = format_brief(&snapshot, Utc::now());

        // One decision per active agent, strictly sequential; one
        // agent's failure never blocks the rest
        let agents = self.store.list_active_agents().await?;
        let mut pending = Vec::new();
        for agent in agents {
            let open_positions = self.store.list_agent_positions(agent.id).await?.len();
            match self.decisions.decide(&agent, open_positions, &brief).await {
                Ok(action) if action.is_hold() => {
                    debug!(agent = %agent.name, "holding");
                }
                Ok(action) => pending.push((agent, action)),
                Err(e) => {
                    warn!(agent = %agent.name, "decision failed: {}", e);
                    stats.errors += 1;
                }
            }
        }

        for (agent, action) in pending {
            let Some(outcome) = self.executor.execute(agent.id, &action).await? else {
                continue;
            };

            if outcome.success {
                stats.trades_executed += 1;
                self.events.publish(EngineEvent::TradeExecuted {
                    trade: outcome.trade.clone(),
                });
                if let Ok(Some(updated)) = self.store.get_agent(agent.id).await {
                    self.events.publish(EngineEvent::AgentUpdated { agent: updated });
                }
            } else {
                stats.errors += 1;
            }

            if let Err(e) = self.alerts.on_trade(&outcome.trade, &agent).await {
                warn!(agent = %agent.name, "trade alert failed: {}", e);
            }
            if let Some(update) = outcome.metrics {
                if let Err(e) = self
                    .alerts
                    .on_performance(&agent, &update.current, update.previous.as_ref())
                    .await
                {
                    warn!(agent = %agent.name, "performance alert failed: {}", e);
                }
            }
        }

        self.executor.revalue_open_positions().await?;
        Ok(())
    }

    async fn agent_summaries(&self) -> Result<Vec<AgentSummary>> {
        let mut summaries = Vec::new();
        for agent in self.store.list_agents().await? {
            let metrics = self.store.latest_metrics(agent.id).await?;
            summaries.push(AgentSummary { agent, metrics });
        }
        Ok(summaries)
    }
}
