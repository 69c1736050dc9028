//! The trading engine: decision solicitation, trade execution against
//! ledger invariants, performance recomputation, alerting, and the cycle
//! orchestrator that drives them all on a fixed cadence.

pub mod alerts;
pub mod decision;
pub mod executor;
pub mod metrics;
pub mod orchestrator;

pub use alerts::AlertEngine;
pub use decision::DecisionEngine;
pub use executor::{ExecutionOutcome, MetricsUpdate, TradeExecutor};
pub use metrics::{MetricsEngine, ASSUMED_VOLATILITY};
pub use orchestrator::CycleOrchestrator;
