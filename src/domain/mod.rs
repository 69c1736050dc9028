//! Core entity types shared across the engine.
//!
//! Monetary fields are `rust_decimal::Decimal` throughout; binary floats
//! appear only in the statistical ratios that are not ledger state.

pub mod agent;
pub mod alert;
pub mod cycle;
pub mod market;
pub mod metrics;
pub mod position;
pub mod trade;

pub use agent::{Agent, NewAgent};
pub use alert::{Alert, AlertSeverity};
pub use cycle::{CycleStats, CycleStatus, TickCycle};
pub use market::{Market, MarketSide};
pub use metrics::PerformanceMetrics;
pub use position::{Position, POSITION_EPSILON};
pub use trade::{CanonicalAction, Trade, TradeAction, TradeStatus};
