pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod intel;
pub mod providers;

pub use adapters::{LedgerStore, MemoryLedger, PostgresLedger};
pub use config::AppConfig;
pub use engine::{
    AlertEngine, CycleOrchestrator, DecisionEngine, ExecutionOutcome, MetricsEngine, TradeExecutor,
};
pub use error::{AgoraError, Result};
pub use events::{AgentSummary, EngineEvent, EventBus};
pub use intel::{HttpIntelProvider, IntelProvider, IntelSnapshot};
pub use providers::{AnthropicProvider, DecisionProvider, OpenAiProvider, ProviderRegistry};
