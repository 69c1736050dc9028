//! Fire-and-forget event bus toward the presentation layer.
//!
//! The engine publishes into a tokio broadcast channel; whoever renders a
//! dashboard subscribes. No acknowledgment flows back into the engine.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::{Agent, Alert, CycleStats, CycleStatus, PerformanceMetrics, Trade};

/// One agent plus its latest performance snapshot, carried on
/// cycle-complete events.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub agent: Agent,
    pub metrics: Option<PerformanceMetrics>,
}

/// Events emitted by the engine
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    CycleStarted {
        cycle_number: i64,
    },
    CycleCompleted {
        cycle_number: i64,
        status: CycleStatus,
        stats: CycleStats,
        agents: Vec<AgentSummary>,
    },
    TradeExecuted {
        trade: Trade,
    },
    AlertRaised {
        alert: Alert,
    },
    AgentUpdated {
        agent: Agent,
    },
}

impl EngineEvent {
    /// Short tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::CycleStarted { .. } => "cycle_started",
            EngineEvent::CycleCompleted { .. } => "cycle_completed",
            EngineEvent::TradeExecuted { .. } => "trade_executed",
            EngineEvent::AlertRaised { .. } => "alert_raised",
            EngineEvent::AgentUpdated { .. } => "agent_updated",
        }
    }
}

/// Broadcast-backed publish/subscribe handle
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Dropped silently when nobody listens.
    pub fn publish(&self, event: EngineEvent) {
        debug!(kind = event.kind(), "publishing event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(EngineEvent::CycleStarted { cycle_number: 1 });

        match rx.recv().await.unwrap() {
            EngineEvent::CycleStarted { cycle_number } => assert_eq!(cycle_number, 1),
            other => panic!("unexpected event: {}", other.kind()),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new(8);
        bus.publish(EngineEvent::CycleStarted { cycle_number: 1 });
    }
}
