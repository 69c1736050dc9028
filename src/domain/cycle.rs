use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal outcome of one orchestration run.
///
/// running -> completed (normal) or running -> failed (exception path);
/// terminal states are never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Running,
    Completed,
    Failed,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Running => "running",
            CycleStatus::Completed => "completed",
            CycleStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CycleStatus::Running)
    }
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for CycleStatus {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "running" => Ok(CycleStatus::Running),
            "completed" => Ok(CycleStatus::Completed),
            "failed" => Ok(CycleStatus::Failed),
            other => Err(format!("unknown cycle status: {other}")),
        }
    }
}

/// Counters accumulated while a cycle runs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CycleStats {
    pub markets_processed: u32,
    pub trades_executed: u32,
    pub errors: u32,
}

/// One orchestration run across all agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickCycle {
    pub id: Uuid,
    /// Monotonic, persisted across restarts
    pub cycle_number: i64,
    pub status: CycleStatus,
    pub stats: CycleStats,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TickCycle {
    pub fn started(cycle_number: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle_number,
            status: CycleStatus::Running,
            stats: CycleStats::default(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cycle_is_running() {
        let cycle = TickCycle::started(7);
        assert_eq!(cycle.status, CycleStatus::Running);
        assert!(!cycle.status.is_terminal());
        assert!(cycle.completed_at.is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(CycleStatus::Completed.is_terminal());
        assert!(CycleStatus::Failed.is_terminal());
    }
}
