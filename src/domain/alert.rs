use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert severity tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AlertSeverity {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "info" => Ok(AlertSeverity::Info),
            "warning" => Ok(AlertSeverity::Warning),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(format!("unknown alert severity: {other}")),
        }
    }
}

/// Notification record created by the alert engine. Read/dismiss
/// mutations come from outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    /// Machine-readable category, e.g. "large_trade", "drawdown"
    pub kind: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub agent_id: Option<Uuid>,
    pub trade_id: Option<Uuid>,
    pub market_id: Option<String>,
    pub is_read: bool,
    pub is_dismissed: bool,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: &str, severity: AlertSeverity, title: &str, message: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            severity,
            title: title.to_string(),
            message: message.to_string(),
            agent_id: None,
            trade_id: None,
            market_id: None,
            is_read: false,
            is_dismissed: false,
            created_at: Utc::now(),
        }
    }

    pub fn for_agent(mut self, agent_id: Uuid) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn for_trade(mut self, trade_id: Uuid) -> Self {
        self.trade_id = Some(trade_id);
        self
    }

    pub fn for_market(mut self, market_id: &str) -> Self {
        self.market_id = Some(market_id.to_string());
        self
    }
}
