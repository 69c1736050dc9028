use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An independent decision-making agent with its own capital ledger.
///
/// Created once at startup (idempotent by name), `current_capital` is
/// mutated only by the trade executor, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    /// Unique roster name
    pub name: String,
    /// Decision provider registry key
    pub model: String,
    /// Free-text strategy brief embedded in every decision prompt
    pub strategy: String,
    pub initial_capital: Decimal,
    pub current_capital: Decimal,
    pub active: bool,
    /// Per-agent override of the global per-trade cap fraction
    pub max_trade_fraction: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Per-trade size cap in USD, fixed against initial capital
    pub fn trade_cap(&self, default_fraction: Decimal) -> Decimal {
        let fraction = self.max_trade_fraction.unwrap_or(default_fraction);
        self.initial_capital * fraction
    }
}

/// Insert payload for the idempotent startup upsert
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub name: String,
    pub model: String,
    pub strategy: String,
    pub initial_capital: Decimal,
    pub active: bool,
    pub max_trade_fraction: Option<Decimal>,
}

impl NewAgent {
    pub fn into_agent(self) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: self.name,
            model: self.model,
            strategy: self.strategy,
            initial_capital: self.initial_capital,
            current_capital: self.initial_capital,
            active: self.active,
            max_trade_fraction: self.max_trade_fraction,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_cap_uses_initial_capital() {
        let mut agent = NewAgent {
            name: "a".to_string(),
            model: "m".to_string(),
            strategy: String::new(),
            initial_capital: dec!(500),
            active: true,
            max_trade_fraction: None,
        }
        .into_agent();

        // Cap stays fixed even after capital fluctuates
        agent.current_capital = dec!(900);
        assert_eq!(agent.trade_cap(dec!(0.10)), dec!(50));
    }

    #[test]
    fn test_trade_cap_override() {
        let agent = NewAgent {
            name: "a".to_string(),
            model: "m".to_string(),
            strategy: String::new(),
            initial_capital: dec!(500),
            active: true,
            max_trade_fraction: Some(dec!(0.20)),
        }
        .into_agent();

        assert_eq!(agent.trade_cap(dec!(0.10)), dec!(100));
    }
}
