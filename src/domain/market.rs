use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of a binary market (YES or NO)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketSide {
    Yes,
    No,
}

impl MarketSide {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            MarketSide::Yes => MarketSide::No,
            MarketSide::No => MarketSide::Yes,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSide::Yes => "YES",
            MarketSide::No => "NO",
        }
    }
}

impl std::fmt::Display for MarketSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for MarketSide {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value.to_uppercase().as_str() {
            "YES" => Ok(MarketSide::Yes),
            "NO" => Ok(MarketSide::No),
            other => Err(format!("unknown market side: {other}")),
        }
    }
}

/// A tradable binary market, refreshed every cycle by the intelligence
/// provider and read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// External market identifier
    pub id: String,
    pub question: String,
    pub category: String,
    /// Price of the YES side, in [0, 1]
    pub yes_price: Decimal,
    /// Price of the NO side, in [0, 1]
    pub no_price: Decimal,
    pub liquidity: Decimal,
    pub resolved: bool,
    pub updated_at: DateTime<Utc>,
}

impl Market {
    /// Current execution price on the requested side
    pub fn price(&self, side: MarketSide) -> Decimal {
        match side {
            MarketSide::Yes => self.yes_price,
            MarketSide::No => self.no_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_opposite() {
        assert_eq!(MarketSide::Yes.opposite(), MarketSide::No);
        assert_eq!(MarketSide::No.opposite(), MarketSide::Yes);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(MarketSide::try_from("yes").unwrap(), MarketSide::Yes);
        assert_eq!(MarketSide::try_from("NO").unwrap(), MarketSide::No);
        assert!(MarketSide::try_from("MAYBE").is_err());
    }

    #[test]
    fn test_price_by_side() {
        let market = Market {
            id: "m1".to_string(),
            question: "Will it rain?".to_string(),
            category: "weather".to_string(),
            yes_price: dec!(0.40),
            no_price: dec!(0.60),
            liquidity: dec!(5000),
            resolved: false,
            updated_at: Utc::now(),
        };
        assert_eq!(market.price(MarketSide::Yes), dec!(0.40));
        assert_eq!(market.price(MarketSide::No), dec!(0.60));
    }
}
