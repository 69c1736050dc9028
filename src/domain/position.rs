use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::MarketSide;

/// Positions with fewer shares than this are deleted rather than kept
/// as dust.
pub const POSITION_EPSILON: Decimal = dec!(0.000001);

/// Open exposure of one agent to one market side, tracked at
/// volume-weighted average entry price. At most one row exists per
/// (agent, market, side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub market_id: String,
    pub side: MarketSide,
    pub shares: Decimal,
    pub entry_price: Decimal,
    pub current_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Open a new position from a first BUY
    pub fn open(
        agent_id: Uuid,
        market_id: &str,
        side: MarketSide,
        shares: Decimal,
        entry_price: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            market_id: market_id.to_string(),
            side,
            shares,
            entry_price,
            current_value: shares * entry_price,
            unrealized_pnl: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    /// Fold an additional BUY into the position, recomputing the
    /// size-weighted average entry price:
    /// (old_shares * old_entry + size_usd) / (old_shares + new_shares)
    pub fn add_buy(&mut self, size_usd: Decimal, price: Decimal) {
        let new_shares = size_usd / price;
        let total_shares = self.shares + new_shares;
        self.entry_price = (self.shares * self.entry_price + size_usd) / total_shares;
        self.shares = total_shares;
        self.revalue(price);
    }

    /// Reduce the position by a SELL. Returns the remaining share count;
    /// the caller deletes the row once it falls below POSITION_EPSILON.
    pub fn reduce(&mut self, size_usd: Decimal, price: Decimal) -> Decimal {
        let sold = size_usd / price;
        self.shares = (self.shares - sold).max(Decimal::ZERO);
        self.revalue(price);
        self.shares
    }

    /// Refresh current_value and unrealized_pnl against a market price
    pub fn revalue(&mut self, price: Decimal) {
        self.current_value = self.shares * price;
        self.unrealized_pnl = (price - self.entry_price) * self.shares;
        self.updated_at = Utc::now();
    }

    /// Whether the position is below the dust threshold
    pub fn is_dust(&self) -> bool {
        self.shares < POSITION_EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(shares: Decimal, entry: Decimal) -> Position {
        Position::open(Uuid::new_v4(), "m1", MarketSide::Yes, shares, entry)
    }

    #[test]
    fn test_open_values() {
        let pos = position(dec!(125), dec!(0.40));
        assert_eq!(pos.current_value, dec!(50));
        assert_eq!(pos.unrealized_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_weighted_average_entry() {
        // $40 at 0.40 (100 shares), then $30 at 0.60 (50 shares)
        let mut pos = position(dec!(100), dec!(0.40));
        pos.add_buy(dec!(30), dec!(0.60));

        assert_eq!(pos.shares, dec!(150));
        // (100 * 0.40 + 30) / 150 = 70 / 150
        let expected = dec!(70) / dec!(150);
        assert!((pos.entry_price - expected).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_reduce_never_negative() {
        let mut pos = position(dec!(100), dec!(0.50));
        let remaining = pos.reduce(dec!(60), dec!(0.50));
        assert_eq!(remaining, dec!(0));
        assert!(pos.is_dust());
    }

    #[test]
    fn test_revalue() {
        let mut pos = position(dec!(125), dec!(0.40));
        pos.revalue(dec!(0.50));
        assert_eq!(pos.current_value, dec!(62.50));
        assert_eq!(pos.unrealized_pnl, dec!(12.50));
    }
}
