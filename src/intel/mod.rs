//! Market intelligence: the per-cycle snapshot of tradable markets plus
//! supporting news and social context, and the textual brief handed to
//! every decision prompt.

pub mod http;

pub use http::HttpIntelProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Market;
use crate::error::Result;

/// One news headline attached to a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsHeadline {
    pub title: String,
    #[serde(default)]
    pub source: String,
}

/// One social post attached to a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPost {
    #[serde(default)]
    pub author: String,
    pub text: String,
}

/// Everything the intelligence provider could gather for one cycle.
///
/// Sub-sources fail independently; `fetch_errors` counts the ones that
/// did so the orchestrator can fold them into the cycle error count.
#[derive(Debug, Clone, Default)]
pub struct IntelSnapshot {
    pub markets: Vec<Market>,
    pub news: Vec<NewsHeadline>,
    pub social: Vec<SocialPost>,
    pub fetch_errors: u32,
}

#[async_trait]
pub trait IntelProvider: Send + Sync {
    /// Gather whatever market/news/social data is currently reachable.
    async fn snapshot(&self) -> Result<IntelSnapshot>;
}

/// Render the snapshot into the single textual brief consumed by the
/// decision engine.
pub fn format_brief(snapshot: &IntelSnapshot, as_of: DateTime<Utc>) -> String {
    let mut brief = format!(
        "MARKET BRIEF - {}\n\n## Markets ({})\n",
        as_of.format("%Y-%m-%d %H:%M UTC"),
        snapshot.markets.len()
    );

    if snapshot.markets.is_empty() {
        brief.push_str("No market data available this cycle.\n");
    }
    for market in &snapshot.markets {
        brief.push_str(&format!(
            "- [{}] {} | YES {} / NO {} | liquidity ${} | {}\n",
            market.id,
            market.question,
            market.yes_price,
            market.no_price,
            market.liquidity,
            market.category,
        ));
    }

    if !snapshot.news.is_empty() {
        brief.push_str(&format!("\n## Headlines ({})\n", snapshot.news.len()));
        for item in &snapshot.news {
            if item.source.is_empty() {
                brief.push_str(&format!("- {}\n", item.title));
            } else {
                brief.push_str(&format!("- {} ({})\n", item.title, item.source));
            }
        }
    }

    if !snapshot.social.is_empty() {
        brief.push_str(&format!("\n## Social ({})\n", snapshot.social.len()));
        for post in &snapshot.social {
            if post.author.is_empty() {
                brief.push_str(&format!("- {}\n", post.text));
            } else {
                brief.push_str(&format!("- @{}: {}\n", post.author, post.text));
            }
        }
    }

    brief
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_brief_lists_markets_and_context() {
        let snapshot = IntelSnapshot {
            markets: vec![Market {
                id: "m1".to_string(),
                question: "Will X happen?".to_string(),
                category: "politics".to_string(),
                yes_price: dec!(0.42),
                no_price: dec!(0.58),
                liquidity: dec!(5000),
                resolved: false,
                updated_at: Utc::now(),
            }],
            news: vec![NewsHeadline {
                title: "X announced".to_string(),
                source: "wire".to_string(),
            }],
            social: vec![SocialPost {
                author: "trader".to_string(),
                text: "X is happening".to_string(),
            }],
            fetch_errors: 0,
        };

        let brief = format_brief(&snapshot, Utc::now());
        assert!(brief.contains("Will X happen?"));
        assert!(brief.contains("YES 0.42"));
        assert!(brief.contains("X announced (wire)"));
        assert!(brief.contains("@trader"));
    }

    #[test]
    fn test_brief_with_empty_snapshot() {
        let brief = format_brief(&IntelSnapshot::default(), Utc::now());
        assert!(brief.contains("No market data available"));
    }
}
