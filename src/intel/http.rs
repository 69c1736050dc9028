//! HTTP intelligence provider.
//!
//! Pulls open markets from a gamma-style REST endpoint and, when
//! configured, headline and social feeds. The three fetches run
//! concurrently and fail independently; the snapshot carries whatever
//! succeeded.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::IntelConfig;
use crate::domain::Market;
use crate::error::{AgoraError, Result};

use super::{IntelProvider, IntelSnapshot, NewsHeadline, SocialPost};

/// REST-backed intelligence provider
pub struct HttpIntelProvider {
    settings: IntelConfig,
    http: Client,
}

impl HttpIntelProvider {
    pub fn new(settings: IntelConfig) -> Self {
        Self {
            settings,
            http: Client::new(),
        }
    }

    async fn fetch_markets(&self) -> Result<Vec<Market>> {
        let rows: Vec<MarketRow> = self
            .http
            .get(&self.settings.markets_url)
            .query(&[("closed", "false"), ("limit", "100")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut markets: Vec<Market> = rows
            .into_iter()
            .filter_map(|row| row.into_market())
            .collect();

        if markets.is_empty() {
            return Err(AgoraError::MarketDataUnavailable(
                "market feed returned no usable rows".to_string(),
            ));
        }

        // Deepest books first; the brief only carries the head
        markets.sort_by(|a, b| b.liquidity.cmp(&a.liquidity));
        markets.truncate(self.settings.max_markets);
        Ok(markets)
    }

    async fn fetch_news(&self) -> Result<Vec<NewsHeadline>> {
        let Some(url) = &self.settings.news_url else {
            return Ok(Vec::new());
        };
        let items: Vec<NewsHeadline> = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(items)
    }

    async fn fetch_social(&self) -> Result<Vec<SocialPost>> {
        let Some(url) = &self.settings.social_url else {
            return Ok(Vec::new());
        };
        let posts: Vec<SocialPost> = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(posts)
    }
}

#[async_trait]
impl IntelProvider for HttpIntelProvider {
    async fn snapshot(&self) -> Result<IntelSnapshot> {
        let (markets, news, social) =
            tokio::join!(self.fetch_markets(), self.fetch_news(), self.fetch_social());

        let mut snapshot = IntelSnapshot::default();

        match markets {
            Ok(markets) => snapshot.markets = markets,
            Err(e) => {
                warn!("market fetch failed: {}", e);
                snapshot.fetch_errors += 1;
            }
        }
        match news {
            Ok(news) => snapshot.news = news,
            Err(e) => {
                warn!("news fetch failed: {}", e);
                snapshot.fetch_errors += 1;
            }
        }
        match social {
            Ok(social) => snapshot.social = social,
            Err(e) => {
                warn!("social fetch failed: {}", e);
                snapshot.fetch_errors += 1;
            }
        }

        debug!(
            markets = snapshot.markets.len(),
            news = snapshot.news.len(),
            social = snapshot.social.len(),
            errors = snapshot.fetch_errors,
            "intel snapshot assembled"
        );
        Ok(snapshot)
    }
}

/// Raw market row as gamma-style feeds ship it: prices arrive as a
/// JSON-encoded string array, numbers sometimes as strings.
#[derive(Debug, Deserialize)]
struct MarketRow {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    question: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(rename = "outcomePrices", default)]
    outcome_prices: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    liquidity: Option<Decimal>,
    #[serde(default)]
    closed: bool,
}

impl MarketRow {
    fn prices(&self) -> Option<(Decimal, Decimal)> {
        let prices_str = self.outcome_prices.as_ref()?;
        let prices: Vec<String> = serde_json::from_str(prices_str).ok()?;
        if prices.len() >= 2 {
            let yes = prices[0].parse::<Decimal>().ok()?;
            let no = prices[1].parse::<Decimal>().ok()?;
            Some((yes, no))
        } else {
            None
        }
    }

    fn into_market(self) -> Option<Market> {
        let (yes_price, no_price) = self.prices()?;
        Some(Market {
            yes_price,
            no_price,
            liquidity: self.liquidity.unwrap_or(Decimal::ZERO),
            resolved: self.closed,
            category: self.category.unwrap_or_default(),
            question: self.question,
            id: self.id,
            updated_at: Utc::now(),
        })
    }
}

/// Accept ids shipped as either a JSON string or a bare number
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected id value: {other}"
        ))),
    }
}

/// Deserialize an optional decimal that could arrive as string or number
fn deserialize_optional_decimal<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string().parse::<Decimal>().ok()),
        Some(serde_json::Value::String(s)) => Ok(s.parse::<Decimal>().ok()),
        Some(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_row_parses_stringified_prices() {
        let row: MarketRow = serde_json::from_str(
            r#"{
                "id": 123,
                "question": "Will it rain?",
                "category": "weather",
                "outcomePrices": "[\"0.52\", \"0.48\"]",
                "liquidity": "5000.5",
                "closed": false
            }"#,
        )
        .unwrap();

        let market = row.into_market().unwrap();
        assert_eq!(market.id, "123");
        assert_eq!(market.yes_price, dec!(0.52));
        assert_eq!(market.no_price, dec!(0.48));
        assert_eq!(market.liquidity, dec!(5000.5));
        assert!(!market.resolved);
    }

    #[test]
    fn test_market_row_without_prices_is_dropped() {
        let row: MarketRow = serde_json::from_str(
            r#"{"id": "m1", "question": "q", "closed": false}"#,
        )
        .unwrap();
        assert!(row.into_market().is_none());
    }
}
