//! Decision engine: builds the provider prompt for an agent, invokes the
//! configured provider under a timeout budget, and parses the response
//! into a canonical action.
//!
//! A provider call that errors, times out, or returns unparsable content
//! yields a per-agent failure; nothing here panics past the engine
//! boundary.

use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::config::DecisionConfig;
use crate::domain::{Agent, CanonicalAction, MarketSide, TradeAction};
use crate::error::{AgoraError, Result};
use crate::providers::ProviderRegistry;

pub struct DecisionEngine {
    registry: ProviderRegistry,
    settings: DecisionConfig,
    /// Global per-trade cap fraction; agents may override
    max_trade_fraction: Decimal,
}

impl DecisionEngine {
    pub fn new(
        registry: ProviderRegistry,
        settings: DecisionConfig,
        max_trade_fraction: Decimal,
    ) -> Self {
        Self {
            registry,
            settings,
            max_trade_fraction,
        }
    }

    /// Obtain one canonical action for an agent from its provider.
    pub async fn decide(
        &self,
        agent: &Agent,
        open_positions: usize,
        brief: &str,
    ) -> Result<CanonicalAction> {
        let cap = agent.trade_cap(self.max_trade_fraction);
        let prompt = build_prompt(agent, open_positions, brief, cap);
        let provider = self.registry.get(&agent.model)?;

        debug!(agent = %agent.name, provider = provider.name(), "requesting decision");
        let raw = timeout(
            Duration::from_secs(self.settings.timeout_secs),
            provider.generate(&prompt),
        )
        .await
        .map_err(|_| AgoraError::ProviderTimeout(self.settings.timeout_secs))??;

        let action = parse_decision(&raw, cap)?;
        debug!(
            agent = %agent.name,
            action = %action.action,
            size = %action.size_usd,
            "decision parsed"
        );
        Ok(action)
    }
}

fn build_prompt(agent: &Agent, open_positions: usize, brief: &str, cap: Decimal) -> String {
    format!(
        r#"You are "{name}", an autonomous trading agent on a binary prediction-market exchange.

Strategy: {strategy}
Current capital: ${capital}
Open positions: {open_positions}

{brief}

Rules:
- Propose exactly ONE action per response.
- Maximum trade size is ${cap}.
- BUY and SELL require marketId, side (YES or NO) and sizeUsd.
- Reasoning is mandatory.

Respond ONLY with valid JSON matching this schema:
{{"action": "BUY" | "SELL" | "HOLD", "marketId": "...", "side": "YES" | "NO", "sizeUsd": 25.0, "maxPrice": 0.65, "reasoning": "..."}}"#,
        name = agent.name,
        strategy = agent.strategy,
        capital = agent.current_capital,
        open_positions = open_positions,
        brief = brief,
        cap = cap,
    )
}

/// Raw decision as providers ship it; tolerant of snake_case keys and
/// numbers arriving as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDecision {
    action: String,
    #[serde(default, alias = "market_id")]
    market_id: Option<String>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default, alias = "size_usd", deserialize_with = "de_opt_decimal")]
    size_usd: Option<Decimal>,
    #[serde(default, alias = "max_price", deserialize_with = "de_opt_decimal")]
    max_price: Option<Decimal>,
    #[serde(default)]
    reasoning: Option<String>,
}

fn de_opt_decimal<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
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

/// Extract JSON from a response that may contain markdown code blocks
fn extract_json(text: &str) -> &str {
    // Try to find JSON in code blocks first
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            return text[start + 7..start + 7 + end].trim();
        }
    }

    // Try generic code blocks
    if let Some(start) = text.find("```") {
        if let Some(end) = text[start + 3..].find("```") {
            let content = text[start + 3..start + 3 + end].trim();
            // Skip language identifier if present
            if let Some(newline) = content.find('\n') {
                return content[newline + 1..].trim();
            }
            return content;
        }
    }

    // Try to find raw JSON object
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            return &text[start..=end];
        }
    }

    text.trim()
}

/// Parse and validate a provider response into a canonical action,
/// clamping sizeUsd to the agent's cap.
fn parse_decision(raw: &str, cap: Decimal) -> Result<CanonicalAction> {
    let json_str = extract_json(raw);
    let parsed: RawDecision = serde_json::from_str(json_str)
        .map_err(|e| AgoraError::UnparsableDecision(format!("bad JSON: {e}")))?;

    let action = TradeAction::try_from(parsed.action.as_str())
        .map_err(AgoraError::UnparsableDecision)?;

    if action == TradeAction::Hold {
        return Ok(CanonicalAction::hold(parsed.reasoning.unwrap_or_default()));
    }

    let market_id = parsed
        .market_id
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AgoraError::UnparsableDecision("missing marketId".to_string()))?;
    let side = parsed
        .side
        .as_deref()
        .ok_or_else(|| AgoraError::UnparsableDecision("missing side".to_string()))
        .and_then(|s| MarketSide::try_from(s).map_err(AgoraError::UnparsableDecision))?;
    let size_usd = parsed
        .size_usd
        .ok_or_else(|| AgoraError::UnparsableDecision("missing sizeUsd".to_string()))?;
    if size_usd <= Decimal::ZERO {
        return Err(AgoraError::UnparsableDecision(
            "sizeUsd must be positive".to_string(),
        ));
    }

    Ok(CanonicalAction {
        action,
        market_id: Some(market_id),
        side: Some(side),
        size_usd: size_usd.min(cap),
        max_price: parsed.max_price.unwrap_or(Decimal::ONE),
        reasoning: parsed.reasoning.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_extract_json_from_code_block() {
        let text = r#"Here's my call:

```json
{"action": "HOLD", "reasoning": "nothing cheap"}
```

Good luck."#;

        let json = extract_json(text);
        assert!(json.starts_with('{'));
        assert!(json.contains("HOLD"));
    }

    #[test]
    fn test_parse_buy() {
        let raw = r#"{"action": "BUY", "marketId": "m1", "side": "YES", "sizeUsd": 25, "maxPrice": 0.65, "reasoning": "edge"}"#;
        let action = parse_decision(raw, dec!(50)).unwrap();
        assert_eq!(action.action, TradeAction::Buy);
        assert_eq!(action.market_id.as_deref(), Some("m1"));
        assert_eq!(action.side, Some(MarketSide::Yes));
        assert_eq!(action.size_usd, dec!(25));
        assert_eq!(action.max_price, dec!(0.65));
    }

    #[test]
    fn test_oversize_is_clamped() {
        let raw = r#"{"action": "BUY", "marketId": "m1", "side": "NO", "sizeUsd": 500, "reasoning": "all in"}"#;
        let action = parse_decision(raw, dec!(50)).unwrap();
        assert_eq!(action.size_usd, dec!(50));
    }

    #[test]
    fn test_max_price_defaults_to_one() {
        let raw = r#"{"action": "BUY", "marketId": "m1", "side": "YES", "sizeUsd": 10, "reasoning": "r"}"#;
        let action = parse_decision(raw, dec!(50)).unwrap();
        assert_eq!(action.max_price, Decimal::ONE);
    }

    #[test]
    fn test_hold_ignores_missing_fields() {
        let raw = r#"{"action": "HOLD", "reasoning": "waiting"}"#;
        let action = parse_decision(raw, dec!(50)).unwrap();
        assert!(action.is_hold());
        assert_eq!(action.size_usd, Decimal::ZERO);
    }

    #[test]
    fn test_missing_market_rejected() {
        let raw = r#"{"action": "BUY", "side": "YES", "sizeUsd": 10}"#;
        assert!(matches!(
            parse_decision(raw, dec!(50)),
            Err(AgoraError::UnparsableDecision(_))
        ));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let raw = r#"{"action": "SHORT", "marketId": "m1", "side": "YES", "sizeUsd": 10}"#;
        assert!(parse_decision(raw, dec!(50)).is_err());
    }

    #[test]
    fn test_snake_case_and_string_numbers_accepted() {
        let raw = r#"{"action": "SELL", "market_id": "m2", "side": "no", "size_usd": "12.5", "reasoning": "take profit"}"#;
        let action = parse_decision(raw, dec!(50)).unwrap();
        assert_eq!(action.action, TradeAction::Sell);
        assert_eq!(action.market_id.as_deref(), Some("m2"));
        assert_eq!(action.size_usd, dec!(12.5));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_decision("I refuse to answer", dec!(50)).is_err());
    }
}
