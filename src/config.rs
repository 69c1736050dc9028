use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub intel: IntelConfig,
    #[serde(default)]
    pub alerts: AlertThresholds,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between trading cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    900 // 15 minutes
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Per-trade cap as a fraction of an agent's initial capital
    #[serde(default = "default_max_trade_fraction")]
    pub max_trade_fraction: Decimal,
    /// Minimum market liquidity to allow any trade
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity_usd: Decimal,
}

fn default_max_trade_fraction() -> Decimal {
    rust_decimal_macros::dec!(0.10)
}

fn default_min_liquidity() -> Decimal {
    Decimal::from(1000)
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_trade_fraction: default_max_trade_fraction(),
            min_liquidity_usd: default_min_liquidity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionConfig {
    /// Budget for a single provider call
    #[serde(default = "default_decision_timeout")]
    pub timeout_secs: u64,
    /// Completion budget passed to providers
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_decision_timeout() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_decision_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExecutionConfig {
    /// Request live order routing. Without venue credentials the
    /// executor always falls back to simulation.
    #[serde(default)]
    pub live: bool,
    #[serde(default)]
    pub venue: Option<VenueConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntelConfig {
    /// Endpoint listing open markets
    #[serde(default = "default_markets_url")]
    pub markets_url: String,
    /// Optional headline feed
    #[serde(default)]
    pub news_url: Option<String>,
    /// Optional social feed
    #[serde(default)]
    pub social_url: Option<String>,
    /// Cap on markets included in a cycle brief
    #[serde(default = "default_max_markets")]
    pub max_markets: usize,
}

fn default_markets_url() -> String {
    "https://gamma-api.polymarket.com/markets".to_string()
}

fn default_max_markets() -> usize {
    20
}

impl Default for IntelConfig {
    fn default() -> Self {
        Self {
            markets_url: default_markets_url(),
            news_url: None,
            social_url: None,
            max_markets: default_max_markets(),
        }
    }
}

/// Fixed thresholds evaluated by the alert engine
#[derive(Debug, Clone, Deserialize)]
pub struct AlertThresholds {
    /// Single executed trade at or above this size raises an info alert
    #[serde(default = "default_large_trade")]
    pub large_trade_usd: Decimal,
    /// Net PnL at or above this raises an info alert
    #[serde(default = "default_large_win")]
    pub large_win_usd: Decimal,
    /// Net PnL at or below the negation of this raises a warning
    #[serde(default = "default_large_loss")]
    pub large_loss_usd: Decimal,
    /// Open exposure above this fraction of initial capital raises a warning
    #[serde(default = "default_exposure_fraction")]
    pub exposure_fraction: Decimal,
    /// Drawdown at or below the negation of this fraction is critical
    #[serde(default = "default_drawdown_fraction")]
    pub drawdown_fraction: f64,
    /// Win rate below this floor raises a warning
    #[serde(default = "default_win_rate_floor")]
    pub win_rate_floor: f64,
}

fn default_large_trade() -> Decimal {
    Decimal::from(50)
}

fn default_large_win() -> Decimal {
    Decimal::from(100)
}

fn default_large_loss() -> Decimal {
    Decimal::from(100)
}

fn default_exposure_fraction() -> Decimal {
    rust_decimal_macros::dec!(0.5)
}

fn default_drawdown_fraction() -> f64 {
    0.1
}

fn default_win_rate_floor() -> f64 {
    0.35
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            large_trade_usd: default_large_trade(),
            large_win_usd: default_large_win(),
            large_loss_usd: default_large_loss(),
            exposure_fraction: default_exposure_fraction(),
            drawdown_fraction: default_drawdown_fraction(),
            win_rate_floor: default_win_rate_floor(),
        }
    }
}

/// Which API family a provider speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    /// OpenAI-compatible chat completions (also xAI and others via base_url)
    OpenAi,
}

/// One decision provider entry. `name` is the key agents reference
/// through their `model` field.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    /// Upstream model identifier sent on the wire
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Declarative agent roster entry, upserted by name at startup
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    /// Provider registry key
    pub model: String,
    pub strategy: String,
    pub initial_capital: Decimal,
    #[serde(default = "default_agent_active")]
    pub active: bool,
    /// Per-agent override of risk.max_trade_fraction
    #[serde(default)]
    pub max_trade_fraction: Option<Decimal>,
}

fn default_agent_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("AGORA_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (AGORA__DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("AGORA")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.scheduler.interval_secs == 0 {
            errors.push("scheduler.interval_secs must be positive".to_string());
        }

        let fraction = self.risk.max_trade_fraction;
        if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
            errors.push("risk.max_trade_fraction must be in (0, 1]".to_string());
        }

        if self.risk.min_liquidity_usd < Decimal::ZERO {
            errors.push("risk.min_liquidity_usd must be non-negative".to_string());
        }

        if self.decision.timeout_secs == 0 {
            errors.push("decision.timeout_secs must be positive".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for agent in &self.agents {
            if !seen.insert(agent.name.as_str()) {
                errors.push(format!("duplicate agent name: {}", agent.name));
            }
            if agent.initial_capital <= Decimal::ZERO {
                errors.push(format!(
                    "agent {} must have positive initial_capital",
                    agent.name
                ));
            }
            if let Some(f) = agent.max_trade_fraction {
                if f <= Decimal::ZERO || f > Decimal::ONE {
                    errors.push(format!(
                        "agent {} max_trade_fraction must be in (0, 1]",
                        agent.name
                    ));
                }
            }
            if !self.providers.iter().any(|p| p.name == agent.model) {
                errors.push(format!(
                    "agent {} references unknown provider {}",
                    agent.name, agent.model
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                url: "postgres://localhost/agora".to_string(),
                max_connections: 5,
            },
            scheduler: SchedulerConfig::default(),
            risk: RiskConfig::default(),
            decision: DecisionConfig::default(),
            execution: ExecutionConfig::default(),
            intel: IntelConfig::default(),
            alerts: AlertThresholds::default(),
            providers: vec![ProviderConfig {
                name: "claude-sonnet".to_string(),
                kind: ProviderKind::Anthropic,
                model: "claude-sonnet-4-20250514".to_string(),
                api_key: String::new(),
                base_url: None,
            }],
            agents: vec![AgentSpec {
                name: "value-hunter".to_string(),
                model: "claude-sonnet".to_string(),
                strategy: "buy cheap".to_string(),
                initial_capital: dec!(500),
                active: true,
                max_trade_fraction: None,
            }],
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut cfg = base_config();
        cfg.agents[0].model = "nonexistent".to_string();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("unknown provider")));
    }

    #[test]
    fn test_bad_fraction_rejected() {
        let mut cfg = base_config();
        cfg.risk.max_trade_fraction = dec!(1.5);
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("max_trade_fraction")));
    }

    #[test]
    fn test_duplicate_agent_names_rejected() {
        let mut cfg = base_config();
        let dup = cfg.agents[0].clone();
        cfg.agents.push(dup);
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("duplicate agent name")));
    }
}
