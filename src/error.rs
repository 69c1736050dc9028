use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the trading arena
#[derive(Error, Debug)]
pub enum AgoraError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Market data errors
    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("Market not found: {0}")]
    MarketNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    // Decision provider errors
    #[error("Provider not registered: {0}")]
    ProviderNotRegistered(String),

    #[error("Provider call failed: {0}")]
    ProviderFailure(String),

    #[error("Provider call timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("Unparsable decision: {0}")]
    UnparsableDecision(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for AgoraError
pub type Result<T> = std::result::Result<T, AgoraError>;

/// Specific reasons a proposed trade fails validation.
///
/// Checks run in a fixed order and the first failure short-circuits,
/// so a rejected trade carries exactly one of these.
#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Market not found: {market_id}")]
    UnknownMarket { market_id: String },

    #[error("Market is resolved: {market_id}")]
    MarketResolved { market_id: String },

    #[error("Insufficient capital: requested ${requested}, available ${available}")]
    InsufficientCapital {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Trade size ${requested} exceeds limit ${limit}")]
    ExceedsTradeLimit { requested: Decimal, limit: Decimal },

    #[error("Insufficient liquidity: ${liquidity} < ${minimum} required")]
    InsufficientLiquidity {
        liquidity: Decimal,
        minimum: Decimal,
    },

    #[error("Insufficient position: holding ${held}, requested ${requested}")]
    InsufficientPosition { held: Decimal, requested: Decimal },

    #[error("Price {price} exceeds max price {max_price}")]
    PriceAboveLimit { price: Decimal, max_price: Decimal },

    #[error("No executable price for side {side}")]
    PriceUnavailable { side: String },
}

impl From<ValidationError> for AgoraError {
    fn from(err: ValidationError) -> Self {
        AgoraError::Validation(err.to_string())
    }
}
