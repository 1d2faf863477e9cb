/// Bridge configuration - every tunable of the reconciliation engine
///
/// # Environment variables
///
/// All settings can be overridden through environment variables:
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | DATABASE_PATH | bridge.db | SQLite database file |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | SOURCE_API_URL | (unset) | Storefront REST API base URL |
/// | SOURCE_CONSUMER_KEY | (unset) | Storefront API key |
/// | SOURCE_CONSUMER_SECRET | (unset) | Storefront API secret |
/// | DESTINATION_API_URL | (unset) | Fulfillment backend API base URL |
/// | DESTINATION_TOKEN | (unset) | Fulfillment backend bearer token |
/// | HTTP_TIMEOUT_SECS | 15 | Timeout for every outbound HTTP call |
/// | MAX_RETRIES | 5 | Failed attempts before dead-lettering |
/// | RETRY_BATCH_SIZE | 20 | Pending rows per retry sweep |
/// | DEAD_LETTER_BATCH_SIZE | 50 | Exhausted rows per escalation pass |
/// | RETRY_INTERVAL_SECS | 300 | Retry sweep cadence |
/// | RETRY_COOLDOWN_SECS | 300 | Min age of last attempt before re-selection |
/// | STATUS_FROM_DEST_INTERVAL_SECS | 900 | Destination→source status sweep cadence |
/// | STATUS_TO_DEST_INTERVAL_SECS | 3600 | Source→destination status sweep cadence |
/// | STATUS_PAGE_SIZE | 50 | Orders fetched per status sweep |
/// | STATUS_LOOKBACK_MINUTES | 30 | Recently-changed window for status sweeps |
/// | ENVIRONMENT | development | Runtime environment |
///
/// # Example
///
/// ```ignore
/// DATABASE_PATH=/data/bridge.db HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file path
    pub database_path: String,
    /// HTTP API port
    pub http_port: u16,
    /// Runtime environment: development | staging | production
    pub environment: String,

    // === External systems ===
    /// Storefront (source) API base URL
    pub source_api_url: Option<String>,
    /// Storefront API consumer key
    pub source_consumer_key: Option<String>,
    /// Storefront API consumer secret
    pub source_consumer_secret: Option<String>,
    /// Fulfillment backend (destination) API base URL
    pub destination_api_url: Option<String>,
    /// Fulfillment backend bearer token
    pub destination_token: Option<String>,
    /// Timeout for every outbound HTTP call (seconds)
    pub http_timeout_secs: u64,

    // === Retry pipeline ===
    /// Failed attempts recorded before an order is dead-lettered
    pub max_retries: u32,
    /// Pending rows selected per retry sweep
    pub retry_batch_size: u32,
    /// Exhausted rows selected per escalation pass
    pub dead_letter_batch_size: u32,
    /// Retry sweep cadence (seconds)
    pub retry_interval_secs: u64,
    /// Minimum age of `last_attempt_at` before a row is re-selected
    /// (seconds); keeps an in-flight first attempt and the retry sweep
    /// from racing the same order
    pub retry_cooldown_secs: u64,

    // === Status reconciliation ===
    /// Destination→source status sweep cadence (seconds)
    pub status_from_dest_interval_secs: u64,
    /// Source→destination status sweep cadence (seconds)
    pub status_to_dest_interval_secs: u64,
    /// Orders fetched per status sweep
    pub status_page_size: u32,
    /// Recently-changed window for status sweeps (minutes)
    pub status_lookback_minutes: u64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to their defaults. Missing API
    /// credentials are allowed here: the sync executor classifies them as
    /// a configuration failure per order instead of refusing to start.
    pub fn from_env() -> Self {
        Self {
            database_path: std::env::var("DATABASE_PATH").unwrap_or_else(|_| "bridge.db".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            source_api_url: std::env::var("SOURCE_API_URL").ok(),
            source_consumer_key: std::env::var("SOURCE_CONSUMER_KEY").ok(),
            source_consumer_secret: std::env::var("SOURCE_CONSUMER_SECRET").ok(),
            destination_api_url: std::env::var("DESTINATION_API_URL").ok(),
            destination_token: std::env::var("DESTINATION_TOKEN").ok(),
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS", 15),

            max_retries: env_parse("MAX_RETRIES", 5),
            retry_batch_size: env_parse("RETRY_BATCH_SIZE", 20),
            dead_letter_batch_size: env_parse("DEAD_LETTER_BATCH_SIZE", 50),
            retry_interval_secs: env_parse("RETRY_INTERVAL_SECS", 300),
            retry_cooldown_secs: env_parse("RETRY_COOLDOWN_SECS", 300),

            status_from_dest_interval_secs: env_parse("STATUS_FROM_DEST_INTERVAL_SECS", 900),
            status_to_dest_interval_secs: env_parse("STATUS_TO_DEST_INTERVAL_SECS", 3600),
            status_page_size: env_parse("STATUS_PAGE_SIZE", 50),
            status_lookback_minutes: env_parse("STATUS_LOOKBACK_MINUTES", 30),
        }
    }

    /// Whether this is a production environment
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Recently-changed window for status sweeps, in milliseconds
    pub fn status_lookback_ms(&self) -> i64 {
        self.status_lookback_minutes as i64 * 60_000
    }

    /// Retry cool-down window, in milliseconds
    pub fn retry_cooldown_ms(&self) -> i64 {
        self.retry_cooldown_secs as i64 * 1000
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
