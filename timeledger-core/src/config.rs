use anyhow::Context;
use rust_decimal::Decimal;

/// Runtime configuration, resolved once at startup from environment variables
/// (a `.env` file is honored via `dotenv`).
///
/// Everything has a sensible local-first default: with an empty environment
/// the server runs on `0.0.0.0:3000`, stores data in `timeledger.db` next to
/// the binary, accepts unauthenticated requests as the local user and never
/// talks to a remote workspace store.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Interface the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// SQLite connection string, e.g. `sqlite://timeledger.db`.
    pub database_url: String,
    /// Secret used to validate bearer tokens minted by the identity provider.
    pub jwt_secret: String,
    /// When true, requests without a bearer token run as the local user
    /// instead of being rejected.
    pub local_mode: bool,
    /// Base URL of the remote workspace store. Absent means replication is
    /// disabled and the ledger is purely local.
    pub remote_sync_url: Option<String>,
    /// Optional bearer token sent with every remote workspace write.
    pub remote_sync_token: Option<String>,
    /// Quiet period between a local change and the replication push.
    pub sync_debounce_ms: u64,
    /// Base URL of the exchange-rate provider.
    pub rates_url: String,
    /// Hours in one working day, used when expanding day-based durations.
    pub workday_hours: u32,
    /// Pricing-health thresholds for fixed-price projects.
    pub pricing: PricingConfig,
}

/// Thresholds for the fixed-price earnings health indicator.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Hourly rate the user aims to earn. `None` disables the indicator.
    pub target_rate: Option<Decimal>,
    /// Shortfalls up to `watch_multiple * target_rate` count as "watch",
    /// anything beyond as "risk".
    pub watch_multiple: Decimal,
}

impl AppConfig {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but unparseable (e.g. a
    /// non-numeric `SERVER_PORT`), never when a variable is merely absent.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("SERVER_PORT must be a valid port number")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://timeledger.db".to_string());

        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "local-development-secret".to_string());
        let local_mode = std::env::var("LOCAL_MODE")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .context("LOCAL_MODE must be true or false")?;

        let remote_sync_url = std::env::var("REMOTE_SYNC_URL").ok().filter(|v| !v.is_empty());
        let remote_sync_token = std::env::var("REMOTE_SYNC_TOKEN").ok().filter(|v| !v.is_empty());
        let sync_debounce_ms = std::env::var("SYNC_DEBOUNCE_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<u64>()
            .context("SYNC_DEBOUNCE_MS must be a number of milliseconds")?;

        let rates_url = std::env::var("RATES_URL")
            .unwrap_or_else(|_| "https://api.exchangerate.host/latest".to_string());

        let workday_hours = std::env::var("WORKDAY_HOURS")
            .unwrap_or_else(|_| "8".to_string())
            .parse::<u32>()
            .context("WORKDAY_HOURS must be a whole number of hours")?;

        let target_rate = match std::env::var("TARGET_HOURLY_RATE") {
            Ok(raw) if !raw.is_empty() => Some(
                raw.parse::<Decimal>()
                    .context("TARGET_HOURLY_RATE must be a decimal amount")?,
            ),
            _ => None,
        };
        let watch_multiple = std::env::var("PRICING_WATCH_MULTIPLE")
            .unwrap_or_else(|_| "4".to_string())
            .parse::<Decimal>()
            .context("PRICING_WATCH_MULTIPLE must be a decimal multiplier")?;

        Ok(AppConfig {
            host,
            port,
            database_url,
            jwt_secret,
            local_mode,
            remote_sync_url,
            remote_sync_token,
            sync_debounce_ms,
            rates_url,
            workday_hours,
            pricing: PricingConfig {
                target_rate,
                watch_multiple,
            },
        })
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            target_rate: None,
            watch_multiple: Decimal::from(4),
        }
    }
}
