use anyhow::{Context, Result};
use std::str::FromStr;

/// ETH/USD on Pyth, priced for native collateral.
pub const ETH_USD_FEED_ID: &str = "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace";

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub port: u16,
    pub hermes_url: String,
    pub liquidation_ratio: u128,
    pub price_refresh_interval_ms: u64,
    pub health_scan_interval_ms: u64,
    pub alert_threshold_pct: u32,
    pub native_price_feed_id: String,
    pub default_price: u128,
    pub enable_oracle: bool,
    /// Symbols of the collateral tokens registered at startup.
    pub collateral_tokens: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            hermes_url: "https://hermes.pyth.network".to_string(),
            liquidation_ratio: safe_ledger::constants::LIQUIDATION_RATIO,
            price_refresh_interval_ms: 5000,
            health_scan_interval_ms: 2000,
            alert_threshold_pct: 10,
            native_price_feed_id: ETH_USD_FEED_ID.to_string(),
            default_price: safe_ledger::constants::DEFAULT_PRICE,
            enable_oracle: true,
            collateral_tokens: vec!["MKT".to_string()],
        }
    }
}

impl BackendConfig {
    /// Read the configuration from the environment, falling back to defaults.
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            port: env_or("PORT", defaults.port)?,
            hermes_url: std::env::var("HERMES_URL").unwrap_or(defaults.hermes_url),
            liquidation_ratio: env_or("LIQUIDATION_RATIO", defaults.liquidation_ratio)?,
            price_refresh_interval_ms: env_or(
                "PRICE_REFRESH_INTERVAL_MS",
                defaults.price_refresh_interval_ms,
            )?,
            health_scan_interval_ms: env_or(
                "HEALTH_SCAN_INTERVAL_MS",
                defaults.health_scan_interval_ms,
            )?,
            alert_threshold_pct: env_or("ALERT_THRESHOLD_PCT", defaults.alert_threshold_pct)?,
            native_price_feed_id: std::env::var("NATIVE_PRICE_FEED_ID")
                .unwrap_or(defaults.native_price_feed_id),
            default_price: env_or("DEFAULT_PRICE", defaults.default_price)?,
            enable_oracle: env_or("ENABLE_ORACLE", defaults.enable_oracle)?,
            collateral_tokens: std::env::var("COLLATERAL_TOKENS")
                .map(|raw| parse_list(&raw))
                .unwrap_or(defaults.collateral_tokens),
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
