use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use safe_ledger::CollateralType;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Pyth price feed backing one collateral type
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub collateral: CollateralType,
    pub label: String,
    pub pyth_price_id: String, // Hex string without 0x
}

pub struct OracleClient {
    http_client: reqwest::Client,
    base_url: String,
    feeds: HashMap<CollateralType, FeedConfig>,
    latest_prices: Arc<RwLock<HashMap<CollateralType, Decimal>>>,
}

impl OracleClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
            feeds: HashMap::new(),
            latest_prices: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create with default Pyth Hermes API
    pub fn new_hermes() -> Self {
        Self::new("https://hermes.pyth.network".to_string())
    }

    pub fn add_feed(&mut self, config: FeedConfig) {
        self.feeds.insert(config.collateral, config);
    }

    /// Price native collateral from the given feed
    pub fn with_native_feed(mut self, pyth_price_id: &str) -> Self {
        self.add_feed(FeedConfig {
            collateral: CollateralType::Native,
            label: "native".to_string(),
            pyth_price_id: pyth_price_id.trim_start_matches("0x").to_string(),
        });
        self
    }

    /// Fetch current price for a collateral type via HTTP API
    pub async fn fetch_price(&self, collateral: &CollateralType) -> Result<Decimal> {
        let feed = self
            .feeds
            .get(collateral)
            .ok_or_else(|| anyhow!("No price feed configured for {}", collateral))?;

        let url = format!(
            "{}/v2/updates/price/latest?ids[]=0x{}",
            self.base_url, feed.pyth_price_id
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch price from Pyth API")?;

        let price_response: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Pyth API response")?;

        let (price_value, conf_value) = parse_hermes_price(&price_response)?;

        tracing::debug!(
            "Price for {}: {} ± {} (conf)",
            feed.label,
            price_value,
            conf_value
        );

        let mut latest_prices = self.latest_prices.write().await;
        latest_prices.insert(*collateral, price_value);

        Ok(price_value)
    }

    /// Get cached price (non-blocking)
    pub async fn get_cached_price(&self, collateral: &CollateralType) -> Option<Decimal> {
        let latest_prices = self.latest_prices.read().await;
        latest_prices.get(collateral).copied()
    }

    /// Get all collateral types with a feed
    pub fn get_collaterals(&self) -> Vec<CollateralType> {
        self.feeds.keys().copied().collect()
    }
}

/// Extract `(price, confidence)` from a Hermes `latest` response.
pub fn parse_hermes_price(price_response: &serde_json::Value) -> Result<(Decimal, Decimal)> {
    let parsed = price_response
        .get("parsed")
        .and_then(|p| p.as_array())
        .and_then(|arr| arr.first())
        .and_then(|item| item.get("price"))
        .ok_or_else(|| anyhow!("Invalid response format"))?;

    let price_str = parsed
        .get("price")
        .and_then(|p| p.as_str())
        .ok_or_else(|| anyhow!("Missing price field"))?;

    let expo = parsed
        .get("expo")
        .and_then(|e| e.as_i64())
        .ok_or_else(|| anyhow!("Missing expo field"))?;

    let conf_str = parsed
        .get("conf")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow!("Missing conf field"))?;

    let price_i64: i64 = price_str.parse().context("Failed to parse price")?;
    let conf_i64: i64 = conf_str.parse().context("Failed to parse confidence")?;

    Ok((scale(price_i64, expo)?, scale(conf_i64, expo)?))
}

fn scale(mantissa: i64, expo: i64) -> Result<Decimal> {
    if expo >= 0 {
        let multiplier = 10_i64
            .checked_pow(expo as u32)
            .ok_or_else(|| anyhow!("Exponent {} out of range", expo))?;
        let value = mantissa
            .checked_mul(multiplier)
            .ok_or_else(|| anyhow!("Price overflow"))?;
        Ok(Decimal::new(value, 0))
    } else {
        let scale = u32::try_from(expo.unsigned_abs())
            .map_err(|_| anyhow!("Exponent {} out of range", expo))?;
        Decimal::try_new(mantissa, scale).map_err(|e| anyhow!("Exponent {} out of range: {}", expo, e))
    }
}
