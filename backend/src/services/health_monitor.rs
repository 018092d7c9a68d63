use crate::config::BackendConfig;
use crate::domain::{SafeHealth, SafeSnapshot};
use crate::infrastructure::OracleClient;
use crate::services::LedgerService;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use safe_ledger::{Address, CollateralType, SafeId};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// Price update event
#[derive(Debug, Clone)]
pub struct PriceUpdate {
    pub collateral: CollateralType,
    pub oracle_price: Decimal,
    pub ledger_price: u128,
    pub timestamp: DateTime<Utc>,
}

/// Raised for every safe within the alert threshold of (or below) the liquidation ratio
#[derive(Debug, Clone)]
pub struct HealthAlert {
    pub safe_id: SafeId,
    pub owner: Address,
    pub collateral: CollateralType,
    pub health: SafeHealth,
    pub collateral_ratio: Option<Decimal>,
    pub liquidation_price: Option<Decimal>,
    pub current_price: Option<u128>,
    pub timestamp: DateTime<Utc>,
}

impl From<&SafeSnapshot> for HealthAlert {
    fn from(snapshot: &SafeSnapshot) -> Self {
        Self {
            safe_id: snapshot.safe_id,
            owner: snapshot.owner,
            collateral: snapshot.collateral,
            health: snapshot.health,
            collateral_ratio: snapshot.collateral_ratio,
            liquidation_price: snapshot.liquidation_price,
            current_price: snapshot.price,
            timestamp: Utc::now(),
        }
    }
}

/// Monitoring configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub price_refresh_interval_ms: u64,
    pub health_scan_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            price_refresh_interval_ms: 5000,
            health_scan_interval_ms: 2000,
        }
    }
}

impl From<&BackendConfig> for MonitorConfig {
    fn from(config: &BackendConfig) -> Self {
        Self {
            price_refresh_interval_ms: config.price_refresh_interval_ms,
            health_scan_interval_ms: config.health_scan_interval_ms,
        }
    }
}

/// Health Monitor
/// Feeds oracle prices into the ledger and watches every safe's collateral ratio.
pub struct HealthMonitor {
    service: Arc<LedgerService>,
    oracle_client: Option<Arc<OracleClient>>,
    config: MonitorConfig,
    alert_tx: broadcast::Sender<HealthAlert>,
    price_update_tx: broadcast::Sender<PriceUpdate>,
    running: Arc<RwLock<bool>>,
}

impl HealthMonitor {
    pub fn new(
        service: Arc<LedgerService>,
        oracle_client: Option<Arc<OracleClient>>,
        config: MonitorConfig,
    ) -> Self {
        let (alert_tx, _) = broadcast::channel(1000);
        let (price_update_tx, _) = broadcast::channel(100);

        Self {
            service,
            oracle_client,
            config,
            alert_tx,
            price_update_tx,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<HealthAlert> {
        self.alert_tx.subscribe()
    }

    pub fn subscribe_prices(&self) -> broadcast::Receiver<PriceUpdate> {
        self.price_update_tx.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.write().await;
        if *running {
            return Err(anyhow!("Monitor already running"));
        }
        *running = true;
        drop(running);

        info!("Starting health monitor");

        if self.oracle_client.is_some() {
            self.spawn_price_refresher();
        } else {
            info!("No oracle configured, ledger keeps its fallback prices");
        }
        self.spawn_health_scanner();

        Ok(())
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("Health monitor stopped");
    }

    fn spawn_price_refresher(&self) {
        let monitor = self.clone_for_task();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(
                monitor.config.price_refresh_interval_ms,
            ));

            loop {
                if !*monitor.running.read().await {
                    break;
                }

                ticker.tick().await;

                if let Err(e) = monitor.refresh_prices().await {
                    error!("Failed to refresh prices: {}", e);
                }
            }

            info!("Price refresher stopped");
        });
    }

    fn spawn_health_scanner(&self) {
        let monitor = self.clone_for_task();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(
                monitor.config.health_scan_interval_ms,
            ));

            loop {
                if !*monitor.running.read().await {
                    break;
                }

                ticker.tick().await;

                if let Err(e) = monitor.scan_health().await {
                    error!("Failed to scan safe health: {}", e);
                }
            }

            info!("Health scanner stopped");
        });
    }

    /// Pull the latest quote for every configured feed into the ledger.
    /// Returns how many collateral types were updated.
    pub async fn refresh_prices(&self) -> Result<usize> {
        let oracle = self
            .oracle_client
            .as_ref()
            .ok_or_else(|| anyhow!("No oracle configured"))?;

        let mut updated = 0;
        for collateral in oracle.get_collaterals() {
            let quote = match oracle.fetch_price(&collateral).await {
                Ok(quote) => quote,
                Err(e) => {
                    error!("Failed to fetch price for {}: {}", collateral, e);
                    continue;
                }
            };

            match self.service.apply_oracle_price(collateral, quote).await {
                Ok(ledger_price) => {
                    debug!("Price update: {} = {} ({})", collateral, ledger_price, quote);
                    updated += 1;

                    // No subscribers is fine
                    let _ = self.price_update_tx.send(PriceUpdate {
                        collateral,
                        oracle_price: quote,
                        ledger_price,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => error!("Failed to apply price for {}: {}", collateral, e),
            }
        }

        Ok(updated)
    }

    /// Evaluate every safe once and broadcast alerts for those needing attention.
    pub async fn scan_health(&self) -> Result<Vec<HealthAlert>> {
        let snapshots = self.service.list_safes(None).await;

        let alerts: Vec<HealthAlert> = snapshots
            .iter()
            .filter(|snapshot| snapshot.needs_attention())
            .map(HealthAlert::from)
            .collect();

        for alert in &alerts {
            warn!(
                "Safe {} is {:?}: ratio {:?}, liquidation price {:?}, price {:?}",
                alert.safe_id,
                alert.health,
                alert.collateral_ratio,
                alert.liquidation_price,
                alert.current_price
            );
            let _ = self.alert_tx.send(alert.clone());
        }

        debug!(
            "Health scan checked {} safes, {} need attention",
            snapshots.len(),
            alerts.len()
        );

        Ok(alerts)
    }

    fn clone_for_task(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            oracle_client: self.oracle_client.clone(),
            config: self.config.clone(),
            alert_tx: self.alert_tx.clone(),
            price_update_tx: self.price_update_tx.clone(),
            running: Arc::clone(&self.running),
        }
    }
}
