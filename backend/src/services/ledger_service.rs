use crate::config::BackendConfig;
use crate::domain::{LedgerStatistics, SafeHealth, SafeSnapshot};
use crate::services::RatioCalculator;
use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use safe_ledger::{
    Address, AssetBank, Call, CollateralAssets, CollateralType, FungibleToken, Ledger, LedgerConfig,
    LedgerError, LedgerEvent, PriceBook, Safe, SafeId, SyntheticIssuer, SyntheticToken,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

pub type SafeLedger = Ledger<PriceBook, SyntheticToken, AssetBank>;

pub const SYNTHETIC_NAME: &str = "SBD Token";
pub const SYNTHETIC_SYMBOL: &str = "SBD";

/// Collateral token registered with the ledger's asset bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredToken {
    pub symbol: String,
    pub address: Address,
}

#[derive(Debug, Clone)]
pub struct TokenBalance {
    pub symbol: String,
    pub token: Address,
    pub balance: u128,
}

#[derive(Debug, Clone)]
pub struct AccountBalances {
    pub address: Address,
    pub native: u128,
    pub synthetic: u128,
    pub synthetic_allowance: u128,
    pub tokens: Vec<TokenBalance>,
}

/// Hosts one ledger in memory and serialises every call through a lock.
pub struct LedgerService {
    ledger: Arc<RwLock<SafeLedger>>,
    tokens: Vec<RegisteredToken>,
    alert_threshold_pct: u32,
    event_tx: broadcast::Sender<LedgerEvent>,
}

impl LedgerService {
    /// Deploy the synthetic token, register collateral tokens and hand mint
    /// authority to the ledger.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let ledger_config = LedgerConfig {
            liquidation_ratio: config.liquidation_ratio,
            ..LedgerConfig::default()
        };
        let deployer = Address::from_label(b"deployer");

        let mut synthetic = SyntheticToken::new(SYNTHETIC_NAME, SYNTHETIC_SYMBOL, deployer);
        synthetic
            .set_minter(deployer, ledger_config.address)
            .context("Failed to register ledger as minter")?;

        let mut bank = AssetBank::new();
        let tokens: Vec<RegisteredToken> = config
            .collateral_tokens
            .iter()
            .map(|symbol| RegisteredToken {
                symbol: symbol.clone(),
                address: token_address(symbol),
            })
            .collect();

        for token in &tokens {
            bank.register_token(
                token.address,
                FungibleToken::new(format!("{} Token", token.symbol), token.symbol.clone()),
            )
            .with_context(|| format!("Failed to register collateral token {}", token.symbol))?;
            info!("Registered collateral token {} at {}", token.symbol, token.address);
        }

        let prices = PriceBook::fixed(config.default_price);
        let ledger = Ledger::new(ledger_config, prices, synthetic, bank)
            .context("Invalid ledger configuration")?;

        let (event_tx, _) = broadcast::channel(1000);

        Ok(Self {
            ledger: Arc::new(RwLock::new(ledger)),
            tokens,
            alert_threshold_pct: config.alert_threshold_pct,
            event_tx,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LedgerEvent> {
        self.event_tx.subscribe()
    }

    pub fn tokens(&self) -> &[RegisteredToken] {
        &self.tokens
    }

    pub fn alert_threshold_pct(&self) -> u32 {
        self.alert_threshold_pct
    }

    pub async fn ledger_address(&self) -> Address {
        self.ledger.read().await.address()
    }

    pub async fn liquidation_ratio(&self) -> u128 {
        self.ledger.read().await.config().liquidation_ratio
    }

    /// Collateral types the service knows about: native plus every registered token.
    pub fn collaterals(&self) -> Vec<CollateralType> {
        std::iter::once(CollateralType::Native)
            .chain(self.tokens.iter().map(|t| CollateralType::Token(t.address)))
            .collect()
    }

    // Transitions

    pub async fn open_safe(
        &self,
        owner: Address,
        collateral: CollateralType,
        amount: u128,
        value: u128,
        reserve_ratio: u128,
    ) -> Result<SafeSnapshot> {
        let mut ledger = self.ledger.write().await;
        ledger.open_safe(
            Call::new(owner).with_value(value),
            collateral,
            amount,
            reserve_ratio,
        )?;
        self.publish_events(&mut ledger);

        self.snapshot_of(&ledger, &owner, &collateral)
    }

    pub async fn borrow(
        &self,
        owner: Address,
        collateral: CollateralType,
        amount: u128,
    ) -> Result<SafeSnapshot> {
        let mut ledger = self.ledger.write().await;
        ledger.borrow(Call::new(owner), collateral, amount)?;
        self.publish_events(&mut ledger);

        self.snapshot_of(&ledger, &owner, &collateral)
    }

    pub async fn repay(
        &self,
        owner: Address,
        collateral: CollateralType,
        amount: u128,
    ) -> Result<SafeSnapshot> {
        let mut ledger = self.ledger.write().await;
        ledger.repay(Call::new(owner), collateral, amount)?;
        self.publish_events(&mut ledger);

        self.snapshot_of(&ledger, &owner, &collateral)
    }

    /// Close the safe and return `(safe_id, returned_amount)`.
    pub async fn close_safe(&self, owner: Address, collateral: CollateralType) -> Result<(SafeId, u128)> {
        let mut ledger = self.ledger.write().await;
        let returned = ledger.close_safe(Call::new(owner), collateral)?;
        self.publish_events(&mut ledger);

        Ok((SafeId::derive(&owner, &collateral), returned))
    }

    // Queries

    pub async fn get_safe(&self, owner: &Address, collateral: &CollateralType) -> Result<SafeSnapshot> {
        let ledger = self.ledger.read().await;
        self.snapshot_of(&ledger, owner, collateral)
    }

    /// Every safe, optionally for one owner, ordered by owner then collateral.
    pub async fn list_safes(&self, owner: Option<Address>) -> Vec<SafeSnapshot> {
        let ledger = self.ledger.read().await;

        let mut safes: Vec<&Safe> = match owner {
            Some(owner) => ledger.safes_of(owner).collect(),
            None => ledger.safes().collect(),
        };
        safes.sort_by_key(|safe| (safe.owner, safe.collateral));

        safes
            .into_iter()
            .map(|safe| self.snapshot(&ledger, safe))
            .collect()
    }

    pub async fn statistics(&self) -> LedgerStatistics {
        let ledger = self.ledger.read().await;

        let custody: BTreeMap<CollateralType, u128> = ledger
            .custody_totals()
            .map(|(collateral, amount)| (*collateral, *amount))
            .collect();

        LedgerStatistics {
            total_safes: ledger.safes().count(),
            safes_with_debt: ledger.safes().filter(|safe| safe.has_debt()).count(),
            total_debt: ledger.total_debt(),
            synthetic_supply: ledger.issuer().total_supply(),
            custody: custody.into_iter().collect(),
        }
    }

    /// Current ledger price for each known collateral type.
    pub async fn prices(&self) -> Vec<(CollateralType, Option<u128>)> {
        let ledger = self.ledger.read().await;
        self.collaterals()
            .into_iter()
            .map(|collateral| (collateral, ledger.price(&collateral).ok()))
            .collect()
    }

    pub async fn set_price(&self, collateral: CollateralType, price: u128) {
        let mut ledger = self.ledger.write().await;
        ledger.price_source_mut().set_price(collateral, price);
        debug!("Ledger price for {} set to {}", collateral, price);
    }

    /// Convert an oracle quote and store it as the ledger price.
    pub async fn apply_oracle_price(&self, collateral: CollateralType, quote: Decimal) -> Result<u128> {
        let price = RatioCalculator::to_ledger_price(quote)
            .with_context(|| format!("Unusable oracle quote for {}", collateral))?;
        self.set_price(collateral, price).await;
        Ok(price)
    }

    // Devnet account operations

    /// Credit native value, or mint a registered collateral token, to `account`.
    pub async fn faucet(&self, account: Address, collateral: CollateralType, amount: u128) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        match collateral {
            CollateralType::Native => ledger.assets_mut().credit_native(account, amount)?,
            CollateralType::Token(token) => ledger.assets_mut().token_mut(&token)?.mint(account, amount)?,
        }

        info!("Faucet credited {} of {} to {}", amount, collateral, account);
        Ok(())
    }

    /// Let the ledger pull `amount` of a collateral token from `owner`.
    pub async fn approve_collateral(&self, owner: Address, token: Address, amount: u128) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        let spender = ledger.address();
        ledger
            .assets_mut()
            .token_mut(&token)?
            .approve(owner, spender, amount);

        debug!("{} approved ledger for {} of {}", owner, amount, token);
        Ok(())
    }

    /// Let the ledger burn `amount` of `owner`'s synthetic balance on repay.
    pub async fn approve_synthetic(&self, owner: Address, amount: u128) {
        let mut ledger = self.ledger.write().await;
        let spender = ledger.address();
        ledger.issuer_mut().approve(owner, spender, amount);

        debug!("{} approved ledger for {} {}", owner, amount, SYNTHETIC_SYMBOL);
    }

    pub async fn balances(&self, account: Address) -> AccountBalances {
        let ledger = self.ledger.read().await;
        let spender = ledger.address();

        let tokens = self
            .tokens
            .iter()
            .map(|token| TokenBalance {
                symbol: token.symbol.clone(),
                token: token.address,
                balance: ledger
                    .assets()
                    .balance_of(&CollateralType::Token(token.address), &account),
            })
            .collect();

        AccountBalances {
            address: account,
            native: ledger.assets().native_balance(&account),
            synthetic: ledger.issuer().balance_of(&account),
            synthetic_allowance: ledger.issuer().token().allowance(&account, &spender),
            tokens,
        }
    }

    fn publish_events(&self, ledger: &mut SafeLedger) {
        for event in ledger.take_events() {
            debug!("Ledger event for safe {}", event.safe_id());
            // No subscribers is fine
            let _ = self.event_tx.send(event);
        }
    }

    fn snapshot_of(
        &self,
        ledger: &SafeLedger,
        owner: &Address,
        collateral: &CollateralType,
    ) -> Result<SafeSnapshot> {
        let safe = ledger
            .safe(owner, collateral)
            .ok_or_else(|| LedgerError::UnknownPosition(SafeId::derive(owner, collateral)))?;

        Ok(self.snapshot(ledger, safe))
    }

    /// Presentation fields that do not fit a `Decimal` are left empty; the
    /// committed safe is always reported.
    fn snapshot(&self, ledger: &SafeLedger, safe: &Safe) -> SafeSnapshot {
        let liquidation_ratio = ledger.config().liquidation_ratio;
        let price = ledger.price(&safe.collateral).ok();

        let collateral_value = price.and_then(|price| {
            RatioCalculator::calculate_collateral_value(safe.deposited_amount, price).ok()
        });
        let collateral_ratio = price.and_then(|price| {
            RatioCalculator::calculate_collateral_ratio(
                safe.deposited_amount,
                price,
                safe.borrowed_amount,
            )
            .ok()
            .flatten()
        });

        let health_factor = collateral_ratio.and_then(|ratio| {
            RatioCalculator::calculate_health_factor(ratio, liquidation_ratio).ok()
        });

        let liquidation_price = RatioCalculator::calculate_liquidation_price(
            safe.deposited_amount,
            safe.borrowed_amount,
            liquidation_ratio,
        )
        .ok()
        .flatten();

        let health = self.health_of(ledger, safe, price, collateral_ratio);

        SafeSnapshot {
            safe_id: safe.id(),
            owner: safe.owner,
            collateral: safe.collateral,
            deposited_amount: safe.deposited_amount,
            borrowed_amount: safe.borrowed_amount,
            reserve_ratio: safe.reserve_ratio,
            price,
            collateral_value,
            collateral_ratio,
            health_factor,
            max_borrowable: ledger.max_borrowable(&safe.owner, &safe.collateral).ok(),
            liquidation_price,
            health,
            updated_at: Utc::now(),
        }
    }

    fn health_of(
        &self,
        ledger: &SafeLedger,
        safe: &Safe,
        price: Option<u128>,
        collateral_ratio: Option<Decimal>,
    ) -> SafeHealth {
        if !safe.has_debt() {
            return SafeHealth::Unborrowed;
        }
        if price.is_none() {
            return SafeHealth::Unpriced;
        }

        // Integer ratio from the ledger when the decimal one overflowed
        let ratio = collateral_ratio.or_else(|| {
            ledger
                .collateral_ratio(&safe.owner, &safe.collateral)
                .ok()
                .flatten()
                .and_then(|ratio| RatioCalculator::to_decimal(ratio).ok())
        });

        match ratio.map(|ratio| {
            RatioCalculator::classify(
                Some(ratio),
                ledger.config().liquidation_ratio,
                self.alert_threshold_pct,
            )
        }) {
            Some(Ok(health)) => health,
            _ => {
                warn!("Safe {} is too large to evaluate", safe.id());
                SafeHealth::Unmeasurable
            }
        }
    }
}

/// Deterministic address for a collateral token symbol.
pub fn token_address(symbol: &str) -> Address {
    Address::from_label(format!("collateral-token:{}", symbol).as_bytes())
}
