use std::collections::HashMap;

use tracing::{debug, info, warn};

/// Return `$err` from the enclosing function unless `$cond` holds.
macro_rules! require {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}

pub mod bank;
pub mod constants;
pub mod errors;
pub mod instructions;
pub mod interfaces;
pub mod oracle;
pub mod state;
pub mod token;
pub mod utils;

pub use bank::AssetBank;
pub use errors::{AssetError, LedgerError, Result};
pub use instructions::*;
pub use interfaces::{CollateralAssets, PriceSource, SyntheticIssuer};
pub use oracle::PriceBook;
pub use state::*;
pub use token::{FungibleToken, SyntheticToken};

use utils::{calculate_collateral_ratio, calculate_max_debt, is_debt_covered};

/// The position ledger. Owns every safe and is the only writer of them.
///
/// Each entry point is a complete transition: it either commits every effect
/// (safe record, totals, asset movements, event) or returns an error with none
/// of them applied. Bookkeeping is written before the collaborator is called and
/// rolled back if the collaborator rejects the movement.
#[derive(Debug)]
pub struct Ledger<P, S, A> {
    config: LedgerConfig,
    safes: HashMap<SafeId, Safe>,
    custody: HashMap<CollateralType, u128>,
    total_debt: u128,
    events: Vec<LedgerEvent>,
    price_source: P,
    issuer: S,
    assets: A,
}

impl<P, S, A> Ledger<P, S, A>
where
    P: PriceSource,
    S: SyntheticIssuer,
    A: CollateralAssets,
{
    pub fn new(config: LedgerConfig, price_source: P, issuer: S, assets: A) -> Result<Self> {
        config.validate()?;

        info!(
            "Ledger {} initialized with liquidation ratio {}%",
            config.address, config.liquidation_ratio
        );

        Ok(Self {
            config,
            safes: HashMap::new(),
            custody: HashMap::new(),
            total_debt: 0,
            events: Vec::new(),
            price_source,
            issuer,
            assets,
        })
    }

    /// Lock collateral into the caller's safe for `collateral`, creating it if needed.
    ///
    /// Native collateral must arrive as the call's attached value; token collateral is
    /// pulled with the allowance the caller granted the ledger. Opening an existing
    /// safe adds to its deposit and records the new reserve ratio.
    pub fn open_safe(
        &mut self,
        call: Call,
        collateral: CollateralType,
        amount: u128,
        reserve_ratio: u128,
    ) -> Result<SafeId> {
        self.ensure_collateral(&collateral)?;
        require!(
            amount > 0,
            LedgerError::InvalidDeposit {
                declared: amount,
                received: call.value,
            }
        );

        let expected_value = if collateral.is_native() { amount } else { 0 };
        require!(
            call.value == expected_value,
            LedgerError::InvalidDeposit {
                declared: expected_value,
                received: call.value,
            }
        );

        let safe_id = SafeId::derive(&call.sender, &collateral);
        let prior = self.safes.get(&safe_id).cloned();

        let deposited_amount = match &prior {
            Some(safe) => safe
                .deposited_amount
                .checked_add(amount)
                .ok_or(LedgerError::ArithmeticOverflow)?,
            None => amount,
        };

        let prior_custody = self.custody(&collateral);
        let custody = prior_custody
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        self.safes.insert(
            safe_id,
            Safe {
                owner: call.sender,
                collateral,
                deposited_amount,
                borrowed_amount: prior.as_ref().map_or(0, |safe| safe.borrowed_amount),
                reserve_ratio,
            },
        );
        self.set_custody(collateral, custody);

        if let Err(e) = self.take_collateral(call.sender, collateral, amount) {
            warn!("Collateral deposit into {} rejected: {}", safe_id, e);
            match prior {
                Some(safe) => self.safes.insert(safe_id, safe),
                None => self.safes.remove(&safe_id),
            };
            self.set_custody(collateral, prior_custody);
            return Err(e.into());
        }

        let event = if prior.is_some() {
            LedgerEvent::from(CollateralAdded {
                safe_id,
                owner: call.sender,
                collateral,
                amount,
                deposited_amount,
                reserve_ratio,
            })
        } else {
            LedgerEvent::from(SafeOpened {
                safe_id,
                owner: call.sender,
                collateral,
                deposited_amount,
                reserve_ratio,
            })
        };
        self.events.push(event);

        info!(
            "Safe {} for {} holds {} of {} (reserve ratio {}%)",
            safe_id, call.sender, deposited_amount, collateral, reserve_ratio
        );

        Ok(safe_id)
    }

    /// Mint `amount` of the synthetic asset to the caller against their safe.
    ///
    /// The limit is recomputed from the live price on every call: the new total debt
    /// must satisfy deposited × price × 100 ≥ debt × liquidation_ratio.
    pub fn borrow(&mut self, call: Call, collateral: CollateralType, amount: u128) -> Result<()> {
        self.ensure_collateral(&collateral)?;
        require!(amount > 0, LedgerError::InvalidAmount);
        self.ensure_no_value(&call)?;

        let safe_id = SafeId::derive(&call.sender, &collateral);
        let (deposited_amount, prior_debt) = {
            let safe = self.safe_by_id(&safe_id).ok_or(LedgerError::UnknownPosition(safe_id))?;
            (safe.deposited_amount, safe.borrowed_amount)
        };

        let price = self.price(&collateral)?;

        let new_debt = prior_debt
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;
        let total_debt = self
            .total_debt
            .checked_add(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        let liquidation_ratio = self.config.liquidation_ratio;
        debug!(
            "Borrow check for {}: deposited={}, price={}, debt {} -> {}, ratio={}%",
            safe_id, deposited_amount, price, prior_debt, new_debt, liquidation_ratio
        );

        if !is_debt_covered(deposited_amount, price, new_debt, liquidation_ratio)? {
            let max_debt = calculate_max_debt(deposited_amount, price, liquidation_ratio)?;
            let available = max_debt.saturating_sub(prior_debt);
            warn!(
                "Borrow of {} against {} rejected, headroom is {}",
                amount, safe_id, available
            );
            return Err(LedgerError::InsufficientCollateral {
                requested: amount,
                available,
            });
        }

        self.set_debt(&safe_id, new_debt, total_debt);

        if let Err(e) = self.issuer.mint(self.config.address, call.sender, amount) {
            warn!("Mint for {} rejected: {}", safe_id, e);
            self.set_debt(&safe_id, prior_debt, self.total_debt - amount);
            return Err(e.into());
        }

        self.events.push(
            Borrowed {
                safe_id,
                owner: call.sender,
                amount,
                borrowed_amount: new_debt,
                price,
            }
            .into(),
        );

        info!(
            "Safe {} borrowed {} at price {} (debt now {})",
            safe_id, amount, price, new_debt
        );

        Ok(())
    }

    /// Burn `amount` of the caller's synthetic balance and reduce their debt by the same.
    /// The caller must have approved the ledger for at least `amount`.
    pub fn repay(&mut self, call: Call, collateral: CollateralType, amount: u128) -> Result<()> {
        self.ensure_collateral(&collateral)?;
        require!(amount > 0, LedgerError::InvalidAmount);
        self.ensure_no_value(&call)?;

        let safe_id = SafeId::derive(&call.sender, &collateral);
        let prior_debt = self
            .safe_by_id(&safe_id)
            .ok_or(LedgerError::UnknownPosition(safe_id))?
            .borrowed_amount;

        require!(
            amount <= prior_debt,
            LedgerError::RepayExceedsDebt {
                requested: amount,
                outstanding: prior_debt,
            }
        );

        let new_debt = prior_debt - amount;
        let total_debt = self
            .total_debt
            .checked_sub(amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        self.set_debt(&safe_id, new_debt, total_debt);

        if let Err(e) = self.issuer.burn_from(self.config.address, call.sender, amount) {
            warn!("Repayment into {} rejected: {}", safe_id, e);
            self.set_debt(&safe_id, prior_debt, self.total_debt + amount);
            return Err(e.into());
        }

        self.events.push(
            Repaid {
                safe_id,
                owner: call.sender,
                amount,
                borrowed_amount: new_debt,
            }
            .into(),
        );

        info!("Safe {} repaid {} (debt now {})", safe_id, amount, new_debt);

        Ok(())
    }

    /// Return the whole deposit to the owner and delete the safe. Debt must be zero.
    pub fn close_safe(&mut self, call: Call, collateral: CollateralType) -> Result<u128> {
        self.ensure_collateral(&collateral)?;
        self.ensure_no_value(&call)?;

        let safe_id = SafeId::derive(&call.sender, &collateral);
        let safe = self
            .safe_by_id(&safe_id)
            .ok_or(LedgerError::UnknownPosition(safe_id))?;

        require!(
            !safe.has_debt(),
            LedgerError::DebtOutstanding(safe.borrowed_amount)
        );

        let returned_amount = safe.deposited_amount;
        let prior_custody = self.custody(&collateral);
        let custody = prior_custody
            .checked_sub(returned_amount)
            .ok_or(LedgerError::ArithmeticOverflow)?;

        let safe = self
            .safes
            .remove(&safe_id)
            .ok_or(LedgerError::UnknownPosition(safe_id))?;
        self.set_custody(collateral, custody);

        if let Err(e) = self.release_collateral(call.sender, collateral, returned_amount) {
            warn!("Collateral release from {} rejected: {}", safe_id, e);
            self.safes.insert(safe_id, safe);
            self.set_custody(collateral, prior_custody);
            return Err(e.into());
        }

        self.events.push(
            SafeClosed {
                safe_id,
                owner: call.sender,
                collateral,
                returned_amount,
            }
            .into(),
        );

        info!(
            "Safe {} closed, returned {} of {} to {}",
            safe_id, returned_amount, collateral, call.sender
        );

        Ok(returned_amount)
    }

    // Queries

    pub fn safe(&self, owner: &Address, collateral: &CollateralType) -> Option<&Safe> {
        self.safe_by_id(&SafeId::derive(owner, collateral))
    }

    pub fn safe_by_id(&self, safe_id: &SafeId) -> Option<&Safe> {
        self.safes.get(safe_id)
    }

    pub fn safes(&self) -> impl Iterator<Item = &Safe> {
        self.safes.values()
    }

    pub fn safes_of(&self, owner: Address) -> impl Iterator<Item = &Safe> + '_ {
        self.safes.values().filter(move |safe| safe.owner == owner)
    }

    /// Current price of `collateral`; zero or missing quotes are unavailable.
    pub fn price(&self, collateral: &CollateralType) -> Result<u128> {
        self.price_source
            .price(collateral)
            .filter(|price| *price > 0)
            .ok_or(LedgerError::PriceUnavailable(*collateral))
    }

    /// Live collateral ratio of a safe in percent, `None` while it has no debt.
    pub fn collateral_ratio(&self, owner: &Address, collateral: &CollateralType) -> Result<Option<u128>> {
        let safe = self.require_safe(owner, collateral)?;
        if !safe.has_debt() {
            return Ok(None);
        }

        let price = self.price(collateral)?;
        calculate_collateral_ratio(safe.deposited_amount, price, safe.borrowed_amount)
    }

    /// How much more the safe could borrow at the current price.
    pub fn max_borrowable(&self, owner: &Address, collateral: &CollateralType) -> Result<u128> {
        let safe = self.require_safe(owner, collateral)?;
        let price = self.price(collateral)?;
        let max_debt = calculate_max_debt(
            safe.deposited_amount,
            price,
            self.config.liquidation_ratio,
        )?;

        Ok(max_debt.saturating_sub(safe.borrowed_amount))
    }

    /// Sum of the debt of every safe; equals the synthetic supply this ledger has issued.
    pub fn total_debt(&self) -> u128 {
        self.total_debt
    }

    /// Collateral of one type held in custody across all safes.
    pub fn custody(&self, collateral: &CollateralType) -> u128 {
        self.custody.get(collateral).copied().unwrap_or(0)
    }

    pub fn custody_totals(&self) -> impl Iterator<Item = (&CollateralType, &u128)> {
        self.custody.iter()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // Collaborator access. Movements made through these bypass the ledger's
    // bookkeeping and are meant for account-level actions such as approvals.

    pub fn price_source(&self) -> &P {
        &self.price_source
    }

    pub fn price_source_mut(&mut self) -> &mut P {
        &mut self.price_source
    }

    pub fn issuer(&self) -> &S {
        &self.issuer
    }

    pub fn issuer_mut(&mut self) -> &mut S {
        &mut self.issuer
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut A {
        &mut self.assets
    }

    fn require_safe(&self, owner: &Address, collateral: &CollateralType) -> Result<&Safe> {
        let safe_id = SafeId::derive(owner, collateral);
        self.safe_by_id(&safe_id)
            .ok_or(LedgerError::UnknownPosition(safe_id))
    }

    // Token(ZERO) would derive the native safe's id
    fn ensure_collateral(&self, collateral: &CollateralType) -> Result<()> {
        require!(
            collateral.is_native() || !collateral.address().is_zero(),
            LedgerError::InvalidCollateral(*collateral)
        );
        Ok(())
    }

    fn ensure_no_value(&self, call: &Call) -> Result<()> {
        require!(
            call.value == 0,
            LedgerError::InvalidDeposit {
                declared: 0,
                received: call.value,
            }
        );
        Ok(())
    }

    fn set_debt(&mut self, safe_id: &SafeId, borrowed_amount: u128, total_debt: u128) {
        if let Some(safe) = self.safes.get_mut(safe_id) {
            safe.borrowed_amount = borrowed_amount;
        }
        self.total_debt = total_debt;
    }

    fn set_custody(&mut self, collateral: CollateralType, amount: u128) {
        if amount == 0 {
            self.custody.remove(&collateral);
        } else {
            self.custody.insert(collateral, amount);
        }
    }

    fn take_collateral(
        &mut self,
        from: Address,
        collateral: CollateralType,
        amount: u128,
    ) -> std::result::Result<(), AssetError> {
        let ledger = self.config.address;
        match collateral {
            CollateralType::Native => self.assets.transfer_native(from, ledger, amount),
            CollateralType::Token(token) => {
                self.assets.transfer_from(token, ledger, from, ledger, amount)
            }
        }
    }

    fn release_collateral(
        &mut self,
        to: Address,
        collateral: CollateralType,
        amount: u128,
    ) -> std::result::Result<(), AssetError> {
        let ledger = self.config.address;
        match collateral {
            CollateralType::Native => self.assets.transfer_native(ledger, to, amount),
            CollateralType::Token(token) => self.assets.transfer(token, ledger, to, amount),
        }
    }
}
