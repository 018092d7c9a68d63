use sha3::{Digest, Keccak256};

use crate::constants::{PERCENT_PRECISION, SAFE_ID_LENGTH};
use crate::errors::{LedgerError, Result};
use crate::state::{Address, CollateralType, SafeId};

/// Keccak256 over the concatenation of `parts`.
pub fn keccak256(parts: &[&[u8]]) -> [u8; SAFE_ID_LENGTH] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Derive the safe id for an owner and collateral type.
/// Packed encoding: owner (20 bytes) followed by the collateral address (20 bytes).
pub fn derive_safe_id(owner: &Address, collateral: &CollateralType) -> SafeId {
    let collateral_address = collateral.address();
    SafeId(keccak256(&[
        owner.as_bytes().as_slice(),
        collateral_address.as_bytes().as_slice(),
    ]))
}

/// Collateral Value = deposited × price, in synthetic units
pub fn calculate_collateral_value(deposited: u128, price: u128) -> Result<u128> {
    deposited
        .checked_mul(price)
        .ok_or(LedgerError::ArithmeticOverflow)
}

/// Maximum total debt a deposit supports at `price`.
/// Formula: deposited × price × 100 / liquidation_ratio (multiply before dividing)
pub fn calculate_max_debt(deposited: u128, price: u128, liquidation_ratio: u128) -> Result<u128> {
    calculate_collateral_value(deposited, price)?
        .checked_mul(PERCENT_PRECISION)
        .ok_or(LedgerError::ArithmeticOverflow)?
        .checked_div(liquidation_ratio)
        .ok_or(LedgerError::ArithmeticOverflow)
}

/// Whether `debt` is covered: deposited × price × 100 ≥ debt × liquidation_ratio.
/// Compared without division so no precision is lost.
pub fn is_debt_covered(
    deposited: u128,
    price: u128,
    debt: u128,
    liquidation_ratio: u128,
) -> Result<bool> {
    let cover = calculate_collateral_value(deposited, price)?
        .checked_mul(PERCENT_PRECISION)
        .ok_or(LedgerError::ArithmeticOverflow)?;

    let required = debt
        .checked_mul(liquidation_ratio)
        .ok_or(LedgerError::ArithmeticOverflow)?;

    Ok(cover >= required)
}

/// Collateral Ratio = deposited × price × 100 / debt, in percent.
/// `None` while there is no debt.
pub fn calculate_collateral_ratio(deposited: u128, price: u128, debt: u128) -> Result<Option<u128>> {
    if debt == 0 {
        return Ok(None);
    }

    let ratio = calculate_collateral_value(deposited, price)?
        .checked_mul(PERCENT_PRECISION)
        .ok_or(LedgerError::ArithmeticOverflow)?
        / debt;

    Ok(Some(ratio))
}
