use thiserror::Error;

use crate::state::{Address, CollateralType, SafeId};

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid deposit: declared {declared}, received {received}")]
    InvalidDeposit { declared: u128, received: u128 },

    #[error("Amount must be greater than 0")]
    InvalidAmount,

    #[error("Asset transfer failed: {0}")]
    TransferFailed(#[from] AssetError),

    #[error("No open safe {0}")]
    UnknownPosition(SafeId),

    #[error("Insufficient collateral: requested {requested}, can borrow at most {available}")]
    InsufficientCollateral { requested: u128, available: u128 },

    #[error("Repay amount {requested} exceeds outstanding debt {outstanding}")]
    RepayExceedsDebt { requested: u128, outstanding: u128 },

    #[error("Safe still owes {0}")]
    DebtOutstanding(u128),

    #[error("Collateral {0} uses the zero address, which is reserved for native value")]
    InvalidCollateral(CollateralType),

    #[error("No valid price for collateral {0}")]
    PriceUnavailable(CollateralType),

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Rejections raised by the asset collaborators (collateral tokens, native value, synthetic token).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("{account} holds {available}, needs {needed}")]
    InsufficientBalance {
        account: Address,
        needed: u128,
        available: u128,
    },

    #[error("{spender} may spend {available} for {owner}, needs {needed}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        needed: u128,
        available: u128,
    },

    #[error("{0} is not authorized")]
    Unauthorized(Address),

    #[error("Unknown token {0}")]
    UnknownToken(Address),

    #[error("The zero address cannot be registered as a token")]
    ZeroAddressToken,

    #[error("Balance overflow")]
    Overflow,
}
