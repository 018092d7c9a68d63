/// Denominator of every percentage the ledger stores (ratios are whole percents).
pub const PERCENT_PRECISION: u128 = 100;

/// Minimum collateral value to debt value, in percent, that every borrow must keep.
pub const LIQUIDATION_RATIO: u128 = 110;

/// Lowest liquidation ratio a ledger may be configured with.
/// Below 100% the synthetic supply could exceed the collateral backing it.
pub const MIN_LIQUIDATION_RATIO: u128 = PERCENT_PRECISION;

/// Placeholder price (synthetic units per collateral unit) used until a real feed is wired in.
pub const DEFAULT_PRICE: u128 = 1_000;

/// Label hashed into the default ledger identity.
pub const LEDGER_ADDRESS_SEED: &[u8] = b"safe-ledger";

pub const ADDRESS_LENGTH: usize = 20;
pub const SAFE_ID_LENGTH: usize = 32;
