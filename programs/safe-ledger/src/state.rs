use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ADDRESS_LENGTH, LEDGER_ADDRESS_SEED, LIQUIDATION_RATIO, MIN_LIQUIDATION_RATIO, SAFE_ID_LENGTH,
};
use crate::errors::{LedgerError, Result};
use crate::utils::{derive_safe_id, keccak256};

/// Serialize through `Display` and deserialize through `FromStr`,
/// so identities travel as `0x..` strings in JSON.
macro_rules! impl_string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fn decode_prefixed<const N: usize>(s: &str) -> std::result::Result<[u8; N], hex::FromHexError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let mut bytes = [0u8; N];
    hex::decode_to_slice(digits, &mut bytes)?;
    Ok(bytes)
}

/// 20-byte account identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Deterministic address for a label: the low 20 bytes of its keccak256 digest.
    pub fn from_label(label: &[u8]) -> Self {
        let digest = keccak256(&[label]);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[SAFE_ID_LENGTH - ADDRESS_LENGTH..]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        decode_prefixed(s).map(Self)
    }
}

impl_string_serde!(Address);

/// What a safe is collateralised with. Native value is addressed as the zero address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollateralType {
    Native,
    Token(Address),
}

impl CollateralType {
    pub fn address(&self) -> Address {
        match self {
            CollateralType::Native => Address::ZERO,
            CollateralType::Token(token) => *token,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, CollateralType::Native)
    }
}

impl From<Address> for CollateralType {
    fn from(address: Address) -> Self {
        if address.is_zero() {
            CollateralType::Native
        } else {
            CollateralType::Token(address)
        }
    }
}

impl fmt::Display for CollateralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.address(), f)
    }
}

impl FromStr for CollateralType {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("native") {
            return Ok(CollateralType::Native);
        }
        s.parse::<Address>().map(CollateralType::from)
    }
}

impl_string_serde!(CollateralType);

/// Key of a safe in the ledger store: keccak256 of the packed owner and collateral addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SafeId(pub [u8; SAFE_ID_LENGTH]);

impl SafeId {
    pub fn derive(owner: &Address, collateral: &CollateralType) -> Self {
        derive_safe_id(owner, collateral)
    }

    pub fn as_bytes(&self) -> &[u8; SAFE_ID_LENGTH] {
        &self.0
    }
}

impl fmt::Display for SafeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SafeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for SafeId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        decode_prefixed(s).map(Self)
    }
}

impl_string_serde!(SafeId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Safe {
    pub owner: Address,
    pub collateral: CollateralType,
    pub deposited_amount: u128,
    pub borrowed_amount: u128,
    /// Percent, as supplied on the latest open. Not enforced.
    pub reserve_ratio: u128,
}

impl Safe {
    pub fn id(&self) -> SafeId {
        SafeId::derive(&self.owner, &self.collateral)
    }

    pub fn has_debt(&self) -> bool {
        self.borrowed_amount > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Identity the ledger holds custody and mint authority under.
    pub address: Address,
    pub liquidation_ratio: u128,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            address: Address::from_label(LEDGER_ADDRESS_SEED),
            liquidation_ratio: LIQUIDATION_RATIO,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.liquidation_ratio < MIN_LIQUIDATION_RATIO {
            return Err(LedgerError::InvalidConfig(format!(
                "liquidation ratio {} is below {}",
                self.liquidation_ratio, MIN_LIQUIDATION_RATIO
            )));
        }
        if self.address.is_zero() {
            return Err(LedgerError::InvalidConfig(
                "ledger address cannot be the zero address".to_string(),
            ));
        }
        Ok(())
    }
}
