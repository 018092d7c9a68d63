use serde::{Deserialize, Serialize};

use crate::state::{Address, CollateralType, SafeId};

/// Caller of a ledger entry point and the native value sent along with the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub sender: Address,
    pub value: u128,
}

impl Call {
    pub fn new(sender: Address) -> Self {
        Self { sender, value: 0 }
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }
}

// Events

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeOpened {
    pub safe_id: SafeId,
    pub owner: Address,
    pub collateral: CollateralType,
    pub deposited_amount: u128,
    pub reserve_ratio: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralAdded {
    pub safe_id: SafeId,
    pub owner: Address,
    pub collateral: CollateralType,
    pub amount: u128,
    pub deposited_amount: u128,
    pub reserve_ratio: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrowed {
    pub safe_id: SafeId,
    pub owner: Address,
    pub amount: u128,
    pub borrowed_amount: u128,
    pub price: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repaid {
    pub safe_id: SafeId,
    pub owner: Address,
    pub amount: u128,
    pub borrowed_amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeClosed {
    pub safe_id: SafeId,
    pub owner: Address,
    pub collateral: CollateralType,
    pub returned_amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    SafeOpened(SafeOpened),
    CollateralAdded(CollateralAdded),
    Borrowed(Borrowed),
    Repaid(Repaid),
    SafeClosed(SafeClosed),
}

impl LedgerEvent {
    pub fn safe_id(&self) -> SafeId {
        match self {
            LedgerEvent::SafeOpened(e) => e.safe_id,
            LedgerEvent::CollateralAdded(e) => e.safe_id,
            LedgerEvent::Borrowed(e) => e.safe_id,
            LedgerEvent::Repaid(e) => e.safe_id,
            LedgerEvent::SafeClosed(e) => e.safe_id,
        }
    }
}

macro_rules! impl_into_event {
    ($($event:ident),*) => {
        $(
            impl From<$event> for LedgerEvent {
                fn from(event: $event) -> Self {
                    LedgerEvent::$event(event)
                }
            }
        )*
    };
}

impl_into_event!(SafeOpened, CollateralAdded, Borrowed, Repaid, SafeClosed);
