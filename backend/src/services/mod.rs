pub mod health_monitor;
pub mod ledger_service;
pub mod ratio_calculator;

pub use health_monitor::*;
pub use ledger_service::*;
pub use ratio_calculator::*;
