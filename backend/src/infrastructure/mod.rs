pub mod oracle_client;

pub use oracle_client::*;
