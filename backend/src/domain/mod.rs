pub mod safe;

pub use safe::*;
