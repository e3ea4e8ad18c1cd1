//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod alert;
mod rate_limit;

pub use alert::{AlertSender, SecurityAlert};
pub use rate_limit::CounterStore;
