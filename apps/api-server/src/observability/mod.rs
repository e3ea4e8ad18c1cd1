//! Observability module - security alert dispatch.

mod alert;

pub use alert::AlertDispatcher;
