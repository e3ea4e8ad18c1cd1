//! Middleware modules.
//!
//! Registered innermost first: admission, then version routing, then
//! security headers, so preflights and version errors never reach admission.

pub mod api_version;
pub mod error;
pub mod rate_limit;
pub mod security;

pub use api_version::ApiVersion;
pub use rate_limit::RateLimitMiddleware;
pub use security::SecurityHeaders;
