//! Domain types - pure admission logic with no I/O.

pub mod cors;
pub mod decision;
pub mod identity;
pub mod policy;
pub mod versioning;
pub mod window;

pub use cors::{ContentSecurityPolicy, CorsPolicy, Environment, OriginPattern};
pub use decision::AdmissionDecision;
pub use identity::CallerIdentity;
pub use policy::{DEFAULT_POLICY_KEY, MatchedPolicy, PolicyConfig, PolicyTable};
pub use versioning::{CURRENT_API_VERSION, SUPPORTED_API_VERSIONS, VersionRoute};
pub use window::{RateLimitKey, WindowState};
