//! Caller identity derived from proxy headers.

use std::fmt;

/// Header carrying the proxy chain, client first.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Header set by the edge proxy with the client address.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Shared bucket for callers that cannot be identified.
pub const UNKNOWN_CALLER: &str = "unknown";

/// Coarse, unauthenticated caller key used for abuse control.
///
/// Never persisted; one is resolved per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    /// Resolve the caller from the forwarded-for and real-ip header values.
    ///
    /// The first entry of the forwarded-for list wins, then the real-ip value,
    /// then the shared `"unknown"` bucket. Blank values are skipped.
    pub fn resolve(forwarded_for: Option<&str>, real_ip: Option<&str>) -> Self {
        let forwarded = forwarded_for
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let real_ip = real_ip.map(str::trim).filter(|value| !value.is_empty());

        let id = forwarded.or(real_ip).unwrap_or(UNKNOWN_CALLER);
        Self(id.to_string())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CALLER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CALLER
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_forwarded_address_wins() {
        let id = CallerIdentity::resolve(Some("203.0.113.7, 10.0.0.1, 10.0.0.2"), Some("10.9.9.9"));
        assert_eq!(id.as_str(), "203.0.113.7");
    }

    #[test]
    fn test_falls_back_to_real_ip() {
        let id = CallerIdentity::resolve(None, Some("198.51.100.4"));
        assert_eq!(id.as_str(), "198.51.100.4");

        let id = CallerIdentity::resolve(Some("  "), Some("198.51.100.4"));
        assert_eq!(id.as_str(), "198.51.100.4");
    }

    #[test]
    fn test_unidentifiable_callers_share_bucket() {
        let id = CallerIdentity::resolve(None, None);
        assert!(id.is_unknown());

        let id = CallerIdentity::resolve(Some(""), Some(""));
        assert_eq!(id, CallerIdentity::unknown());
    }
}
