//! Rate-limit policy table.
//!
//! Quotas are keyed by route prefix and resolved once per request:
//! exact match first, then the longest declared prefix, then `default`.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::PolicyError;

/// Key of the mandatory fallback entry.
pub const DEFAULT_POLICY_KEY: &str = "default";

/// Quota applied to one route bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Requests admitted per window.
    pub requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl PolicyConfig {
    pub const fn new(requests: u32, window_ms: u64) -> Self {
        Self {
            requests,
            window_ms,
        }
    }

    pub fn per_window(requests: u32, window: Duration) -> Self {
        Self::new(requests, window.as_millis() as u64)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// A policy matched for a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedPolicy<'a> {
    /// The policy key that matched; this is the counter bucket.
    pub bucket: &'a str,
    pub policy: PolicyConfig,
}

/// Immutable route-prefix → quota table, validated at construction.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    default: PolicyConfig,
    exact: HashMap<String, PolicyConfig>,
    /// Prefixes sorted longest first.
    prefixes: Vec<(String, PolicyConfig)>,
}

impl PolicyTable {
    /// Build a table from `(key, policy)` entries.
    ///
    /// Fails if the `default` entry is missing, a key is empty, or a quota is zero.
    pub fn new<I, K>(entries: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = (K, PolicyConfig)>,
        K: Into<String>,
    {
        let mut default = None;
        let mut exact = HashMap::new();

        for (key, policy) in entries {
            let key = key.into();
            if key.is_empty() {
                return Err(PolicyError::EmptyKey);
            }
            if policy.requests == 0 || policy.window_ms == 0 {
                return Err(PolicyError::ZeroQuota(key));
            }
            if key == DEFAULT_POLICY_KEY {
                default = Some(policy);
            } else {
                exact.insert(key, policy);
            }
        }

        let default = default.ok_or(PolicyError::MissingDefault)?;

        let mut prefixes: Vec<(String, PolicyConfig)> =
            exact.iter().map(|(k, p)| (k.clone(), *p)).collect();
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(Self {
            default,
            exact,
            prefixes,
        })
    }

    /// Resolve the policy governing `path`.
    pub fn resolve(&self, path: &str) -> MatchedPolicy<'_> {
        if let Some((bucket, policy)) = self.exact.get_key_value(path) {
            return MatchedPolicy {
                bucket,
                policy: *policy,
            };
        }

        self.prefixes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(bucket, policy)| MatchedPolicy {
                bucket,
                policy: *policy,
            })
            .unwrap_or(MatchedPolicy {
                bucket: DEFAULT_POLICY_KEY,
                policy: self.default,
            })
    }

    pub fn default_policy(&self) -> PolicyConfig {
        self.default
    }

    /// Number of entries, `default` included.
    pub fn len(&self) -> usize {
        self.exact.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PolicyTable {
        PolicyTable::new([
            ("default", PolicyConfig::new(100, 60_000)),
            ("/api/auth", PolicyConfig::new(20, 60_000)),
            ("/api/auth/login", PolicyConfig::new(5, 900_000)),
            ("/api/search", PolicyConfig::new(30, 60_000)),
        ])
        .unwrap()
    }

    #[test]
    fn test_exact_match() {
        let table = table();
        let matched = table.resolve("/api/auth/login");
        assert_eq!(matched.bucket, "/api/auth/login");
        assert_eq!(matched.policy.requests, 5);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = table();

        let matched = table.resolve("/api/auth/login/extra");
        assert_eq!(matched.bucket, "/api/auth/login");

        let matched = table.resolve("/api/auth/register");
        assert_eq!(matched.bucket, "/api/auth");
        assert_eq!(matched.policy.requests, 20);
    }

    #[test]
    fn test_unmatched_uses_default() {
        let table = table();
        let matched = table.resolve("/api/herbs");
        assert_eq!(matched.bucket, DEFAULT_POLICY_KEY);
        assert_eq!(matched.policy, PolicyConfig::new(100, 60_000));
    }

    #[test]
    fn test_missing_default_is_rejected() {
        let err = PolicyTable::new([("/api/auth", PolicyConfig::new(5, 1_000))]).unwrap_err();
        assert!(matches!(err, PolicyError::MissingDefault));
    }

    #[test]
    fn test_zero_quota_is_rejected() {
        let err = PolicyTable::new([
            ("default", PolicyConfig::new(100, 60_000)),
            ("/api/contact", PolicyConfig::new(0, 60_000)),
        ])
        .unwrap_err();
        assert!(matches!(err, PolicyError::ZeroQuota(key) if key == "/api/contact"));

        let err = PolicyTable::new([("default", PolicyConfig::new(1, 0))]).unwrap_err();
        assert!(matches!(err, PolicyError::ZeroQuota(_)));
    }
}
