//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use herbarium_core::admission::DEFAULT_ABUSE_THRESHOLD;
use herbarium_core::domain::{Environment, PolicyConfig, PolicyTable};
use herbarium_core::PolicyError;

#[cfg(feature = "redis")]
use herbarium_infra::RedisConfig;

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

/// Route-prefix quotas. `default` applies to everything unmatched.
const RATE_LIMIT_POLICIES: &[(&str, PolicyConfig)] = &[
    ("default", PolicyConfig::new(100, MINUTE_MS)),
    ("/api/auth/login", PolicyConfig::new(5, 15 * MINUTE_MS)),
    ("/api/auth/register", PolicyConfig::new(3, HOUR_MS)),
    ("/api/auth/reset-password", PolicyConfig::new(3, HOUR_MS)),
    ("/api/contact", PolicyConfig::new(5, HOUR_MS)),
    ("/api/newsletter", PolicyConfig::new(3, HOUR_MS)),
    ("/api/search", PolicyConfig::new(30, MINUTE_MS)),
    ("/api/herbs", PolicyConfig::new(60, MINUTE_MS)),
];

/// Build the validated policy table. A failure here must stop startup.
pub fn policy_table() -> Result<PolicyTable, PolicyError> {
    PolicyTable::new(RATE_LIMIT_POLICIES.iter().copied())
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub rate_limit: RateLimitSettings,
    pub cors: CorsSettings,
    /// Internal endpoint receiving security alerts; alerts are only logged when unset.
    pub security_alert_url: Option<String>,
    #[cfg(feature = "redis")]
    pub redis: Option<RedisConfig>,
}

/// Admission-control tuning.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// Upper bound on a single remote store call.
    pub store_timeout: Duration,
    /// Estimated requests per window that trigger a security alert.
    pub abuse_threshold: u64,
    /// Cron expression for the in-process counter sweep.
    pub sweep_cron: String,
}

/// Origin allow-list inputs.
#[derive(Debug, Clone, Default)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
    /// Public site origin, always allowed and added to `connect-src`.
    pub site_url: Option<String>,
}

impl CorsSettings {
    /// Every configured origin entry, the site URL included.
    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.allowed_origins
            .iter()
            .chain(self.site_url.iter())
            .map(String::as_str)
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let rate_limit = RateLimitSettings {
            store_timeout: Duration::from_millis(
                env::var("RATE_LIMIT_STORE_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            abuse_threshold: env::var("ABUSE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ABUSE_THRESHOLD),
            sweep_cron: env::var("RATE_LIMIT_SWEEP_CRON")
                .unwrap_or_else(|_| "0 * * * * *".to_string()),
        };

        let cors = CorsSettings {
            allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| Self::parse_list(&v))
                .unwrap_or_default(),
            site_url: env::var("SITE_URL").ok().filter(|v| !v.trim().is_empty()),
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: Self::environment(env::var("APP_ENV").ok().as_deref()),
            rate_limit,
            cors,
            security_alert_url: env::var("SECURITY_ALERT_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            #[cfg(feature = "redis")]
            redis: RedisConfig::from_env(),
        }
    }

    /// Resolve `APP_ENV`; a missing or unknown value locks down to production.
    fn environment(value: Option<&str>) -> Environment {
        let Some(raw) = value else {
            tracing::warn!("APP_ENV not set, falling back to production");
            return Environment::Production;
        };
        Environment::parse(raw).unwrap_or_else(|| {
            tracing::warn!(app_env = raw, "Unknown APP_ENV, falling back to production");
            Environment::Production
        })
    }

    /// Split a comma-separated list, dropping blanks.
    fn parse_list(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table_is_valid() {
        let table = policy_table().unwrap();
        assert_eq!(table.len(), RATE_LIMIT_POLICIES.len());
        assert_eq!(table.default_policy(), PolicyConfig::new(100, MINUTE_MS));
        assert_eq!(table.resolve("/api/auth/login").policy.requests, 5);
        assert_eq!(table.resolve("/api/herbs/rosemary").bucket, "/api/herbs");
    }

    #[test]
    fn test_environment_defaults_to_production() {
        assert_eq!(AppConfig::environment(None), Environment::Production);
        assert_eq!(AppConfig::environment(Some("staging")), Environment::Production);
        assert_eq!(AppConfig::environment(Some("development")), Environment::Development);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            AppConfig::parse_list(" https://a.example, ,https://*.b.example "),
            vec!["https://a.example", "https://*.b.example"]
        );
    }

    #[test]
    fn test_cors_origins_include_site_url() {
        let cors = CorsSettings {
            allowed_origins: vec!["https://a.example".to_string()],
            site_url: Some("https://herbarium.example".to_string()),
        };
        assert_eq!(
            cors.origins().collect::<Vec<_>>(),
            vec!["https://a.example", "https://herbarium.example"]
        );
    }
}
