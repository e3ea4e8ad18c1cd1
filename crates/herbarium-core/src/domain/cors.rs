//! Origin allow-listing and the content security policy.

use std::fmt;

/// Deployment environment, used to pick built-in origin allowances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse an environment name. Unrecognised names yield `None`; callers
    /// should treat that as production.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "development" | "dev" | "local" => Some(Self::Development),
            _ => None,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Native app shells that send non-HTTP origins.
const NATIVE_ORIGINS: &[&str] = &["capacitor://localhost", "ionic://localhost"];

const DEVELOPMENT_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:4321",
    "http://localhost:5173",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:4321",
    "http://127.0.0.1:5173",
];

/// One allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPattern {
    /// Byte-for-byte origin match.
    Exact(String),
    /// `scheme://*.domain`: any subdomain of `domain`, never the apex itself.
    Subdomain { scheme: String, suffix: String },
    /// `scheme://`: any origin using a non-HTTP scheme such as an app shell.
    Scheme(String),
}

impl OriginPattern {
    /// Parse a configured entry.
    ///
    /// Returns `None` for blank entries and for a bare `*`, which is never
    /// allowed alongside credentials.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_end_matches('/');
        if raw.is_empty() || raw == "*" {
            return None;
        }

        let (scheme, rest) = match raw.split_once("://") {
            Some(parts) => parts,
            // `myapp:` style scheme allowance
            None => {
                let scheme = raw.strip_suffix(':')?.to_ascii_lowercase();
                return (!is_http_scheme(&scheme)).then_some(Self::Scheme(scheme));
            }
        };
        let scheme = scheme.to_ascii_lowercase();

        if rest.is_empty() || rest == "*" {
            if is_http_scheme(&scheme) {
                return None;
            }
            return Some(Self::Scheme(scheme));
        }

        if let Some(domain) = rest.strip_prefix("*.") {
            return Some(Self::Subdomain {
                scheme,
                suffix: format!(".{}", domain.to_ascii_lowercase()),
            });
        }

        Some(Self::Exact(format!("{scheme}://{rest}")))
    }

    pub fn matches(&self, origin: &str) -> bool {
        match self {
            Self::Exact(allowed) => allowed == origin,
            Self::Subdomain { scheme, suffix } => origin
                .split_once("://")
                .is_some_and(|(s, host)| {
                    s.eq_ignore_ascii_case(scheme)
                        && host.len() > suffix.len()
                        && host.to_ascii_lowercase().ends_with(suffix.as_str())
                }),
            Self::Scheme(scheme) => origin
                .split_once(':')
                .is_some_and(|(s, _)| s.eq_ignore_ascii_case(scheme)),
        }
    }
}

fn is_http_scheme(scheme: &str) -> bool {
    scheme == "http" || scheme == "https"
}

/// Explicit origin allow-list.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    patterns: Vec<OriginPattern>,
}

impl CorsPolicy {
    pub fn new(patterns: Vec<OriginPattern>) -> Self {
        Self { patterns }
    }

    /// Configured entries plus the built-ins for `env`.
    ///
    /// Development also allows the usual local dev-server origins; production
    /// only adds the native app shells.
    pub fn for_environment<'a, I>(env: Environment, configured: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut builtins: Vec<&str> = NATIVE_ORIGINS.to_vec();
        if !env.is_production() {
            builtins.extend_from_slice(DEVELOPMENT_ORIGINS);
        }

        let mut patterns: Vec<OriginPattern> = Vec::new();
        for raw in configured.into_iter().chain(builtins) {
            match OriginPattern::parse(raw) {
                Some(pattern) if !patterns.contains(&pattern) => patterns.push(pattern),
                Some(_) => {}
                None if !raw.trim().is_empty() => {
                    tracing::warn!(origin = %raw, "Ignoring unusable CORS origin entry");
                }
                None => {}
            }
        }

        Self { patterns }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        origin != "null" && self.patterns.iter().any(|p| p.matches(origin))
    }

    pub fn patterns(&self) -> &[OriginPattern] {
        &self.patterns
    }
}

/// Content-Security-Policy assembled from per-directive source lists.
#[derive(Debug, Clone)]
pub struct ContentSecurityPolicy {
    directives: Vec<(&'static str, Vec<String>)>,
}

impl ContentSecurityPolicy {
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
        }
    }

    /// Append sources to a directive, creating it if needed.
    pub fn directive(mut self, name: &'static str, sources: &[&str]) -> Self {
        let sources = sources.iter().map(|s| s.to_string());
        match self.directives.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => existing.extend(sources),
            None => self.directives.push((name, sources.collect())),
        }
        self
    }

    /// The policy served with API responses.
    pub fn strict(extra_connect_src: &[&str]) -> Self {
        Self::new()
            .directive("default-src", &["'self'"])
            .directive("script-src", &["'self'"])
            .directive("style-src", &["'self'", "'unsafe-inline'"])
            .directive("img-src", &["'self'", "data:", "https:"])
            .directive("font-src", &["'self'", "data:"])
            .directive("connect-src", &["'self'"])
            .directive("connect-src", extra_connect_src)
            .directive("frame-ancestors", &["'none'"])
            .directive("base-uri", &["'self'"])
            .directive("form-action", &["'self'"])
            .directive("object-src", &["'none'"])
            .directive("upgrade-insecure-requests", &[])
    }
}

impl Default for ContentSecurityPolicy {
    fn default() -> Self {
        Self::strict(&[])
    }
}

impl fmt::Display for ContentSecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (name, sources)) in self.directives.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            f.write_str(name)?;
            for source in sources {
                write!(f, " {source}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_parsing() {
        assert_eq!(
            OriginPattern::parse("https://herbarium.example/"),
            Some(OriginPattern::Exact("https://herbarium.example".to_string()))
        );
        assert_eq!(
            OriginPattern::parse("https://*.herbarium.example"),
            Some(OriginPattern::Subdomain {
                scheme: "https".to_string(),
                suffix: ".herbarium.example".to_string()
            })
        );
        assert_eq!(
            OriginPattern::parse("capacitor://"),
            Some(OriginPattern::Scheme("capacitor".to_string()))
        );
        assert_eq!(
            OriginPattern::parse("herbarium-app:"),
            Some(OriginPattern::Scheme("herbarium-app".to_string()))
        );
        assert_eq!(OriginPattern::parse("*"), None);
        assert_eq!(OriginPattern::parse("https://"), None);
        assert_eq!(OriginPattern::parse("http:"), None);
    }

    #[test]
    fn test_subdomain_wildcard_excludes_apex() {
        let pattern = OriginPattern::parse("https://*.herbarium.example").unwrap();
        assert!(pattern.matches("https://preview.herbarium.example"));
        assert!(pattern.matches("https://a.b.herbarium.example"));
        assert!(!pattern.matches("https://herbarium.example"));
        assert!(!pattern.matches("http://preview.herbarium.example"));
        assert!(!pattern.matches("https://evilherbarium.example"));
    }

    #[test]
    fn test_production_is_strict() {
        let policy = CorsPolicy::for_environment(
            Environment::Production,
            ["https://herbarium.example"],
        );
        assert!(policy.is_allowed("https://herbarium.example"));
        assert!(policy.is_allowed("capacitor://localhost"));
        assert!(!policy.is_allowed("http://localhost:3000"));
        assert!(!policy.is_allowed("null"));
    }

    #[test]
    fn test_development_allows_local_servers() {
        let policy = CorsPolicy::for_environment(Environment::Development, std::iter::empty());
        assert!(policy.is_allowed("http://localhost:3000"));
        assert!(policy.is_allowed("ionic://localhost"));
        assert!(!policy.is_allowed("https://elsewhere.example"));
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("Production"), Some(Environment::Production));
        assert_eq!(Environment::parse(" dev "), Some(Environment::Development));
        assert_eq!(Environment::parse("staging"), None);
        assert_eq!(Environment::parse(""), None);
    }

    #[test]
    fn test_csp_rendering() {
        let csp = ContentSecurityPolicy::new()
            .directive("default-src", &["'self'"])
            .directive("connect-src", &["'self'"])
            .directive("connect-src", &["https://api.herbarium.example"])
            .directive("upgrade-insecure-requests", &[]);
        assert_eq!(
            csp.to_string(),
            "default-src 'self'; connect-src 'self' https://api.herbarium.example; upgrade-insecure-requests"
        );
    }
}
