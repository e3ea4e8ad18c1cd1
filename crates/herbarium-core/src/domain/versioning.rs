//! Path-based API version negotiation.

/// Versions served by this build.
pub const SUPPORTED_API_VERSIONS: &[u32] = &[1];

/// Version served at the unversioned `/api` root.
pub const CURRENT_API_VERSION: u32 = 1;

const API_ROOT: &str = "/api";

/// What to do with an incoming path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRoute {
    /// Not an API path; untouched, no version headers.
    Bypass,
    /// Unversioned API path; untouched but tagged with version headers.
    Current,
    /// Supported versioned path, rewritten to the unversioned form.
    Rewrite(String),
    /// Well-formed version that this build does not serve.
    Unsupported(u64),
    /// Version segment that is zero, negative or not a number.
    Invalid(String),
}

impl VersionRoute {
    /// Classify `path` by its `/api/v{N}` segment.
    ///
    /// A segment counts as a version when it is `v` followed by a digit, a minus
    /// sign or a dot, so `/api/validate` is an ordinary path while `/api/v1.5`
    /// is rejected.
    pub fn classify(path: &str) -> Self {
        let Some(rest) = strip_api_root(path) else {
            return Self::Bypass;
        };

        let trimmed = rest.trim_start_matches('/');
        let (segment, tail) = match trimmed.find('/') {
            Some(idx) => trimmed.split_at(idx),
            None => (trimmed, ""),
        };

        let Some(raw) = segment.strip_prefix('v').filter(|raw| is_version_like(raw)) else {
            return Self::Current;
        };

        match raw.parse::<i64>() {
            Ok(n) if n < 1 => Self::Invalid(segment.to_string()),
            Ok(n) => match u32::try_from(n) {
                Ok(version) if SUPPORTED_API_VERSIONS.contains(&version) => {
                    Self::Rewrite(format!("{API_ROOT}{tail}"))
                }
                _ => Self::Unsupported(n as u64),
            },
            Err(_) => Self::Invalid(segment.to_string()),
        }
    }
}

fn strip_api_root(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(API_ROOT)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

fn is_version_like(raw: &str) -> bool {
    raw.chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '.')
}

/// Comma-separated list for the supported-versions response header.
pub fn supported_versions_header() -> String {
    SUPPORTED_API_VERSIONS
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_rewrites_to_current_path() {
        assert_eq!(
            VersionRoute::classify("/api/v1/herbs"),
            VersionRoute::Rewrite("/api/herbs".to_string())
        );
        assert_eq!(
            VersionRoute::classify("/api/v1/herbs/lavender/notes"),
            VersionRoute::Rewrite("/api/herbs/lavender/notes".to_string())
        );
        assert_eq!(
            VersionRoute::classify("/api/v1"),
            VersionRoute::Rewrite("/api".to_string())
        );
    }

    #[test]
    fn test_future_version_is_unsupported() {
        assert_eq!(
            VersionRoute::classify("/api/v2/herbs"),
            VersionRoute::Unsupported(2)
        );
    }

    #[test]
    fn test_zero_and_garbage_are_invalid() {
        assert!(matches!(
            VersionRoute::classify("/api/v0/herbs"),
            VersionRoute::Invalid(_)
        ));
        assert!(matches!(
            VersionRoute::classify("/api/v-1/herbs"),
            VersionRoute::Invalid(_)
        ));
        assert!(matches!(
            VersionRoute::classify("/api/v1.5/herbs"),
            VersionRoute::Invalid(_)
        ));
        assert!(matches!(
            VersionRoute::classify("/api/v99999999999999999999999/herbs"),
            VersionRoute::Invalid(_)
        ));
    }

    #[test]
    fn test_unversioned_and_non_api_paths() {
        assert_eq!(VersionRoute::classify("/api/herbs"), VersionRoute::Current);
        assert_eq!(VersionRoute::classify("/api/validate"), VersionRoute::Current);
        assert_eq!(VersionRoute::classify("/api"), VersionRoute::Current);
        assert_eq!(VersionRoute::classify("/apiary"), VersionRoute::Bypass);
        assert_eq!(VersionRoute::classify("/health"), VersionRoute::Bypass);
    }

    #[test]
    fn test_supported_versions_header() {
        assert_eq!(supported_versions_header(), "1");
    }
}
