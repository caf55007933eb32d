use tokio_util::sync::CancellationToken;

use crate::{CatalogError, RetryPolicy};

/// Configures base URLs, timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// API-prefixed base URL, e.g. `http://localhost:5000/api`.
    pub primary_base_url: String,
    /// Direct base URL without the API prefix, e.g. `http://localhost:5000`.
    pub secondary_base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt, per base URL.
    pub max_retries: usize,
    /// Base retry backoff in milliseconds (linear strategy).
    pub retry_backoff_ms: u64,
    /// Try the secondary base URL before the primary one.
    pub prefer_secondary_first: bool,
    pub retry_policy: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::for_backend("http://localhost:5000")
    }
}

impl ClientOptions {
    /// Derives both base URLs from a backend root: `{root}/api` first,
    /// `{root}` as fallback.
    pub fn for_backend(backend_url: impl AsRef<str>) -> Self {
        let root = backend_url.as_ref().trim().trim_end_matches('/');
        Self::with_base_urls(format!("{root}/api"), root)
    }

    /// Uses two explicit base URLs.
    pub fn with_base_urls(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary_base_url: primary.into(),
            secondary_base_url: secondary.into(),
            timeout_ms: 15_000,
            max_retries: 2,
            retry_backoff_ms: 250,
            prefer_secondary_first: false,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_backoff_ms(mut self, retry_backoff_ms: u64) -> Self {
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    pub fn prefer_secondary_first(mut self, prefer: bool) -> Self {
        self.prefer_secondary_first = prefer;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Creates options from environment variables.
    ///
    /// Reads:
    /// - `CATALOG_BACKEND_URL`: backend root, derives both base URLs
    /// - `CATALOG_API_BASE_URL` / `CATALOG_DIRECT_BASE_URL`: explicit
    ///   overrides for the primary and secondary base URL
    /// - `CATALOG_TIMEOUT_MS`, `CATALOG_RETRY_ATTEMPTS`,
    ///   `CATALOG_RETRY_BACKOFF_MS`: optional numeric overrides
    ///
    /// **Not available on `wasm32` targets**: environment variables do not
    /// exist in browser runtimes.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self, CatalogError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, CatalogError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| -> Result<Option<String>, CatalogError> {
            match lookup(key) {
                Some(value) if value.trim().is_empty() => {
                    Err(CatalogError::Config(format!("{key} is set but empty")))
                }
                Some(value) => Ok(Some(value.trim().to_owned())),
                None => Ok(None),
            }
        };

        let backend = non_empty("CATALOG_BACKEND_URL")?;
        let primary = non_empty("CATALOG_API_BASE_URL")?;
        let secondary = non_empty("CATALOG_DIRECT_BASE_URL")?;

        let mut options = match (backend, primary, secondary) {
            (_, Some(primary), Some(secondary)) => Self::with_base_urls(primary, secondary),
            (Some(backend), primary, secondary) => {
                let mut options = Self::for_backend(backend);
                if let Some(primary) = primary {
                    options.primary_base_url = primary;
                }
                if let Some(secondary) = secondary {
                    options.secondary_base_url = secondary;
                }
                options
            }
            _ => {
                return Err(CatalogError::Config(
                    "missing CATALOG_BACKEND_URL environment variable".to_owned(),
                ))
            }
        };

        if let Some(value) = non_empty("CATALOG_TIMEOUT_MS")? {
            options.timeout_ms = parse_number("CATALOG_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = non_empty("CATALOG_RETRY_ATTEMPTS")? {
            options.max_retries = parse_number("CATALOG_RETRY_ATTEMPTS", &value)?;
        }
        if let Some(value) = non_empty("CATALOG_RETRY_BACKOFF_MS")? {
            options.retry_backoff_ms = parse_number("CATALOG_RETRY_BACKOFF_MS", &value)?;
        }
        Ok(options)
    }

    /// Base URLs in the order they should be attempted.
    pub(crate) fn candidates(&self, prefer_secondary_first: bool) -> [&str; 2] {
        if prefer_secondary_first {
            [self.secondary_base_url.as_str(), self.primary_base_url.as_str()]
        } else {
            [self.primary_base_url.as_str(), self.secondary_base_url.as_str()]
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CatalogError> {
    value
        .parse()
        .map_err(|_| {
            CatalogError::Config(format!(
                "{key} must be a non-negative integer, got '{value}'"
            ))
        })
}

/// Per-call overrides for a single dispatch.
#[derive(Clone, Debug, Default)]
pub struct DispatchOptions {
    /// Overrides [`ClientOptions::prefer_secondary_first`] for this call.
    pub prefer_secondary_first: Option<bool>,
    /// Aborts the dispatch early when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefer_secondary_first(mut self, prefer: bool) -> Self {
        self.prefer_secondary_first = Some(prefer);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::ClientOptions;
    use crate::CatalogError;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn for_backend_derives_api_and_direct_urls() {
        let opts = ClientOptions::for_backend("https://catalog.example.com/");
        assert_eq!(opts.primary_base_url, "https://catalog.example.com/api");
        assert_eq!(opts.secondary_base_url, "https://catalog.example.com");
        assert_eq!(opts.timeout_ms, 15_000);
        assert_eq!(opts.max_retries, 2);
        assert!(!opts.prefer_secondary_first);
    }

    #[test]
    fn candidates_follow_preference() {
        let opts = ClientOptions::with_base_urls("http://a", "http://b");
        assert_eq!(opts.candidates(false), ["http://a", "http://b"]);
        assert_eq!(opts.candidates(true), ["http://b", "http://a"]);
    }

    #[test]
    fn from_lookup_reads_backend_and_numbers() {
        let opts = ClientOptions::from_lookup(lookup(&[
            ("CATALOG_BACKEND_URL", "http://localhost:5000"),
            ("CATALOG_TIMEOUT_MS", "2500"),
            ("CATALOG_RETRY_ATTEMPTS", "4"),
        ]))
        .expect("options must parse");

        assert_eq!(opts.primary_base_url, "http://localhost:5000/api");
        assert_eq!(opts.timeout_ms, 2_500);
        assert_eq!(opts.max_retries, 4);
        assert_eq!(opts.retry_backoff_ms, 250);
    }

    #[test]
    fn from_lookup_explicit_urls_override_backend() {
        let opts = ClientOptions::from_lookup(lookup(&[
            ("CATALOG_BACKEND_URL", "http://localhost:5000"),
            ("CATALOG_DIRECT_BASE_URL", "http://fallback:8080"),
        ]))
        .expect("options must parse");

        assert_eq!(opts.primary_base_url, "http://localhost:5000/api");
        assert_eq!(opts.secondary_base_url, "http://fallback:8080");
    }

    #[test]
    fn from_lookup_rejects_missing_empty_and_invalid_values() {
        assert!(matches!(
            ClientOptions::from_lookup(lookup(&[])),
            Err(CatalogError::Config(_))
        ));
        assert!(matches!(
            ClientOptions::from_lookup(lookup(&[("CATALOG_BACKEND_URL", "  ")])),
            Err(CatalogError::Config(_))
        ));
        assert!(matches!(
            ClientOptions::from_lookup(lookup(&[
                ("CATALOG_BACKEND_URL", "http://localhost:5000"),
                ("CATALOG_RETRY_ATTEMPTS", "-1"),
            ])),
            Err(CatalogError::Config(_))
        ));
    }
}
