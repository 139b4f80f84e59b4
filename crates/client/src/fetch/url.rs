//! URL normalization for cache keys and origin checks.

use url::Url;

/// Error type for URL normalization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Whether responses for this URL may be stored at all.
pub fn is_cacheable_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Normalize an absolute URL string into a cache key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Reject anything that is not http or https
/// 3. Lowercase the host (done by the parser for special schemes)
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    finish(parsed)
}

/// Resolve a possibly relative locator against `base` and normalize it.
///
/// `./style.css` against `https://host/app/` gives `https://host/app/style.css`;
/// absolute locators ignore the base.
pub fn resolve(base: &Url, locator: &str) -> Result<Url, UrlError> {
    let trimmed = locator.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let joined = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    finish(joined)
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

fn finish(mut url: Url) -> Result<Url, UrlError> {
    if !is_cacheable_scheme(&url) {
        return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
    }
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Url {
        Url::parse("https://budget.example.com/app/").unwrap()
    }

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://EXAMPLE.COM/Path").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/Path");
    }

    #[test]
    fn test_canonicalize_remove_fragment_keep_query() {
        let url = canonicalize("https://example.com/report?month=2024-05#totals").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("month=2024-05"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  http://localhost:8080/app.js  ").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/app.js");
    }

    #[test]
    fn test_canonicalize_rejects_other_schemes() {
        for input in ["data:text/plain,hello", "chrome-extension://abc/popup.js", "file:///etc/hosts"] {
            assert!(matches!(canonicalize(input), Err(UrlError::UnsupportedScheme(_))), "{input}");
        }
    }

    #[test]
    fn test_canonicalize_malformed() {
        assert!(matches!(canonicalize("not a url"), Err(UrlError::InvalidUrl(_))));
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_relative_locators() {
        assert_eq!(resolve(&scope(), "./").unwrap().as_str(), "https://budget.example.com/app/");
        assert_eq!(
            resolve(&scope(), "./style.css").unwrap().as_str(),
            "https://budget.example.com/app/style.css"
        );
        assert_eq!(resolve(&scope(), "/").unwrap().as_str(), "https://budget.example.com/");
    }

    #[test]
    fn test_resolve_absolute_locator_ignores_base() {
        let url = resolve(&scope(), "https://unpkg.com/dexie@3.2.2/dist/dexie.min.js").unwrap();
        assert_eq!(url.host_str(), Some("unpkg.com"));
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve(&scope(), "data:application/json,{}");
        assert_eq!(result, Err(UrlError::UnsupportedScheme("data".into())));
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("http://localhost:8080/app.js").unwrap();
        let b = Url::parse("http://localhost:8080/").unwrap();
        let other_port = Url::parse("http://localhost:9090/").unwrap();
        let other_scheme = Url::parse("https://localhost:8080/").unwrap();

        assert!(same_origin(&a, &b));
        assert!(!same_origin(&a, &other_port));
        assert!(!same_origin(&a, &other_scheme));
    }
}
