//! URL resolution for request targets and precache entries.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve `target` against `base` into an absolute http(s) URL.
///
/// `target` may be absolute or a path with optional query. The result has
/// no fragment; the host is lowercased by the parser.
pub fn resolve(base: &Url, target: &str) -> Result<Url, UrlError> {
    let trimmed = target.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    resolved.set_fragment(None);

    Ok(resolved)
}

/// Rewrite `url` onto `origin`, keeping path and query.
///
/// Any path on `origin` is kept as a prefix, so `https://b/v1` plus
/// `/api/x?q=1` gives `https://b/v1/api/x?q=1`.
pub fn rebase(origin: &Url, path: &str, query: Option<&str>) -> Result<Url, UrlError> {
    let mut target = origin.as_str().trim_end_matches('/').to_string();
    target.push_str(path);
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }
    Url::parse(&target).map_err(|e| UrlError::InvalidUrl(e.to_string()))
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn test_resolve_relative_path() {
        let url = resolve(&base(), "/index.html").unwrap();
        assert_eq!(url.as_str(), "https://example.com/index.html");
    }

    #[test]
    fn test_resolve_keeps_query_drops_fragment() {
        let url = resolve(&base(), "/api/search?q=kitab#results").unwrap();
        assert_eq!(url.query(), Some("q=kitab"));
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_resolve_absolute_lowercases_host() {
        let url = resolve(&base(), "https://CDN.Example.com/app.css").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_resolve_trims_whitespace() {
        let url = resolve(&base(), "  /  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&base(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        assert!(matches!(resolve(&base(), "file:///etc/passwd"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_rebase_onto_backend() {
        let backend = Url::parse("https://backend.example.run.app").unwrap();
        let url = rebase(&backend, "/api/words", Some("q=a&page=2")).unwrap();
        assert_eq!(url.as_str(), "https://backend.example.run.app/api/words?q=a&page=2");
    }

    #[test]
    fn test_rebase_keeps_origin_path_prefix() {
        let backend = Url::parse("https://backend.example.com/v1/").unwrap();
        let url = rebase(&backend, "/api/words", None).unwrap();
        assert_eq!(url.as_str(), "https://backend.example.com/v1/api/words");
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("https://example.com/a").unwrap();
        let b = Url::parse("https://example.com/b?x=1").unwrap();
        let c = Url::parse("https://cdn.example.com/a").unwrap();
        let d = Url::parse("http://example.com/a").unwrap();
        assert!(same_origin(&a, &b));
        assert!(!same_origin(&a, &c));
        assert!(!same_origin(&a, &d));
    }
}
