//! Normalized request identity used to key cache entries.

use sha2::{Digest, Sha256};
use url::Url;

use crate::Error;

/// Identity of a request inside a cache store.
///
/// Two requests share a key when their upper-cased methods match and their
/// absolute URLs match after the fragment is dropped. Query strings are part
/// of the identity and are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: String,
    url: String,
    hash: String,
}

impl CacheKey {
    /// Build a key from a method and an absolute URL.
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        let method = method.to_ascii_uppercase();
        let hash = compute_key_hash(&method, url.as_str());
        Self { method, url: url.into(), hash }
    }

    /// Parse `url` and build a key from it.
    pub fn parse(method: &str, url: &str) -> Result<Self, Error> {
        let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new(method, &parsed))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Hex SHA-256 of the method and URL; the primary key within a store.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

fn compute_key_hash(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_ignored() {
        let plain = CacheKey::parse("GET", "https://example.com/page").unwrap();
        let with_fragment = CacheKey::parse("GET", "https://example.com/page#section").unwrap();
        assert_eq!(plain, with_fragment);
        assert_eq!(with_fragment.url(), "https://example.com/page");
    }

    #[test]
    fn test_method_is_normalized() {
        let lower = CacheKey::parse("get", "https://example.com/").unwrap();
        let upper = CacheKey::parse("GET", "https://example.com/").unwrap();
        assert_eq!(lower.hash(), upper.hash());
        assert_eq!(lower.method(), "GET");
    }

    #[test]
    fn test_query_is_part_of_identity() {
        let a = CacheKey::parse("GET", "https://example.com/api/search?q=a").unwrap();
        let b = CacheKey::parse("GET", "https://example.com/api/search?q=b").unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_method_is_part_of_identity() {
        let get = CacheKey::parse("GET", "https://example.com/").unwrap();
        let head = CacheKey::parse("HEAD", "https://example.com/").unwrap();
        assert_ne!(get.hash(), head.hash());
    }

    #[test]
    fn test_hash_format() {
        let key = CacheKey::parse("GET", "https://example.com").unwrap();
        assert_eq!(key.hash().len(), 64);
        assert!(key.hash().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_relative_url_rejected() {
        assert!(matches!(CacheKey::parse("GET", "/relative"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_display() {
        let key = CacheKey::parse("GET", "https://example.com/a").unwrap();
        assert_eq!(key.to_string(), "GET https://example.com/a");
    }
}
