//! Request classification.

use serde::Serialize;

use crate::request::{Destination, Request};

/// Path prefix that marks API traffic.
pub const API_PREFIX: &str = "/api/";

/// Which strategy a request is served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// Network-first with cache fallback.
    Api,
    /// Cache-first with network refresh.
    Document,
    /// Cache-first with background update.
    StaticAsset,
}

/// Classify a request. Pure and total.
///
/// The `/api/` prefix is checked first and wins over any destination.
pub fn classify(request: &Request) -> RequestClass {
    classify_parts(request.url.path(), request.destination)
}

pub(crate) fn classify_parts(path: &str, destination: Destination) -> RequestClass {
    if path.starts_with(API_PREFIX) {
        RequestClass::Api
    } else if destination == Destination::Document {
        RequestClass::Document
    } else {
        RequestClass::StaticAsset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    fn request(path: &str, destination: Destination) -> Request {
        let url = Url::parse("https://example.com").unwrap().join(path).unwrap();
        Request::get(url).with_destination(destination)
    }

    #[test]
    fn test_api_prefix_wins_over_destination() {
        let destinations = [
            Destination::Document,
            Destination::Script,
            Destination::Style,
            Destination::Image,
            Destination::Font,
            Destination::Manifest,
            Destination::Empty,
            Destination::Other,
        ];
        for destination in destinations {
            assert_eq!(classify(&request("/api/words?q=x", destination)), RequestClass::Api, "{destination:?}");
        }
    }

    #[test]
    fn test_document_navigation() {
        assert_eq!(classify(&request("/", Destination::Document)), RequestClass::Document);
        assert_eq!(classify(&request("/word/kitab", Destination::Document)), RequestClass::Document);
    }

    #[test]
    fn test_everything_else_is_static_asset() {
        assert_eq!(classify(&request("/app.js", Destination::Script)), RequestClass::StaticAsset);
        assert_eq!(classify(&request("/icon-192.png", Destination::Image)), RequestClass::StaticAsset);
        assert_eq!(classify(&request("/data.json", Destination::Empty)), RequestClass::StaticAsset);
    }

    #[test]
    fn test_prefix_requires_trailing_slash() {
        assert_eq!(classify_parts("/api", Destination::Empty), RequestClass::StaticAsset);
        assert_eq!(classify_parts("/apis/x", Destination::Document), RequestClass::Document);
        assert_eq!(classify_parts("/static/api/x", Destination::Empty), RequestClass::StaticAsset);
    }
}
