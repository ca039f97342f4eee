//! Relative href resolution for static catalogs.
//!
//! The same rule applies at every level of a catalog tree and to asset
//! hrefs:
//!
//! - absolute (`scheme://...`) hrefs are used unmodified
//! - `//host/x` inherits the base scheme
//! - `/x` resolves against the origin of the base
//! - `./x` and bare `x` resolve against the directory of the base
//! - `../` climbs one directory, never above the origin
//!
//! Resolution follows RFC 3986 via [`url::Url::join`].

use serde_json::Value;
use url::Url;

/// Resolve `href` against the document URL `base`.
///
/// Dot segments are normalised, so two hrefs naming the same document
/// resolve to the same string. When `base` is not an absolute URL the href
/// is returned as a bare relative path.
pub fn resolve_href(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return base.to_string();
    }
    if is_absolute(href) {
        return href.to_string();
    }

    match Url::parse(base).and_then(|base| base.join(href)) {
        Ok(url) => url.into(),
        Err(_) => href.trim_start_matches("./").to_string(),
    }
}

/// Directory of a URL: everything before its last path segment, without a
/// trailing slash.
pub fn directory_of(url: &str) -> String {
    match Url::parse(url).and_then(|u| u.join("./")) {
        Ok(dir) => String::from(dir).trim_end_matches('/').to_string(),
        Err(_) => url
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_else(|| url.to_string()),
    }
}

/// The base URL for links inside `doc`: its absolute `self` link when one is
/// present, otherwise the URL the document was fetched from.
pub fn document_base(doc: &Value, fetched_from: &str) -> String {
    doc.get("links")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|link| link.get("rel").and_then(Value::as_str) == Some("self"))
        .filter_map(|link| link.get("href").and_then(Value::as_str))
        .find(|href| is_absolute(href))
        .map(str::to_string)
        .unwrap_or_else(|| fetched_from.to_string())
}

/// True for hrefs carrying their own scheme and authority.
pub fn is_absolute(href: &str) -> bool {
    Url::parse(href).map(|u| !u.cannot_be_a_base()).unwrap_or(false)
}
