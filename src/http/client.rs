//! Client identification and route classification for inbound requests.

use axum::http::HeaderMap;

use crate::ratelimit::RouteClass;

/// Identifier used when no address can be derived from the request.
///
/// Every such caller shares one bucket.
pub const UNKNOWN_CLIENT: &str = "unknown";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Derive the client identifier from request headers.
///
/// Prefers the first entry of `X-Forwarded-For`, then `X-Real-IP`, and
/// falls back to [`UNKNOWN_CLIENT`].
pub fn client_id_from_headers(headers: &HeaderMap) -> String {
    forwarded_for(headers)
        .or_else(|| real_ip(headers))
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, X_FORWARDED_FOR)?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn real_ip(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, X_REAL_IP)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

/// Decides which budget a request path falls under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteClassifier {
    admin_prefix: String,
}

impl RouteClassifier {
    /// Create a classifier treating everything under `admin_prefix` as admin.
    pub fn new(admin_prefix: impl Into<String>) -> Self {
        let mut admin_prefix = admin_prefix.into();
        while admin_prefix.len() > 1 && admin_prefix.ends_with('/') {
            admin_prefix.pop();
        }
        Self { admin_prefix }
    }

    /// The configured admin prefix.
    pub fn admin_prefix(&self) -> &str {
        &self.admin_prefix
    }

    /// Classify a request path.
    ///
    /// A path is admin when it equals the prefix or continues it with `/`,
    /// so `/api/administrators` stays public under `/api/admin`.
    pub fn classify(&self, path: &str) -> RouteClass {
        let is_admin = match path.strip_prefix(self.admin_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.admin_prefix == "/",
            None => false,
        };
        RouteClass::from_admin_flag(is_admin)
    }
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::new("/api/admin")
    }
}
