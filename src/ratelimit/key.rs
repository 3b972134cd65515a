//! Registry key generation and route classification.

use serde::{Deserialize, Serialize};

/// The class of route a request targets.
///
/// Each class has its own request budget, so the same client never shares a
/// counter between public and admin routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteClass {
    /// Public API routes
    Public,
    /// Privileged admin routes
    Admin,
}

impl RouteClass {
    /// Map an "is admin route" flag onto a route class.
    pub fn from_admin_flag(is_admin_route: bool) -> Self {
        if is_admin_route {
            RouteClass::Admin
        } else {
            RouteClass::Public
        }
    }

    /// Whether this class selects the admin threshold.
    pub fn is_admin(&self) -> bool {
        matches!(self, RouteClass::Admin)
    }

    /// The discriminator used in the key's string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Public => "public",
            RouteClass::Admin => "admin",
        }
    }
}

impl std::fmt::Display for RouteClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key that uniquely identifies a tracking entry.
///
/// Composed of the client identifier and the route class. The pair is kept
/// typed so that a client id containing the separator can never collide with
/// another client's key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    /// The client identifier, usually a network address
    pub client_id: String,
    /// The route class the request was made against
    pub route: RouteClass,
}

impl ClientKey {
    /// Create a new key from a client identifier and route class.
    pub fn new(client_id: &str, route: RouteClass) -> Self {
        Self {
            client_id: client_id.to_string(),
            route,
        }
    }

    /// Convert the key to a string representation.
    ///
    /// This is useful for logging and debugging.
    pub fn to_string_key(&self) -> String {
        format!("{}:{}", self.client_id, self.route)
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}
