use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `auth` section of the server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Explicit strategy names (`basic`, `mock`, `jwt`, `dummy`), tried in
    /// order. Empty means auto-detect.
    pub strategies: Vec<String>,
    /// Realm announced in `WWW-Authenticate` for basic and mock auth.
    pub realm: Option<String>,
    /// Users for basic auth; added to the built-in users for mock auth.
    pub users: BTreeMap<String, UserConfig>,
    pub jwt: Option<JwtConfig>,
}

impl AuthConfig {
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }

    pub fn realm(&self) -> &str {
        self.realm.as_deref().unwrap_or("Users")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserConfig {
    /// `None` accepts any password (mock users only).
    pub password: Option<String>,
    pub roles: Vec<String>,
    pub tenant: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JwtConfig {
    /// HS256 signing secret.
    pub secret: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    /// Clock skew tolerated when checking `exp` / `nbf`.
    #[serde(default)]
    pub leeway_sec: i64,
}

/// Deployment facts that influence strategy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Environment {
    pub multi_tenant: bool,
    pub production: bool,
}
