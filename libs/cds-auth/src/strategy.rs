use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::{header, HeaderMap};

use crate::config::UserConfig;
use crate::{AuthError, User};

/// One way of turning request headers into a [`User`].
pub trait AuthStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn authenticate(&self, headers: &HeaderMap) -> Result<User, AuthError>;

    /// `WWW-Authenticate` challenge sent with a 401.
    fn challenge(&self) -> Option<String> {
        None
    }
}

/// Credentials of an `Authorization: <scheme> <value>` header, if the scheme
/// matches (case-insensitively).
pub(crate) fn authorization<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (given, value) = raw.split_once(' ')?;
    given
        .eq_ignore_ascii_case(scheme)
        .then(|| value.trim())
}

/// HTTP basic authentication against a fixed user table.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    name: &'static str,
    realm: String,
    users: BTreeMap<String, UserConfig>,
}

/// Development users known to mock authentication.
const MOCK_USERS: &[(&str, &[&str])] = &[
    ("alice", &["admin"]),
    ("bob", &["builder"]),
    ("carol", &[]),
    ("dave", &[]),
    ("erin", &[]),
    ("fred", &[]),
];

impl BasicAuth {
    /// Users must have a password configured; users without one are rejected.
    pub fn new(realm: impl Into<String>, users: BTreeMap<String, UserConfig>) -> Self {
        Self {
            name: "basic",
            realm: realm.into(),
            users,
        }
    }

    /// Basic authentication with the built-in development users. Configured
    /// users are added (and override built-ins of the same name); users
    /// without a password accept any password.
    pub fn mock(realm: impl Into<String>, configured: &BTreeMap<String, UserConfig>) -> Self {
        let mut users: BTreeMap<String, UserConfig> = MOCK_USERS
            .iter()
            .map(|(id, roles)| {
                (
                    id.to_string(),
                    UserConfig {
                        roles: roles.iter().map(|r| r.to_string()).collect(),
                        ..Default::default()
                    },
                )
            })
            .collect();
        users.extend(configured.clone());
        Self {
            name: "mock",
            realm: realm.into(),
            users,
        }
    }

    fn is_mock(&self) -> bool {
        self.name == "mock"
    }
}

impl AuthStrategy for BasicAuth {
    fn name(&self) -> &'static str {
        self.name
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        let encoded =
            authorization(headers, "basic").ok_or(AuthError::MissingCredentials { scheme: "basic" })?;
        let decoded = STANDARD
            .decode(encoded)
            .ok()
            .and_then(|raw| String::from_utf8(raw).ok())
            .ok_or_else(|| AuthError::InvalidCredentials("malformed basic credentials".into()))?;
        let (id, password) = decoded.split_once(':').unwrap_or((decoded.as_str(), ""));

        let Some(user) = self.users.get(id) else {
            return Err(AuthError::InvalidCredentials(format!("unknown user '{}'", id)));
        };
        let accepted = match &user.password {
            Some(expected) => expected == password,
            None => self.is_mock(),
        };
        if !accepted {
            return Err(AuthError::InvalidCredentials(format!(
                "wrong password for '{}'",
                id
            )));
        }
        Ok(User::new(id)
            .with_roles(user.roles.iter().cloned())
            .with_tenant(user.tenant.clone()))
    }

    fn challenge(&self) -> Option<String> {
        Some(format!("Basic realm=\"{}\"", self.realm))
    }
}

/// Rejects every request. Selected when authentication is required but
/// nothing usable is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyAuth;

impl AuthStrategy for DummyAuth {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn authenticate(&self, _headers: &HeaderMap) -> Result<User, AuthError> {
        Err(AuthError::Rejected)
    }
}
