use std::collections::BTreeSet;

/// Pseudo role granted to every caller.
pub const ROLE_ANY: &str = "any";
/// Pseudo role granted to every authenticated caller.
pub const ROLE_AUTHENTICATED: &str = "authenticated-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub roles: BTreeSet<String>,
    pub tenant: Option<String>,
    anonymous: bool,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
            tenant: None,
            anonymous: false,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            id: "anonymous".into(),
            roles: BTreeSet::new(),
            tenant: None,
            anonymous: true,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Role check including the `any` and `authenticated-user` pseudo roles.
    pub fn is(&self, role: &str) -> bool {
        match role {
            ROLE_ANY => true,
            ROLE_AUTHENTICATED => !self.anonymous,
            other => self.roles.contains(other),
        }
    }

    /// True when no requirement is declared or the user holds any of them.
    pub fn satisfies(&self, requires: &[String]) -> bool {
        requires.is_empty() || requires.iter().any(|r| self.is(r))
    }
}
