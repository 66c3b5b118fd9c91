use std::sync::Arc;

use http::HeaderMap;

use crate::config::{AuthConfig, Environment};
use crate::strategy::{AuthStrategy, BasicAuth, DummyAuth};
use crate::{AuthError, User};

/// Outcome of strategy selection for one mounted service.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Every caller is let through as an anonymous user.
    Unauthenticated,
    /// Strategies tried in order for each request.
    Strategies(Vec<Arc<dyn AuthStrategy>>),
}

impl Selection {
    pub fn names(&self) -> Vec<&'static str> {
        match self {
            Selection::Unauthenticated => Vec::new(),
            Selection::Strategies(list) => list.iter().map(|s| s.name()).collect(),
        }
    }

    pub fn into_authenticator(self) -> Authenticator {
        Authenticator::new(self)
    }
}

#[cfg(feature = "jwt")]
fn jwt_strategy(config: &AuthConfig) -> Result<Arc<dyn AuthStrategy>, AuthError> {
    match &config.jwt {
        Some(jwt) if !jwt.secret.is_empty() => Ok(Arc::new(crate::JwtAuth::new(jwt.clone()))),
        _ => Err(AuthError::StrategyUnavailable {
            strategy: "jwt".into(),
            reason: "auth.jwt.secret is not configured".into(),
        }),
    }
}

#[cfg(not(feature = "jwt"))]
fn jwt_strategy(_config: &AuthConfig) -> Result<Arc<dyn AuthStrategy>, AuthError> {
    Err(AuthError::StrategyUnavailable {
        strategy: "jwt".into(),
        reason: "built without the `jwt` feature".into(),
    })
}

fn named_strategy(name: &str, config: &AuthConfig) -> Result<Arc<dyn AuthStrategy>, AuthError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "basic" => Ok(Arc::new(BasicAuth::new(config.realm(), config.users.clone()))),
        "mock" => Ok(Arc::new(BasicAuth::mock(config.realm(), &config.users))),
        "jwt" => jwt_strategy(config),
        "dummy" => Ok(Arc::new(DummyAuth)),
        _ => Err(AuthError::UnsupportedStrategy(name.to_string())),
    }
}

fn jwt_configured(config: &AuthConfig) -> bool {
    cfg!(feature = "jwt") && config.jwt.as_ref().is_some_and(|j| !j.secret.is_empty())
}

/// Decide how a service authenticates callers. Runs once at mount time;
/// configuration mistakes surface here as errors.
pub fn select_strategies(
    config: &AuthConfig,
    restricted: bool,
    env: Environment,
    custom: Option<Arc<dyn AuthStrategy>>,
) -> Result<Selection, AuthError> {
    if let Some(custom) = custom {
        tracing::debug!(strategy = custom.name(), "using caller-supplied auth strategy");
        return Ok(Selection::Strategies(vec![custom]));
    }

    if !config.strategies.is_empty() {
        let strategies = config
            .strategies
            .iter()
            .map(|name| named_strategy(name, config))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Selection::Strategies(strategies));
    }

    let needed = restricted || (env.multi_tenant && env.production);
    if !needed {
        return Ok(Selection::Unauthenticated);
    }
    if jwt_configured(config) {
        return Ok(Selection::Strategies(vec![jwt_strategy(config)?]));
    }
    if !env.production {
        tracing::info!("no auth strategy configured, using mock users");
        return Ok(Selection::Strategies(vec![Arc::new(BasicAuth::mock(
            config.realm(),
            &config.users,
        ))]));
    }

    tracing::error!(
        "authentication is required but no strategy is configured; all requests will be rejected"
    );
    Ok(Selection::Strategies(vec![Arc::new(DummyAuth)]))
}

/// Request-time side of a [`Selection`].
#[derive(Debug, Clone)]
pub struct Authenticator {
    selection: Selection,
}

/// A failed authentication plus the challenges to send back.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub error: AuthError,
    pub challenges: Vec<String>,
}

impl Authenticator {
    pub fn new(selection: Selection) -> Self {
        Self { selection }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.selection, Selection::Unauthenticated)
    }

    /// Try each strategy in order; the first success wins. When all fail, a
    /// concrete failure is preferred over "no credentials sent".
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<User, Rejection> {
        let strategies = match &self.selection {
            Selection::Unauthenticated => return Ok(User::anonymous()),
            Selection::Strategies(list) => list,
        };

        let mut error = None;
        let mut challenges = Vec::new();
        for strategy in strategies {
            match strategy.authenticate(headers) {
                Ok(user) => {
                    tracing::trace!(strategy = strategy.name(), user = %user.id, "authenticated");
                    return Ok(user);
                }
                Err(err) => {
                    tracing::trace!(strategy = strategy.name(), error = %err, "strategy declined");
                    challenges.extend(strategy.challenge());
                    let replace = match &error {
                        None => true,
                        Some(AuthError::MissingCredentials { .. }) => {
                            !matches!(err, AuthError::MissingCredentials { .. })
                        }
                        Some(_) => false,
                    };
                    if replace {
                        error = Some(err);
                    }
                }
            }
        }

        Err(Rejection {
            error: error.unwrap_or(AuthError::Rejected),
            challenges,
        })
    }
}

/// Check the `@requires` roles of a service against `user`.
pub fn authorize(user: &User, requires: &[String]) -> Result<(), AuthError> {
    if user.satisfies(requires) {
        return Ok(());
    }
    Err(AuthError::Forbidden {
        user: user.id.clone(),
        required: requires.join(", "),
    })
}
