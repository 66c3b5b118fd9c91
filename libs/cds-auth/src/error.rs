use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("missing {scheme} credentials")]
    MissingCredentials { scheme: &'static str },

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("token expired")]
    TokenExpired,

    #[error("authentication required but no usable strategy is configured")]
    Rejected,

    #[error("user '{user}' lacks one of the required roles: {required}")]
    Forbidden { user: String, required: String },

    #[error("unsupported authentication strategy '{0}'")]
    UnsupportedStrategy(String),

    #[error("authentication strategy '{strategy}' is unavailable: {reason}")]
    StrategyUnavailable { strategy: String, reason: String },
}

impl AuthError {
    /// Errors raised while assembling strategies, as opposed to per request.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuthError::UnsupportedStrategy(_) | AuthError::StrategyUnavailable { .. }
        )
    }
}
