//! Authentication for mounted services: the strategies a request can be
//! authenticated with and the mount-time decision of which ones apply.

mod config;
mod error;
#[cfg(feature = "jwt")]
mod jwt;
mod select;
mod strategy;
mod user;

pub use config::{AuthConfig, Environment, JwtConfig, UserConfig};
pub use error::AuthError;
#[cfg(feature = "jwt")]
pub use jwt::JwtAuth;
pub use select::{authorize, select_strategies, Authenticator, Rejection, Selection};
pub use strategy::{AuthStrategy, BasicAuth, DummyAuth};
pub use user::{User, ROLE_ANY, ROLE_AUTHENTICATED};
