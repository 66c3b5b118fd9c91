//! HS256 bearer tokens.

use http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use serde_json::Value as Json;

use crate::config::JwtConfig;
use crate::strategy::{authorization, AuthStrategy};
use crate::{AuthError, User};

#[derive(Deserialize)]
struct Claims {
    sub: Option<String>,
    user_name: Option<String>,
    /// Space-separated string or list.
    scope: Option<Json>,
    zid: Option<String>,
    tenant: Option<String>,
}

#[derive(Clone)]
pub struct JwtAuth {
    config: JwtConfig,
    validation: Validation,
}

impl std::fmt::Debug for JwtAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuth")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish_non_exhaustive()
    }
}

fn invalid(reason: &str) -> AuthError {
    AuthError::InvalidCredentials(reason.to_string())
}

fn scopes(raw: Option<Json>) -> Vec<String> {
    match raw {
        Some(Json::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        Some(Json::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// HS256 only; `exp` and `nbf` are checked when present, `iss` and `aud`
/// when configured.
fn validation(config: &JwtConfig) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_nbf = true;
    validation.leeway = config.leeway_sec.max(0) as u64;
    if let Some(issuer) = &config.issuer {
        validation.set_issuer(&[issuer]);
    }
    match &config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }
    validation
}

fn rejection(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::ImmatureSignature => invalid("token not yet valid"),
        ErrorKind::InvalidSignature => invalid("signature mismatch"),
        ErrorKind::InvalidAlgorithm => invalid("unsupported signing algorithm"),
        ErrorKind::InvalidIssuer => invalid("unexpected issuer"),
        ErrorKind::InvalidAudience => invalid("unexpected audience"),
        _ => invalid("malformed token"),
    }
}

impl JwtAuth {
    pub fn new(config: JwtConfig) -> Self {
        let validation = validation(&config);
        Self { config, validation }
    }

    /// Sign `claims` with the configured secret. Used by tests and tooling.
    pub fn sign(&self, claims: &Json) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|_| invalid("unserializable claims"))
    }

    pub fn verify(&self, token: &str) -> Result<User, AuthError> {
        let key = DecodingKey::from_secret(self.config.secret.as_bytes());
        let claims = decode::<Claims>(token, &key, &self.validation)
            .map_err(rejection)?
            .claims;

        let id = claims
            .user_name
            .or(claims.sub)
            .ok_or_else(|| invalid("token has no subject"))?;
        Ok(User::new(id)
            .with_roles(scopes(claims.scope))
            .with_tenant(claims.zid.or(claims.tenant)))
    }
}

impl AuthStrategy for JwtAuth {
    fn name(&self) -> &'static str {
        "jwt"
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        let token =
            authorization(headers, "bearer").ok_or(AuthError::MissingCredentials { scheme: "bearer" })?;
        self.verify(token)
    }

    fn challenge(&self) -> Option<String> {
        Some("Bearer".to_string())
    }
}
