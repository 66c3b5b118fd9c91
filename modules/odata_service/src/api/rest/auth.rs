use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Request},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use cds_auth::{authorize, AuthError, User};

use crate::error::ApiError;
use crate::state::AppState;
use crate::trace;

/// Authenticate the caller of `service` and check its `@requires` roles.
///
/// Services without restrictions accept callers that sent no credentials as
/// anonymous users, even when strategies are configured.
pub fn authenticate(state: &AppState, service: &str, headers: &HeaderMap) -> Result<User, ApiError> {
    let mounted = state
        .mounted(service)
        .ok_or_else(|| ApiError::ServiceNotFound(service.to_string()))?;

    let user = match mounted.authenticator.authenticate(headers) {
        Ok(user) => user,
        Err(rejection)
            if !mounted.restricted
                && matches!(rejection.error, AuthError::MissingCredentials { .. }) =>
        {
            User::anonymous()
        }
        Err(rejection) => return Err(ApiError::Unauthorized(rejection)),
    };

    authorize(&user, &mounted.requires).map_err(ApiError::Forbidden)?;
    Ok(user)
}

/// Route middleware for everything below `/odata/v4/{service}` and
/// `/v2/{service}`: puts the authenticated [`User`] into request extensions.
pub async fn require_user(
    Extension(state): Extension<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    mut req: Request,
    next: Next,
) -> Response {
    let service = params.get("service").map(String::as_str).unwrap_or_default();
    match authenticate(&state, service, req.headers()) {
        Ok(user) => {
            tracing::debug!(service, user = %user.id, anonymous = user.is_anonymous(), "caller authenticated");
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(err) => {
            let rid = trace::request_id(req.headers());
            err.into_problem(req.uri().path(), &rid).into_response()
        }
    }
}
