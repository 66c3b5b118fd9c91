use axum::{
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
};
use cds_auth::{AuthError, Rejection};
use cds_errors::{catalog, ErrDef, ProblemResponse};
use thiserror::Error;

use crate::actions::ActionError;
use crate::executor::ExecError;

/// Everything a request can fail with, before it is rendered as Problem+JSON.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] odata_core::Error),

    #[error(transparent)]
    Translate(#[from] odata_cqn::Error),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("{}", .0.error)]
    Unauthorized(Rejection),

    #[error(transparent)]
    Forbidden(AuthError),

    #[error("service '{0}' is not served here")]
    ServiceNotFound(String),

    #[error("service '{service}' has no entity set '{set}'")]
    EntitySetNotFound { service: String, set: String },

    #[error("{entity}({key}) does not exist")]
    EntityNotFound { entity: String, key: String },

    #[error("'{entity}' has no bound operation '{action}'")]
    ActionNotFound { entity: String, action: String },

    #[error("action '{action}' failed: {source}")]
    Action {
        action: String,
        #[source]
        source: ActionError,
    },

    #[error("{method} is not allowed on {target}")]
    MethodNotAllowed { method: Method, target: String },

    #[error("request body is not valid JSON: {0}")]
    InvalidBody(String),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

fn request_def(err: &odata_core::Error) -> ErrDef {
    use odata_core::Error::*;
    match err {
        InvalidPath(_) => catalog::ODATA_INVALID_PATH,
        InvalidKey(_) => catalog::ODATA_INVALID_KEY,
        InvalidFilter(_)
        | InvalidOrderBy(_)
        | InvalidSelect(_)
        | InvalidOption { .. }
        | InvalidLiteral(_)
        | SkipTokenInvalidBase64
        | SkipTokenInvalidJson
        | SkipTokenInvalidVersion => catalog::ODATA_INVALID_QUERY,
    }
}

fn translate_def(err: &odata_cqn::Error) -> ErrDef {
    use odata_cqn::Error::*;
    match err {
        Request(e) => request_def(e),
        NotSupported { .. } => catalog::ODATA_NOT_SUPPORTED,
        UnknownOperation(_) => catalog::INTERNAL,
        UnknownProperty { .. } => catalog::ODATA_UNKNOWN_PROPERTY,
        InvalidKey { .. } | MissingKeys { .. } | KeyMismatch { .. } => catalog::ODATA_INVALID_KEY,
        InvalidPayload(_) | InvalidBinary { .. } => catalog::ODATA_INVALID_PAYLOAD,
        UnsupportedFunction(_) | BareIdentifier(_) | BareLiteral => catalog::ODATA_INVALID_QUERY,
    }
}

fn exec_def(err: &ExecError) -> ErrDef {
    match err {
        ExecError::UnknownEntity(_) => catalog::ENTITY_SET_NOT_FOUND,
        ExecError::Conflict { .. } => catalog::ENTITY_CONFLICT,
        ExecError::InvalidData { .. } => catalog::ODATA_INVALID_PAYLOAD,
        ExecError::Unsupported(_) => catalog::ODATA_NOT_SUPPORTED,
        ExecError::Seed { .. } | ExecError::SeedFormat { .. } => catalog::INTERNAL,
    }
}

impl ApiError {
    pub fn err_def(&self) -> ErrDef {
        match self {
            ApiError::Request(e) => request_def(e),
            ApiError::Translate(e) => translate_def(e),
            ApiError::Exec(e) => exec_def(e),
            ApiError::Unauthorized(_) => catalog::UNAUTHORIZED,
            ApiError::Forbidden(_) => catalog::FORBIDDEN,
            ApiError::ServiceNotFound(_) => catalog::SERVICE_NOT_FOUND,
            ApiError::EntitySetNotFound { .. } => catalog::ENTITY_SET_NOT_FOUND,
            ApiError::EntityNotFound { .. } => catalog::ENTITY_NOT_FOUND,
            ApiError::ActionNotFound { .. } => catalog::ACTION_NOT_FOUND,
            ApiError::Action { .. } => catalog::ACTION_FAILED,
            ApiError::MethodNotAllowed { .. } => catalog::METHOD_NOT_ALLOWED,
            ApiError::InvalidBody(_) => catalog::ODATA_INVALID_PAYLOAD,
            ApiError::Internal(_) => catalog::INTERNAL,
        }
    }

    /// Render as Problem+JSON for the request at `instance`.
    pub fn into_problem(self, instance: &str, request_id: &str) -> ProblemResponse {
        let def = self.err_def();
        let detail = match &self {
            ApiError::Internal(_)
            | ApiError::Exec(ExecError::Seed { .. } | ExecError::SeedFormat { .. }) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        if def.status >= 500 {
            match &self {
                ApiError::Internal(err) => tracing::error!(
                    request_id = %request_id,
                    error = ?err,
                    status = def.status,
                    "request failed"
                ),
                other => tracing::error!(
                    request_id = %request_id,
                    error = %other,
                    status = def.status,
                    "request failed"
                ),
            }
        } else {
            tracing::warn!(
                request_id = %request_id,
                error = %self,
                status = def.status,
                code = def.code,
                "request failed"
            );
        }

        let mut problem = def.to_problem(detail);
        if !instance.is_empty() {
            problem = problem.with_instance(instance);
        }
        if request_id != "n/a" {
            problem = problem.with_request_id(request_id);
        }

        let mut resp = ProblemResponse::from(problem);
        if let ApiError::Unauthorized(rejection) = &self {
            for challenge in &rejection.challenges {
                if let Ok(value) = HeaderValue::from_str(challenge) {
                    resp = resp.with_header(header::WWW_AUTHENTICATE, value);
                }
            }
        }
        resp
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_problem("", "n/a").into_response()
    }
}
