//! OData v2 compatibility mount.
//!
//! Requests below `/v2/{service}/` run through the same execution path as
//! v4; only query-option spelling and the response envelope differ.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, Query},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use cds_auth::User;
use odata_core::QueryParams;
use serde_json::{json, Map, Value};

use super::handlers::{count_response, created_response};
use super::reply::{self, entity_sets, next_link, Call, Reply};
use crate::error::ApiError;
use crate::state::AppState;
use crate::trace;

/// Rewrite v2-only options into their v4 form: `$inlinecount=allpages`
/// becomes `$count=true`, `$inlinecount=none` is dropped.
pub fn to_v4_params(mut params: QueryParams) -> Result<QueryParams, odata_core::Error> {
    if let Some(mode) = params.inlinecount.take() {
        match mode.trim() {
            "allpages" => params.count = Some("true".into()),
            "none" => {}
            other => {
                return Err(odata_core::Error::InvalidOption {
                    option: "$inlinecount",
                    value: other.to_string(),
                })
            }
        }
    }
    Ok(params)
}

fn envelope(d: Value) -> Json<Value> {
    Json(json!({ "d": d }))
}

fn render(reply: Reply, base: &str, path: &str, raw_query: Option<&str>) -> Response {
    match reply {
        Reply::Collection {
            rows, count, next, ..
        } => {
            let mut d = Map::new();
            d.insert("results".into(), Value::Array(rows));
            if let Some(n) = count {
                // v2 sends the inline count as a string
                d.insert("__count".into(), Value::String(n.to_string()));
            }
            if let Some(token) = next {
                d.insert("__next".into(), Value::String(next_link(path, raw_query, &token)));
            }
            envelope(Value::Object(d)).into_response()
        }
        Reply::Entity { row, .. } | Reply::Value(row) => envelope(row).into_response(),
        Reply::Created { location, row, .. } => {
            created_response(&format!("{}/{}", base, location), json!({ "d": row }))
        }
        Reply::Count(n) => count_response(n),
        Reply::NoContent => StatusCode::NO_CONTENT.into_response(),
    }
}

/// `GET /v2/{service}/`
pub async fn service_document(
    Extension(state): Extension<Arc<AppState>>,
    Path(service): Path<String>,
) -> Json<Value> {
    envelope(json!({ "EntitySets": entity_sets(&state.model, &service) }))
}

#[allow(clippy::too_many_arguments)]
pub async fn odata_v2(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<User>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Path((service, path)): Path<(String, String)>,
    Query(params): Query<QueryParams>,
    body: Bytes,
) -> Response {
    let rid = trace::request_id(&headers);
    let params = match to_v4_params(params) {
        Ok(params) => params,
        Err(err) => {
            return ApiError::from(err)
                .into_problem(uri.path(), &rid)
                .into_response()
        }
    };
    tracing::debug!(%service, %path, "proxying v2 request");

    let call = Call {
        service: &service,
        raw_path: &path,
        params: &params,
        method: &method,
        body: &body,
        user: &user,
    };
    match reply::execute(&state, call).await {
        Ok(reply) => render(reply, &format!("/v2/{}", service), uri.path(), uri.query()),
        Err(err) => err.into_problem(uri.path(), &rid).into_response(),
    }
}
