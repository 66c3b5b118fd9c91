use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, Query},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use cds_auth::User;
use odata_core::{Page, QueryParams};
use serde_json::{json, Map, Value};

use super::reply::{self, entity_sets, next_link, Call, Reply};
use crate::state::AppState;
use crate::trace;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Any route nobody claimed and no static file matched.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> Response {
    cds_errors::not_found(format!("no resource at {}", uri.path()))
        .into_response()
}

/// `GET /odata/v4/{service}/`
pub async fn service_document(
    Extension(state): Extension<Arc<AppState>>,
    Path(service): Path<String>,
) -> Json<Value> {
    let sets: Vec<Value> = entity_sets(&state.model, &service)
        .into_iter()
        .map(|set| json!({ "name": set, "url": set, "kind": "EntitySet" }))
        .collect();
    Json(json!({
        "@odata.context": format!("/odata/v4/{}/$metadata", service),
        "value": sets
    }))
}

/// Object members prefixed with `@odata.context`.
fn with_context(context: String, row: Value) -> Value {
    match row {
        Value::Object(fields) => {
            let mut out = Map::with_capacity(fields.len() + 1);
            out.insert("@odata.context".into(), Value::String(context));
            out.extend(fields);
            Value::Object(out)
        }
        other => other,
    }
}

pub(crate) fn count_response(n: u64) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        n.to_string(),
    )
        .into_response()
}

pub(crate) fn created_response(location: &str, body: Value) -> Response {
    let mut resp = (StatusCode::CREATED, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        resp.headers_mut().insert(header::LOCATION, value);
    }
    resp
}

fn render(reply: Reply, base: &str, path: &str, raw_query: Option<&str>) -> Response {
    let metadata = format!("{}/$metadata", base);
    match reply {
        Reply::Collection {
            set,
            rows,
            count,
            next,
        } => {
            let page = Page::new(rows)
                .with_context(format!("{}#{}", metadata, set))
                .with_count(count)
                .with_next_link(next.map(|token| next_link(path, raw_query, &token)));
            Json(page).into_response()
        }
        Reply::Entity { set, row } => {
            Json(with_context(format!("{}#{}/$entity", metadata, set), row)).into_response()
        }
        Reply::Created { set, location, row } => created_response(
            &format!("{}/{}", base, location),
            with_context(format!("{}#{}/$entity", metadata, set), row),
        ),
        Reply::Count(n) => count_response(n),
        Reply::Value(value @ Value::Object(_)) => Json(value).into_response(),
        Reply::Value(value) => Json(json!({ "value": value })).into_response(),
        Reply::NoContent => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Everything below `/odata/v4/{service}/`: reads, `$count`, writes and
/// bound operations.
#[allow(clippy::too_many_arguments)]
pub async fn odata_v4(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<User>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Path((service, path)): Path<(String, String)>,
    Query(params): Query<QueryParams>,
    body: Bytes,
) -> Response {
    let call = Call {
        service: &service,
        raw_path: &path,
        params: &params,
        method: &method,
        body: &body,
        user: &user,
    };
    match reply::execute(&state, call).await {
        Ok(reply) => render(
            reply,
            &format!("/odata/v4/{}", service),
            uri.path(),
            uri.query(),
        ),
        Err(err) => err
            .into_problem(uri.path(), &trace::request_id(&headers))
            .into_response(),
    }
}
