use std::sync::Arc;

use axum::{
    handler::HandlerWithoutStateExt,
    middleware::from_fn,
    routing::{any, get},
    Extension, Router,
};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
};

use super::{auth, handlers, index, v2};
use crate::trace::{self, UuidRequestId};
use crate::state::AppState;

/// Service routes; every one of them runs behind [`auth::require_user`].
fn service_routes() -> Router {
    Router::new()
        .route("/odata/v4/{service}", get(handlers::service_document))
        .route("/odata/v4/{service}/", get(handlers::service_document))
        .route("/odata/v4/{service}/{*path}", any(handlers::odata_v4))
        .route("/v2/{service}", get(v2::service_document))
        .route("/v2/{service}/", get(v2::service_document))
        .route("/v2/{service}/{*path}", any(v2::odata_v2))
        .route_layer(from_fn(auth::require_user))
}

/// Complete HTTP surface: index page, health, OData v4 and v2 mounts, and
/// static assets as fallback.
pub fn build_router(state: Arc<AppState>) -> Router {
    let settings = state.settings.clone();

    let mut router = Router::new()
        .route("/", get(index::index_page))
        .route("/health", get(handlers::health_check))
        .merge(service_routes());

    router = match &settings.static_dir {
        Some(dir) => {
            tracing::debug!(dir = %dir.display(), "serving static assets");
            router.fallback_service(
                ServeDir::new(dir).not_found_service(handlers::not_found.into_service()),
            )
        }
        None => router.fallback(handlers::not_found),
    };
    router = router.layer(Extension(state));

    // Layers wrap from the inside out: the last one added sees the request
    // first. Order on the way in: SetRequestId -> PropagateRequestId ->
    // Trace -> Timeout -> CORS -> BodyLimit.
    router = router.layer(RequestBodyLimitLayer::new(settings.body_limit));
    if settings.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }
    router = router.layer(TimeoutLayer::new(settings.request_timeout));
    router = router.layer(trace::trace_layer());

    let x_request_id = trace::request_id_header();
    router = router.layer(PropagateRequestIdLayer::new(x_request_id.clone()));
    router.layer(SetRequestIdLayer::new(x_request_id, UuidRequestId))
}
