//! HTTP API router composition.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::binding::{bind, Bound, BoundRoute, HandlerSet};
use super::handlers::{handle_panic, not_found};
use crate::contract::Contract;
use crate::error::BindingError;
use crate::metrics;

/// Create the API router: bind `contract` under `base_path`, then wrap every
/// route in the shared middleware stack.
pub fn create_router<S>(
    contract: &Contract,
    base_path: &str,
    handlers: HandlerSet<S>,
    state: S,
) -> Result<(Router, Vec<BoundRoute>), BindingError>
where
    S: Clone + Send + Sync + 'static,
{
    let Bound { mut router, routes } = bind(contract, base_path, handlers)?;

    // Route layers see the matched template, so metric labels stay bounded.
    // axum refuses a route layer on a router without routes.
    if !routes.is_empty() {
        router = router.route_layer(middleware::from_fn(track_requests));
    }

    let router = router.fallback(not_found).with_state(state);

    Ok((with_middleware(router), routes))
}

/// Attach request tracing, panic recovery and CORS.
///
/// Layers are added innermost first; tracing sees the final response.
pub fn with_middleware(router: Router) -> Router {
    router
        .layer(cors_layer())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// Permit any origin for the standard methods.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods([
        Method::GET,
        Method::HEAD,
        Method::PUT,
        Method::PATCH,
        Method::POST,
        Method::DELETE,
    ])
}

async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    metrics::record_http_request(start, method.as_str(), &endpoint, response.status().as_u16());
    response
}
