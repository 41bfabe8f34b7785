//! HTTP surface for the retention tuning engine

pub mod envelope;
pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use handlers::ApiState;

/// Assemble the full application router.
pub fn app(state: ApiState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .nest("/api/v1/algorithm", routes::api_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
