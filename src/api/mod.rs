pub mod routes;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::simulator::Simulator;

/// The HTTP control surface: parameter echo/update, results, performance,
/// and a liveness probe. Public routes merged, with CORS and request
/// logging layered on top.
///
/// Per-IP rate limiting (`middleware::rate_limit`) is available but not
/// mounted here: it requires a real `ConnectInfo<SocketAddr>`, which the
/// integration tests (`tests/control_surface.rs`) exercise via
/// `tower::ServiceExt::oneshot` without a bound socket. A deployment that
/// serves via `into_make_service_with_connect_info` can layer it in main.rs.
pub fn router(simulator: Simulator) -> Router {
    Router::new()
        .route("/api/parameters", get(routes::get_parameters).post(routes::set_parameter))
        .route("/api/results", get(routes::get_results))
        .route("/api/performance", get(routes::get_performance))
        .route("/health", get(routes::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(crate::middleware::logging::request_logging_simple))
        .with_state(simulator)
}
