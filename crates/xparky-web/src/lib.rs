//! HTTP dashboard server for XParky points.
//!
//! - [`routes`]: JSON/CSV/PNG handlers and the router
//! - [`state`]: shared leaderboard, submissions and certificate state
//! - [`problem`]: RFC 9457 error responses
//! - [`health`]: liveness and readiness probes
//! - [`logging`]: tracing subscriber setup

pub mod health;
pub mod logging;
pub mod problem;
pub mod routes;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use logging::{init_logging, LoggingConfig};
pub use problem::ProblemDetails;
pub use state::{AppState, ReviewDecision, REFRESH_RETRY_SECS};

/// Build the application router with every endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/leaderboard", get(routes::get_leaderboard))
        .route("/api/v1/leaderboard.csv", get(routes::get_leaderboard_csv))
        .route("/api/v1/leaderboard/refresh", post(routes::refresh_leaderboard))
        .route("/api/v1/cadets/{student_number}", get(routes::get_cadet))
        .route(
            "/api/v1/submissions",
            get(routes::list_submissions).post(routes::create_submission),
        )
        .route("/api/v1/submissions/{id}/verify", post(routes::verify_submission))
        .route("/api/v1/submissions/{id}/reject", post(routes::reject_submission))
        .route("/api/v1/certificates/events", get(routes::list_certificate_events))
        .route("/api/v1/certificates/events/{event}", get(routes::list_certificate_names))
        .route(
            "/api/v1/certificates/events/{event}/{name}",
            get(routes::download_certificate),
        )
        .route("/api/v1/theme", get(routes::get_theme))
        .route("/health/live", get(health::health_live))
        .route("/health/ready", get(health::health_ready))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
