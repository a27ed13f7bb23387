use crate::{AppState, handlers::pages};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Read-only pages any visitor may load. The repository queries behind them only return
/// published content.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        .route("/", get(pages::home))
        .route("/sermons", get(pages::sermons))
        .route("/events", get(pages::events))
        .route("/live", get(pages::live))
        // Auth-only: a signed-in caller is sent home by the route gate.
        .route("/auth/signin", get(pages::sign_in))
        .route("/auth/signup", get(pages::sign_up))
}
