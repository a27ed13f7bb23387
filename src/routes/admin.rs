use crate::{AppState, handlers::pages};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Oversight pages for administrators, mounted under `/admin`. Non-admin members are
/// redirected home by the route gate; every handler re-checks the admin requirement.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // Dashboard counters, newest accounts and newest prayer requests.
        .route("/", get(pages::admin_dashboard))
        .route("/users", get(pages::admin_users))
        .route("/sermons", get(pages::admin_sermons))
        .route("/events", get(pages::admin_events))
        .route("/live", get(pages::admin_live))
        .route("/donations", get(pages::admin_donations))
}
