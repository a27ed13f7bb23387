use crate::{AppState, handlers::pages};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Pages for any signed-in member. The handlers read the caller resolved by the route gate
/// and still run the member requirement themselves.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /prayer
        // The prayer wall: public requests plus the caller's own private ones.
        .route("/prayer", get(pages::prayer_wall))
        // GET /profile
        // The caller's own account and activity counters.
        .route("/profile", get(pages::profile))
}
