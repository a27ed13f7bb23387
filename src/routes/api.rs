use crate::{
    AppState,
    handlers::{auth, content, donations, prayer, profile, users},
};
use axum::{
    Router,
    routing::{delete, post, put},
};

/// Action Router Module
///
/// Every mutation in the portal, mounted under `/api`. Requirements (member, admin,
/// owner-or-admin) are enforced per handler by the action authorizer, before the body
/// is validated.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // --- Session ---
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/signin", post(auth::sign_in))
        .route("/auth/signout", post(auth::sign_out))
        // --- Prayer wall (member) ---
        .route("/prayer", post(prayer::create_prayer_request))
        .route("/prayer/{id}", delete(prayer::delete_prayer_request))
        .route("/prayer/{id}/comments", post(prayer::add_comment))
        // POST /prayer/{id}/prayed
        // Toggle; the composite key on prayed_for keeps it to one record per member.
        .route("/prayer/{id}/prayed", post(prayer::toggle_prayed))
        .route("/comments/{id}", delete(prayer::delete_comment))
        .route("/profile", put(profile::update_profile))
        // --- Content (admin) ---
        .route("/sermons", post(content::create_sermon))
        .route(
            "/sermons/{id}",
            put(content::update_sermon).delete(content::delete_sermon),
        )
        .route("/events", post(content::create_event))
        .route(
            "/events/{id}",
            put(content::update_event).delete(content::delete_event),
        )
        .route("/livestream", put(content::update_livestream))
        // --- Donations (anyone) ---
        .route("/donations", post(donations::create_donation))
        // --- User management (admin) ---
        .route("/users/{id}/role", put(users::update_user_role))
        .route("/users/{id}/toggle-status", post(users::toggle_user_status))
        .route("/invites", post(users::create_invite))
}
