use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Modules ---

pub mod auth;
pub mod authorizer;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod invite;
pub mod models;
pub mod repository;
pub mod session;
pub mod validation;
pub mod views;

// Route groups, one per protection class.
pub mod routes;
use routes::{admin, api, authenticated, public};

// --- Re-exports used by main and the integration tests ---

pub use auth::{IdentityState, JwtIdentityResolver};
pub use config::AppConfig;
pub use gate::{GateConfig, GateState, RouteGate};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use views::{BroadcastInvalidator, ViewState};

/// ApiDoc
///
/// Auto-generates the OpenAPI document for every page and action decorated with
/// `#[utoipa::path]`. Served at `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::pages::home, handlers::pages::sermons, handlers::pages::events,
        handlers::pages::live, handlers::pages::sign_in, handlers::pages::sign_up,
        handlers::pages::prayer_wall, handlers::pages::profile,
        handlers::pages::admin_dashboard, handlers::pages::admin_users,
        handlers::pages::admin_sermons, handlers::pages::admin_events,
        handlers::pages::admin_live, handlers::pages::admin_donations,
        handlers::auth::sign_up, handlers::auth::sign_in, handlers::auth::sign_out,
        handlers::prayer::create_prayer_request, handlers::prayer::delete_prayer_request,
        handlers::prayer::add_comment, handlers::prayer::delete_comment,
        handlers::prayer::toggle_prayed,
        handlers::profile::update_profile,
        handlers::content::create_sermon, handlers::content::update_sermon,
        handlers::content::delete_sermon, handlers::content::create_event,
        handlers::content::update_event, handlers::content::delete_event,
        handlers::content::update_livestream,
        handlers::donations::create_donation,
        handlers::users::update_user_role, handlers::users::toggle_user_status,
        handlers::users::create_invite,
    ),
    components(
        schemas(
            models::Role, models::User, models::InviteCode, models::PrayerRequest,
            models::Comment, models::PrayerWallEntry, models::Sermon, models::Event,
            models::LiveStream, models::DonationIntent,
            models::SignUpRequest, models::SignInRequest, models::SessionResponse,
            models::PrayerRequestInput, models::CommentInput, models::PrayedResponse,
            models::SermonInput, models::EventInput, models::LiveStreamInput,
            models::DonationInput, models::ProfileInput, models::RoleChangeRequest,
            models::InviteRequest, models::ActionOk,
            models::HomeView, models::SignInPageView, models::SignUpPageView,
            models::UserActivity, models::ProfileView, models::AdminDashboardStats,
            models::AdminDashboardView, models::AdminUsersView, models::AdminDonationsView,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "congregation-portal", description = "Congregation Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container holding every service the handlers need. Shared
/// across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Record store.
    pub repo: RepositoryState,
    /// Session/identity provider.
    pub identity: IdentityState,
    /// Stale-view notifications for the presentation layer.
    pub views: ViewState,
    /// Page classification table, validated at startup.
    pub gate: Arc<RouteGate>,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Sub-state extraction ---

// Lets `State<T>`, the `Caller` extractor and the gate middleware borrow single services.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for GateState {
    fn from_ref(app_state: &AppState) -> GateState {
        GateState {
            gate: app_state.gate.clone(),
            identity: app_state.identity.clone(),
        }
    }
}

/// create_router
///
/// Assembles the application's entire routing structure, applies the route gate and the
/// observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Correlation header shared by the request-id layers and the trace span.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Routes
    let base_router = Router::new()
        // OpenAPI document and its browser.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .nest("/admin", admin::admin_routes())
        .nest("/api", api::api_routes())
        // Route gate: classifies every path and redirects before any page handler runs.
        .layer(middleware::from_fn_with_state(state.clone(), gate::route_gate))
        .with_state(state);

    // 3. Request id and tracing, outside the gate so redirects are traced too.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // Echo the id back so clients can quote it in bug reports.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the request id set by `SetRequestIdLayer`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
