use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;

use crate::{
    AppState,
    auth::Caller,
    authorizer::{Requirement, authorize},
    error::{ActionError, ErrorBody},
    models::{
        AdminDashboardView, AdminDonationsView, AdminUsersView, Comment, Event, HomeView,
        LiveStream, PrayerWallEntry, ProfileView, Sermon, SignInPageView, SignUpPageView,
    },
};

const HOME_ITEMS: i64 = 3;
const DASHBOARD_RECENT: i64 = 5;
const ADMIN_INVITES_SHOWN: i64 = 10;

/// SignInQuery
///
/// Query parameters accepted by the sign-in page.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SignInQuery {
    /// Where to send the visitor after signing in. Only same-site paths are honored.
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

/// A callback must be a local absolute path. Browsers read `\` as `/` and drop tabs and
/// newlines, so `/\host` and `/<TAB>/host` are protocol-relative too.
fn local_callback(raw: Option<String>) -> Option<String> {
    raw.filter(|path| is_local_path(path))
}

fn is_local_path(path: &str) -> bool {
    let mut chars = path.chars();
    chars.next() == Some('/')
        && chars.next() != Some('/')
        && !path.chars().any(|c| c == '\\' || c.is_ascii_control())
}

// --- Public pages ---

/// home
///
/// [Public Page] The active live stream plus the next upcoming events and latest sermons.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Home page data", body = HomeView))
)]
pub async fn home(State(state): State<AppState>) -> Result<Json<HomeView>, ActionError> {
    let livestream = state
        .repo
        .get_livestream()
        .await?
        .filter(|stream| stream.is_active);
    let upcoming_events = state
        .repo
        .list_events(true, Some(Utc::now()), Some(HOME_ITEMS))
        .await?;
    let latest_sermons = state.repo.list_sermons(true, Some(HOME_ITEMS)).await?;

    Ok(Json(HomeView {
        livestream,
        upcoming_events,
        latest_sermons,
    }))
}

#[utoipa::path(
    get,
    path = "/sermons",
    responses((status = 200, description = "Published sermons, newest first", body = [Sermon]))
)]
pub async fn sermons(State(state): State<AppState>) -> Result<Json<Vec<Sermon>>, ActionError> {
    Ok(Json(state.repo.list_sermons(true, None).await?))
}

#[utoipa::path(
    get,
    path = "/events",
    responses((status = 200, description = "Published events, soonest first", body = [Event]))
)]
pub async fn events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, ActionError> {
    Ok(Json(state.repo.list_events(true, None, None).await?))
}

/// live
///
/// [Public Page] The live stream, or `null` when none is configured or it is switched off.
#[utoipa::path(
    get,
    path = "/live",
    responses((status = 200, description = "Active live stream", body = LiveStream))
)]
pub async fn live(State(state): State<AppState>) -> Result<Json<Option<LiveStream>>, ActionError> {
    let stream = state
        .repo
        .get_livestream()
        .await?
        .filter(|stream| stream.is_active);
    Ok(Json(stream))
}

// --- Auth-only pages ---

#[utoipa::path(
    get,
    path = "/auth/signin",
    params(SignInQuery),
    responses((status = 200, description = "Sign-in form data", body = SignInPageView))
)]
pub async fn sign_in(Query(query): Query<SignInQuery>) -> Json<SignInPageView> {
    Json(SignInPageView {
        callback_url: local_callback(query.callback_url),
    })
}

#[utoipa::path(
    get,
    path = "/auth/signup",
    responses((status = 200, description = "Sign-up form data", body = SignUpPageView))
)]
pub async fn sign_up(State(state): State<AppState>) -> Json<SignUpPageView> {
    Json(SignUpPageView {
        invite_only: state.config.invite_only,
    })
}

// --- Member pages ---

/// prayer_wall
///
/// [Member Page] Every request the caller may see (public ones and their own), each with
/// its comments attached.
#[utoipa::path(
    get,
    path = "/prayer",
    responses(
        (status = 200, description = "Prayer wall", body = [PrayerWallEntry]),
        (status = 307, description = "Redirect to sign-in")
    )
)]
pub async fn prayer_wall(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<PrayerWallEntry>>, ActionError> {
    let viewer = authorize(caller.as_ref(), Requirement::Member, None)?;

    let mut wall = state.repo.list_prayer_wall(viewer.id).await?;
    let ids: Vec<_> = wall.iter().map(|entry| entry.id).collect();
    let mut comments_by_request: HashMap<_, Vec<Comment>> = HashMap::new();
    for comment in state.repo.list_comments(&ids).await? {
        comments_by_request
            .entry(comment.prayer_request_id)
            .or_default()
            .push(comment);
    }
    for entry in &mut wall {
        entry.comments = comments_by_request.remove(&entry.id).unwrap_or_default();
    }

    Ok(Json(wall))
}

#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Own account and activity", body = ProfileView),
        (status = 307, description = "Redirect to sign-in")
    )
)]
pub async fn profile(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> Result<Json<ProfileView>, ActionError> {
    let identity = authorize(caller.as_ref(), Requirement::Member, None)?;

    let user = state
        .repo
        .get_user(identity.id)
        .await?
        .ok_or(ActionError::NotFound("User"))?;
    let activity = state.repo.get_user_activity(identity.id).await?;

    Ok(Json(ProfileView { user, activity }))
}

// --- Admin pages ---
// The route gate already keeps non-admins out; each handler re-checks regardless.

#[utoipa::path(
    get,
    path = "/admin",
    responses(
        (status = 200, description = "Dashboard", body = AdminDashboardView),
        (status = 307, description = "Redirect for anonymous or non-admin callers"),
        (status = 403, description = "Not an administrator", body = ErrorBody)
    )
)]
pub async fn admin_dashboard(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardView>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;

    Ok(Json(AdminDashboardView {
        stats: state.repo.get_stats().await?,
        recent_users: state.repo.list_users(Some(DASHBOARD_RECENT)).await?,
        recent_prayer_requests: state
            .repo
            .list_recent_prayer_requests(DASHBOARD_RECENT)
            .await?,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "Accounts and latest invite codes", body = AdminUsersView))
)]
pub async fn admin_users(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> Result<Json<AdminUsersView>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;

    Ok(Json(AdminUsersView {
        users: state.repo.list_users(None).await?,
        invite_codes: state.repo.list_invites(ADMIN_INVITES_SHOWN).await?,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/sermons",
    responses((status = 200, description = "All sermons, unpublished included", body = [Sermon]))
)]
pub async fn admin_sermons(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<Sermon>>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;
    Ok(Json(state.repo.list_sermons(false, None).await?))
}

#[utoipa::path(
    get,
    path = "/admin/events",
    responses((status = 200, description = "All events, unpublished included", body = [Event]))
)]
pub async fn admin_events(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> Result<Json<Vec<Event>>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;
    Ok(Json(state.repo.list_events(false, None, None).await?))
}

#[utoipa::path(
    get,
    path = "/admin/live",
    responses((status = 200, description = "Live stream configuration, active or not", body = LiveStream))
)]
pub async fn admin_live(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> Result<Json<Option<LiveStream>>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;
    Ok(Json(state.repo.get_livestream().await?))
}

/// admin_donations
///
/// [Admin Page] Every donation intent with count, total and average amount.
#[utoipa::path(
    get,
    path = "/admin/donations",
    responses((status = 200, description = "Donation intents and totals", body = AdminDonationsView))
)]
pub async fn admin_donations(
    Caller(caller): Caller,
    State(state): State<AppState>,
) -> Result<Json<AdminDonationsView>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;

    let donations = state.repo.list_donations().await?;
    let count = donations.len() as i64;
    let total_amount: f64 = donations.iter().map(|donation| donation.amount).sum();
    let average_amount = if count > 0 {
        total_amount / count as f64
    } else {
        0.0
    };

    Ok(Json(AdminDonationsView {
        donations,
        count,
        total_amount,
        average_amount,
    }))
}
