use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{Caller, Identity},
    authorizer::{Requirement, authorize},
    error::{ActionError, ErrorBody},
    models::{ActionOk, Comment, CommentInput, PrayedResponse, PrayerRequest, PrayerRequestInput},
    repository::RepositoryState,
    validation::{parse_body, validate_payload},
    views::View,
};

const PRAYER_REQUEST: &str = "Prayer request";
const COMMENT: &str = "Comment";

/// Loads a request the caller is allowed to see. A private request belonging to someone
/// else is reported as missing rather than forbidden.
async fn visible_request(
    repo: &RepositoryState,
    id: Uuid,
    viewer: &Identity,
) -> Result<PrayerRequest, ActionError> {
    match repo.get_prayer_request(id).await? {
        Some(request) if request.is_public || request.user_id == viewer.id => Ok(request),
        _ => Err(ActionError::NotFound(PRAYER_REQUEST)),
    }
}

/// create_prayer_request
///
/// [Member Action] Posts a request on the prayer wall. `is_public = false` keeps it
/// visible to its owner only; `is_anonymous` hides the author's name from everyone.
#[utoipa::path(
    post,
    path = "/api/prayer",
    request_body = PrayerRequestInput,
    responses(
        (status = 201, description = "Request posted", body = PrayerRequest),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn create_prayer_request(
    Caller(caller): Caller,
    State(state): State<AppState>,
    body: Result<Json<PrayerRequestInput>, JsonRejection>,
) -> Result<(StatusCode, Json<PrayerRequest>), ActionError> {
    let identity = authorize(caller.as_ref(), Requirement::Member, None)?;
    let mut payload = parse_body(body)?;
    payload.title = payload.title.trim().to_string();
    payload.content = payload.content.trim().to_string();
    validate_payload(&payload)?;

    let request = state.repo.create_prayer_request(identity.id, payload).await?;

    state.views.invalidate(&[View::Prayer]);
    Ok((StatusCode::CREATED, Json(request)))
}

/// delete_prayer_request
///
/// [Member Action] Owner or admin only.
#[utoipa::path(
    delete,
    path = "/api/prayer/{id}",
    params(("id" = Uuid, Path, description = "Prayer request id")),
    responses(
        (status = 200, description = "Deleted", body = ActionOk),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_prayer_request(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionOk>, ActionError> {
    authorize(caller.as_ref(), Requirement::Member, None)?;

    let request = state
        .repo
        .get_prayer_request(id)
        .await?
        .ok_or(ActionError::NotFound(PRAYER_REQUEST))?;
    authorize(caller.as_ref(), Requirement::Member, Some(request.user_id))?;

    if !state.repo.delete_prayer_request(id).await? {
        return Err(ActionError::NotFound(PRAYER_REQUEST));
    }

    state.views.invalidate(&[View::Prayer]);
    Ok(Json(ActionOk::new()))
}

#[utoipa::path(
    post,
    path = "/api/prayer/{id}/comments",
    params(("id" = Uuid, Path, description = "Prayer request id")),
    request_body = CommentInput,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 404, description = "Request not found", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn add_comment(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(prayer_request_id): Path<Uuid>,
    body: Result<Json<CommentInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Comment>), ActionError> {
    let identity = authorize(caller.as_ref(), Requirement::Member, None)?;
    let mut payload = parse_body(body)?;
    payload.content = payload.content.trim().to_string();
    validate_payload(&payload)?;

    visible_request(&state.repo, prayer_request_id, identity).await?;
    let comment = state
        .repo
        .add_comment(prayer_request_id, identity.id, payload.content)
        .await?;

    state.views.invalidate(&[View::Prayer]);
    Ok((StatusCode::CREATED, Json(comment)))
}

/// delete_comment
///
/// [Member Action] Owner or admin only.
#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Deleted", body = ActionOk),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_comment(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionOk>, ActionError> {
    authorize(caller.as_ref(), Requirement::Member, None)?;

    let comment = state
        .repo
        .get_comment(id)
        .await?
        .ok_or(ActionError::NotFound(COMMENT))?;
    authorize(caller.as_ref(), Requirement::Member, Some(comment.user_id))?;

    if !state.repo.delete_comment(id).await? {
        return Err(ActionError::NotFound(COMMENT));
    }

    state.views.invalidate(&[View::Prayer]);
    Ok(Json(ActionOk::new()))
}

/// toggle_prayed
///
/// [Member Action] Marks or unmarks "I prayed for this". The response carries the state
/// after the toggle.
#[utoipa::path(
    post,
    path = "/api/prayer/{id}/prayed",
    params(("id" = Uuid, Path, description = "Prayer request id")),
    responses(
        (status = 200, description = "Toggled", body = PrayedResponse),
        (status = 404, description = "Request not found", body = ErrorBody)
    )
)]
pub async fn toggle_prayed(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(prayer_request_id): Path<Uuid>,
) -> Result<Json<PrayedResponse>, ActionError> {
    let identity = authorize(caller.as_ref(), Requirement::Member, None)?;
    visible_request(&state.repo, prayer_request_id, identity).await?;

    let prayed = state
        .repo
        .toggle_prayed(identity.id, prayer_request_id)
        .await?;

    state.views.invalidate(&[View::Prayer]);
    Ok(Json(PrayedResponse { prayed }))
}
