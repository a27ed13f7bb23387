use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::Caller,
    authorizer::{Requirement, authorize},
    error::{ActionError, ErrorBody},
    models::{ActionOk, Event, EventInput, LiveStream, LiveStreamInput, Sermon, SermonInput},
    validation::{ensure_event_window, parse_body, validate_payload},
    views::View,
};

const SERMON_VIEWS: &[View] = &[View::Sermons, View::AdminSermons, View::Home];
const EVENT_VIEWS: &[View] = &[View::Events, View::AdminEvents, View::Home];
const LIVE_VIEWS: &[View] = &[View::Live, View::AdminLive, View::Home];

// --- Sermons ---

/// create_sermon
///
/// [Admin Action] Publishes a sermon. Blank URL fields are stored as absent.
#[utoipa::path(
    post,
    path = "/api/sermons",
    request_body = SermonInput,
    responses(
        (status = 201, description = "Sermon created", body = Sermon),
        (status = 403, description = "Not an administrator", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn create_sermon(
    Caller(caller): Caller,
    State(state): State<AppState>,
    body: Result<Json<SermonInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Sermon>), ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;
    let payload = parse_body(body)?;
    validate_payload(&payload)?;

    let sermon = state.repo.create_sermon(payload).await?;

    state.views.invalidate(SERMON_VIEWS);
    Ok((StatusCode::CREATED, Json(sermon)))
}

#[utoipa::path(
    put,
    path = "/api/sermons/{id}",
    params(("id" = Uuid, Path, description = "Sermon id")),
    request_body = SermonInput,
    responses(
        (status = 200, description = "Sermon replaced", body = Sermon),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn update_sermon(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<SermonInput>, JsonRejection>,
) -> Result<Json<Sermon>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;
    let payload = parse_body(body)?;
    validate_payload(&payload)?;

    let sermon = state
        .repo
        .update_sermon(id, payload)
        .await?
        .ok_or(ActionError::NotFound("Sermon"))?;

    state.views.invalidate(SERMON_VIEWS);
    Ok(Json(sermon))
}

#[utoipa::path(
    delete,
    path = "/api/sermons/{id}",
    params(("id" = Uuid, Path, description = "Sermon id")),
    responses(
        (status = 200, description = "Deleted", body = ActionOk),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_sermon(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionOk>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;

    if !state.repo.delete_sermon(id).await? {
        return Err(ActionError::NotFound("Sermon"));
    }

    state.views.invalidate(SERMON_VIEWS);
    Ok(Json(ActionOk::new()))
}

// --- Events ---

/// create_event
///
/// [Admin Action] Schedules an event. An end date, when given, may not precede the start.
#[utoipa::path(
    post,
    path = "/api/events",
    request_body = EventInput,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 403, description = "Not an administrator", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn create_event(
    Caller(caller): Caller,
    State(state): State<AppState>,
    body: Result<Json<EventInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Event>), ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;
    let payload = parse_body(body)?;
    validate_payload(&payload)?;
    ensure_event_window(payload.start_date, payload.end_date)?;

    let event = state.repo.create_event(payload).await?;

    state.views.invalidate(EVENT_VIEWS);
    Ok((StatusCode::CREATED, Json(event)))
}

#[utoipa::path(
    put,
    path = "/api/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body = EventInput,
    responses(
        (status = 200, description = "Event replaced", body = Event),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn update_event(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<EventInput>, JsonRejection>,
) -> Result<Json<Event>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;
    let payload = parse_body(body)?;
    validate_payload(&payload)?;
    ensure_event_window(payload.start_date, payload.end_date)?;

    let event = state
        .repo
        .update_event(id, payload)
        .await?
        .ok_or(ActionError::NotFound("Event"))?;

    state.views.invalidate(EVENT_VIEWS);
    Ok(Json(event))
}

#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Deleted", body = ActionOk),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_event(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionOk>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;

    if !state.repo.delete_event(id).await? {
        return Err(ActionError::NotFound("Event"));
    }

    state.views.invalidate(EVENT_VIEWS);
    Ok(Json(ActionOk::new()))
}

// --- Live stream ---

/// update_livestream
///
/// [Admin Action] Replaces the single live stream configuration, creating it on first use.
#[utoipa::path(
    put,
    path = "/api/livestream",
    request_body = LiveStreamInput,
    responses(
        (status = 200, description = "Live stream saved", body = LiveStream),
        (status = 403, description = "Not an administrator", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn update_livestream(
    Caller(caller): Caller,
    State(state): State<AppState>,
    body: Result<Json<LiveStreamInput>, JsonRejection>,
) -> Result<Json<LiveStream>, ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;
    let payload = parse_body(body)?;
    validate_payload(&payload)?;

    let stream = state.repo.upsert_livestream(payload).await?;

    state.views.invalidate(LIVE_VIEWS);
    Ok(Json(stream))
}
