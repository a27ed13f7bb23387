use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::Caller,
    authorizer::{Requirement, authorize, guard_role_change, guard_status_toggle},
    error::{ActionError, ErrorBody},
    invite,
    models::{InviteCode, InviteRequest, RoleChangeRequest, User},
    validation::{parse_body, validate_payload},
    views::View,
};

const USER_VIEWS: &[View] = &[View::AdminUsers, View::Admin];

/// update_user_role
///
/// [Admin Action] Promotes or demotes an account. An administrator cannot demote
/// themselves; demoting another administrator is allowed.
#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(("id" = Uuid, Path, description = "Target account id")),
    request_body = RoleChangeRequest,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 403, description = "Not an administrator, or self-demotion", body = ErrorBody),
        (status = 404, description = "Account not found", body = ErrorBody)
    )
)]
pub async fn update_user_role(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(target): Path<Uuid>,
    body: Result<Json<RoleChangeRequest>, JsonRejection>,
) -> Result<Json<User>, ActionError> {
    let admin = authorize(caller.as_ref(), Requirement::Admin, None)?;
    let payload = parse_body(body)?;
    guard_role_change(admin, target, payload.role)?;

    let user = state
        .repo
        .update_user_role(target, payload.role)
        .await?
        .ok_or(ActionError::NotFound("User"))?;

    tracing::info!(by = %admin.id, user_id = %user.id, role = user.role.as_str(), "role changed");
    state.views.invalidate(USER_VIEWS);
    Ok(Json(user))
}

/// toggle_user_status
///
/// [Admin Action] Enables or disables an account. A disabled account cannot sign in and
/// its existing sessions resolve as anonymous. Administrators cannot disable themselves.
#[utoipa::path(
    post,
    path = "/api/users/{id}/toggle-status",
    params(("id" = Uuid, Path, description = "Target account id")),
    responses(
        (status = 200, description = "Status toggled", body = User),
        (status = 403, description = "Not an administrator, or self-disable", body = ErrorBody),
        (status = 404, description = "Account not found", body = ErrorBody)
    )
)]
pub async fn toggle_user_status(
    Caller(caller): Caller,
    State(state): State<AppState>,
    Path(target): Path<Uuid>,
) -> Result<Json<User>, ActionError> {
    let admin = authorize(caller.as_ref(), Requirement::Admin, None)?;
    guard_status_toggle(admin, target)?;

    let user = state
        .repo
        .toggle_user_active(target)
        .await?
        .ok_or(ActionError::NotFound("User"))?;

    tracing::info!(by = %admin.id, user_id = %user.id, active = user.is_active, "account status toggled");
    state.views.invalidate(USER_VIEWS);
    Ok(Json(user))
}

/// create_invite
///
/// [Admin Action] Issues a single-use invite code, optionally bound to one email address.
#[utoipa::path(
    post,
    path = "/api/invites",
    request_body = InviteRequest,
    responses(
        (status = 201, description = "Invite code issued", body = InviteCode),
        (status = 403, description = "Not an administrator", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn create_invite(
    Caller(caller): Caller,
    State(state): State<AppState>,
    body: Result<Json<InviteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<InviteCode>), ActionError> {
    authorize(caller.as_ref(), Requirement::Admin, None)?;
    let payload = parse_body(body)?;
    validate_payload(&payload)?;

    let invite = invite::issue(&state.repo, caller.as_ref(), payload.email, Utc::now()).await?;

    state.views.invalidate(&[View::AdminUsers]);
    Ok((StatusCode::CREATED, Json(invite)))
}
