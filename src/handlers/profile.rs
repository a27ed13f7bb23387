use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::{
    AppState,
    auth::Caller,
    authorizer::{Requirement, authorize},
    error::{ActionError, ErrorBody},
    models::{ProfileInput, User},
    validation::{parse_body, validate_payload},
    views::View,
};

/// update_profile
///
/// [Member Action] Renames the caller's own account. Nothing else about an account is
/// self-service.
#[utoipa::path(
    put,
    path = "/api/profile",
    request_body = ProfileInput,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn update_profile(
    Caller(caller): Caller,
    State(state): State<AppState>,
    body: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<Json<User>, ActionError> {
    let identity = authorize(caller.as_ref(), Requirement::Member, None)?;
    let mut payload = parse_body(body)?;
    payload.name = payload.name.trim().to_string();
    validate_payload(&payload)?;

    let user = state
        .repo
        .update_user_name(identity.id, &payload.name)
        .await?
        .ok_or(ActionError::NotFound("User"))?;

    state.views.invalidate(&[View::Profile]);
    Ok(Json(user))
}
