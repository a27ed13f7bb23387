use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;

use crate::{
    AppState,
    error::{ActionError, ErrorBody},
    invite,
    models::{ActionOk, NewUser, SessionResponse, SignInRequest, SignUpRequest, User},
    session::{
        hash_password, issue_token, session_cookie, session_cookie_removal, verify_password,
        verify_unknown_account,
    },
    validation::{ensure_password_strength, parse_body, validate_payload},
    views::View,
};

/// sign_up
///
/// [Public Action] Creates a member account. In invite-only mode the request must carry a
/// valid invite code; the code is consumed in the same store transaction that creates the
/// account, so a failed signup never burns a code.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 403, description = "Invite code bound to another email", body = ErrorBody),
        (status = 404, description = "Unknown invite code", body = ErrorBody),
        (status = 409, description = "Email taken or invite code already used", body = ErrorBody),
        (status = 410, description = "Invite code expired", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn sign_up(
    State(state): State<AppState>,
    body: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ActionError> {
    let payload = parse_body(body)?;
    validate_payload(&payload)?;
    ensure_password_strength(&payload.password)?;

    let invite_code = match (state.config.invite_only, payload.invite_code.as_deref()) {
        (true, None) => {
            return Err(ActionError::validation(
                "invite_code",
                "An invite code is required to sign up",
            ));
        }
        (true, Some(code)) => Some(code.to_string()),
        // Outside invite-only mode a supplied code is ignored.
        (false, _) => None,
    };

    let email = payload.email.trim().to_lowercase();
    let account = NewUser {
        name: payload.name.trim().to_string(),
        email: email.clone(),
        password_hash: hash_password(&payload.password)?,
    };

    let user = match invite_code {
        Some(code) => invite::redeem(&state.repo, &code, &email, account, Utc::now()).await?,
        None => state.repo.create_user(account).await?,
    };

    tracing::info!(user_id = %user.id, "account created");
    state.views.invalidate(&[View::AdminUsers, View::Admin]);
    Ok((StatusCode::CREATED, Json(user)))
}

/// sign_in
///
/// [Public Action] Verifies credentials and issues a session token, returned in the body
/// and set as the http-only session cookie. Unknown emails, wrong passwords and disabled
/// accounts all produce the same error.
#[utoipa::path(
    post,
    path = "/api/auth/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SessionResponse>), ActionError> {
    let payload = parse_body(body)?;
    validate_payload(&payload)?;

    let Some(credentials) = state.repo.get_credentials_by_email(&payload.email).await? else {
        verify_unknown_account(&payload.password);
        return Err(ActionError::InvalidCredentials);
    };

    if !verify_password(&payload.password, &credentials.password_hash) {
        return Err(ActionError::InvalidCredentials);
    }
    if !credentials.is_active {
        tracing::info!(user_id = %credentials.id, "sign-in refused for disabled account");
        return Err(ActionError::InvalidCredentials);
    }

    let user = state
        .repo
        .get_user(credentials.id)
        .await?
        .ok_or(ActionError::InvalidCredentials)?;
    let token = issue_token(user.id, &state.config, Utc::now())?;

    tracing::debug!(user_id = %user.id, "session issued");
    let jar = jar.add(session_cookie(token.clone(), &state.config));
    Ok((jar, Json(SessionResponse { token, user })))
}

/// sign_out
///
/// [Public Action] Expires the session cookie. Bearer tokens simply run out.
#[utoipa::path(
    post,
    path = "/api/auth/signout",
    responses((status = 200, description = "Signed out", body = ActionOk))
)]
pub async fn sign_out(jar: CookieJar) -> (CookieJar, Json<ActionOk>) {
    (jar.add(session_cookie_removal()), Json(ActionOk::new()))
}
