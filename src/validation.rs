use axum::{Json, extract::rejection::JsonRejection};
use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    error::ActionError,
    models::{
        CommentInput, DonationInput, EventInput, InviteRequest, LiveStreamInput,
        PrayerRequestInput, ProfileInput, SermonInput, SignInRequest, SignUpRequest,
    },
};

/// FieldOrder
///
/// The declared field order of a payload. `validator` collects errors in a hash map,
/// so this is what decides which violation is reported first.
pub trait FieldOrder {
    const FIELDS: &'static [&'static str];
}

impl FieldOrder for SignUpRequest {
    const FIELDS: &'static [&'static str] = &["name", "email", "password", "invite_code"];
}

impl FieldOrder for SignInRequest {
    const FIELDS: &'static [&'static str] = &["email", "password"];
}

impl FieldOrder for PrayerRequestInput {
    const FIELDS: &'static [&'static str] = &["title", "content"];
}

impl FieldOrder for CommentInput {
    const FIELDS: &'static [&'static str] = &["content"];
}

impl FieldOrder for SermonInput {
    const FIELDS: &'static [&'static str] = &[
        "title",
        "description",
        "speaker",
        "video_url",
        "audio_url",
        "thumbnail_url",
        "date",
        "duration",
        "tags",
    ];
}

impl FieldOrder for EventInput {
    const FIELDS: &'static [&'static str] = &[
        "title",
        "description",
        "location",
        "start_date",
        "end_date",
        "image_url",
    ];
}

impl FieldOrder for LiveStreamInput {
    const FIELDS: &'static [&'static str] = &["embed_url", "title", "description", "schedule"];
}

impl FieldOrder for DonationInput {
    const FIELDS: &'static [&'static str] = &["amount", "email", "name", "message"];
}

impl FieldOrder for ProfileInput {
    const FIELDS: &'static [&'static str] = &["name"];
}

impl FieldOrder for InviteRequest {
    const FIELDS: &'static [&'static str] = &["email"];
}

/// validate_payload
///
/// Runs the derived rules and reports the first violation in declared field order as
/// `ActionError::Validation`.
pub fn validate_payload<T>(payload: &T) -> Result<(), ActionError>
where
    T: Validate + FieldOrder,
{
    let Err(errors) = payload.validate() else {
        return Ok(());
    };

    let field_errors = errors.field_errors();
    for field in T::FIELDS {
        let Some((_, violations)) = field_errors.iter().find(|(name, _)| *name == field) else {
            continue;
        };
        if let Some(first) = violations.first() {
            let reason = first
                .message
                .as_ref()
                .map(|message| message.to_string())
                .unwrap_or_else(|| format!("Invalid {}", field));
            return Err(ActionError::validation(*field, reason));
        }
    }

    // A rule fired on a field missing from FIELDS; still never let the write through.
    tracing::warn!("validation failed outside declared field order: {}", errors);
    Err(ActionError::validation("body", "Invalid input"))
}

/// parse_body
///
/// Unwraps an extracted JSON body. Handlers take `Result<Json<T>, JsonRejection>` so
/// that a malformed body is reported only after the caller has been authorized.
pub fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ActionError> {
    match body {
        Ok(Json(payload)) => Ok(payload),
        Err(rejection) => {
            tracing::debug!("rejected request body: {}", rejection.body_text());
            Err(ActionError::validation("body", rejection.body_text()))
        }
    }
}

/// Signup passwords need at least one upper-case letter, one lower-case letter and one digit.
pub fn ensure_password_strength(password: &str) -> Result<(), ActionError> {
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ActionError::validation(
            "password",
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ActionError::validation(
            "password",
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ActionError::validation(
            "password",
            "Password must contain at least one number",
        ));
    }
    Ok(())
}

pub fn ensure_event_window(
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
) -> Result<(), ActionError> {
    match end_date {
        Some(end) if end < start_date => Err(ActionError::validation(
            "end_date",
            "End date must be after the start date",
        )),
        _ => Ok(()),
    }
}
