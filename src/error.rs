use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// StoreError
///
/// Failures raised by a `Repository` implementation. Only `UniqueViolation` carries
/// meaning for callers; everything else is an infrastructure fault.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint rejected the write. The payload is the user-facing
    /// conflict message chosen by the repository.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// SelfProtection
///
/// The user-management rules an administrator may not apply to their own account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfProtection {
    Demotion,
    Disable,
}

/// ActionError
///
/// The structured failure result of every action and page handler. Authorization
/// failures carry no detail beyond their kind so that callers cannot probe for the
/// existence of records they are not allowed to touch.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("You must be signed in")]
    Unauthenticated,

    #[error("You are not allowed to perform this action")]
    Forbidden,

    #[error("{}", self_protection_message(.0))]
    SelfProtection(SelfProtection),

    #[error("{reason}")]
    Validation { field: String, reason: String },

    #[error("{}", not_found_message(.0))]
    NotFound(&'static str),

    #[error("This invite code has already been used")]
    AlreadyUsed,

    #[error("This invite code has expired")]
    Expired,

    #[error("This invite code is for a different email address")]
    EmailMismatch,

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Something went wrong. Please try again later.")]
    Store(StoreError),

    /// A non-store fault such as password hashing or token signing.
    #[error("Something went wrong. Please try again later.")]
    Internal(String),
}

/// Subject names used with `ActionError::NotFound`.
pub const INVITE_CODE: &str = "Invite code";

fn self_protection_message(rule: &SelfProtection) -> &'static str {
    match rule {
        SelfProtection::Demotion => "You cannot demote yourself",
        SelfProtection::Disable => "You cannot disable your own account",
    }
}

fn not_found_message(subject: &str) -> String {
    // Invite codes are typed by hand, so the message points at the input itself.
    if subject == INVITE_CODE {
        "Invalid invite code".to_string()
    } else {
        format!("{} not found", subject)
    }
}

impl ActionError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ActionError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::Unauthenticated | ActionError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ActionError::Forbidden
            | ActionError::SelfProtection(_)
            | ActionError::EmailMismatch => StatusCode::FORBIDDEN,
            ActionError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ActionError::NotFound(_) => StatusCode::NOT_FOUND,
            ActionError::AlreadyUsed | ActionError::Conflict(_) => StatusCode::CONFLICT,
            ActionError::Expired => StatusCode::GONE,
            ActionError::Store(_) | ActionError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for ActionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(message) => ActionError::Conflict(message),
            other => ActionError::Store(other),
        }
    }
}

/// ErrorBody
///
/// The JSON body of every failed action: `{ "error": "<message>" }`.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        // The diagnostic stays in the logs; the caller only sees the generic message.
        match &self {
            ActionError::Store(inner) => tracing::error!("store failure: {:?}", inner),
            ActionError::Internal(detail) => tracing::error!("internal failure: {}", detail),
            _ => {}
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
