use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::LazyLock;
use uuid::Uuid;

use crate::{
    auth::{Claims, SESSION_COOKIE},
    config::{AppConfig, Env},
    error::ActionError,
};

/// Hash a password using argon2.
pub fn hash_password(password: &str) -> Result<String, ActionError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ActionError::Internal(format!("password hashing failed: {}", e)))
}

/// verify_password
///
/// Returns false for a wrong password and for a stored hash that cannot be parsed;
/// sign-in treats both as bad credentials.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("unparseable password hash in store: {}", e);
            false
        }
    }
}

/// Hash checked when no account matches a sign-in email, so unknown and known emails
/// cost the same argon2 work.
static UNKNOWN_ACCOUNT_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("unknown-account-placeholder").unwrap_or_default());

/// Runs a full verification that always fails.
pub fn verify_unknown_account(password: &str) -> bool {
    verify_password(password, &UNKNOWN_ACCOUNT_HASH);
    false
}

/// issue_token
///
/// Signs an HS256 session JWT for `user_id`, valid for the configured session lifetime.
pub fn issue_token(
    user_id: Uuid,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Result<String, ActionError> {
    let expires_at = Duration::try_hours(config.session_ttl_hours)
        .filter(|ttl| *ttl > Duration::zero())
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            ActionError::Internal(format!(
                "session lifetime of {} hours is out of range",
                config.session_ttl_hours
            ))
        })?;
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    let key = EncodingKey::from_secret(config.session_secret.as_bytes());
    encode(&Header::default(), &claims, &key)
        .map_err(|e| ActionError::Internal(format!("token signing failed: {}", e)))
}

/// The http-only cookie carrying a freshly issued session token.
pub fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.env == Env::Production)
        .build()
}

/// An already-expired session cookie. Sent even when the request carried no cookie, so
/// the browser drops any copy it still holds.
pub fn session_cookie_removal() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .build();
    cookie.make_removal();
    cookie
}
