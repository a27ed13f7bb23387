use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use validator::ValidateEmail;

use crate::{
    auth::Identity,
    authorizer::{Requirement, authorize},
    error::{ActionError, INVITE_CODE, StoreError},
    models::{InviteCode, NewInvite, NewUser, User},
    repository::RepositoryState,
};

pub const CODE_PREFIX: &str = "BTP-";
pub const CODE_LENGTH: usize = 8;
// No 0/O or 1/I: codes are read aloud and typed by hand.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const INVITE_TTL_DAYS: i64 = 30;
const MAX_ISSUE_ATTEMPTS: usize = 5;

/// Generates a fresh code such as `BTP-7KQ2M9XA`.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let body: String = (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", CODE_PREFIX, body)
}

/// issue
///
/// Creates a new unused invite code on behalf of an administrator, optionally bound to
/// one email address, expiring `INVITE_TTL_DAYS` after `now`. A code collision on the
/// unique key is retried with a new code a bounded number of times.
pub async fn issue(
    repo: &RepositoryState,
    caller: Option<&Identity>,
    bound_email: Option<String>,
    now: DateTime<Utc>,
) -> Result<InviteCode, ActionError> {
    let admin = authorize(caller, Requirement::Admin, None)?;

    let bound_email = bound_email.map(|email| email.trim().to_lowercase());
    if let Some(email) = &bound_email {
        if !email.validate_email() {
            return Err(ActionError::validation("email", "Invalid email address"));
        }
    }

    for attempt in 1..=MAX_ISSUE_ATTEMPTS {
        let invite = NewInvite {
            code: generate_code(),
            email: bound_email.clone(),
            created_by: admin.id,
            expires_at: Some(now + Duration::days(INVITE_TTL_DAYS)),
        };

        match repo.create_invite(invite).await {
            Ok(created) => {
                tracing::info!(code = %created.code, created_by = %admin.id, "invite code issued");
                return Ok(created);
            }
            Err(StoreError::UniqueViolation(_)) => {
                tracing::warn!(attempt, "invite code collision; regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ActionError::Conflict(
        "Could not generate a unique invite code".to_string(),
    ))
}

/// redeem
///
/// Validates `code` for `candidate_email` and, when it is redeemable, creates the account
/// and consumes the code in one store transaction. The checks run in a fixed order:
/// existence, email binding, prior use, expiry. The email binding is checked before the
/// code's state so that a foreign code never reveals whether it is still usable.
pub async fn redeem(
    repo: &RepositoryState,
    code: &str,
    candidate_email: &str,
    account: NewUser,
    now: DateTime<Utc>,
) -> Result<User, ActionError> {
    let code = code.trim();
    let invite = repo
        .get_invite(code)
        .await?
        .ok_or(ActionError::NotFound(INVITE_CODE))?;

    check_redeemable(&invite, candidate_email, now)?;

    // The store claims the code with a compare-and-set on `used_at IS NULL`; losing
    // that race to a concurrent redemption yields `None`.
    match repo.redeem_invite(code, account, now).await? {
        Some(user) => {
            tracing::info!(%code, user_id = %user.id, "invite code redeemed");
            Ok(user)
        }
        None => Err(ActionError::AlreadyUsed),
    }
}

fn check_redeemable(
    invite: &InviteCode,
    candidate_email: &str,
    now: DateTime<Utc>,
) -> Result<(), ActionError> {
    if let Some(bound) = &invite.email {
        if !bound.trim().eq_ignore_ascii_case(candidate_email.trim()) {
            return Err(ActionError::EmailMismatch);
        }
    }
    if invite.is_used() {
        return Err(ActionError::AlreadyUsed);
    }
    if invite.is_expired(now) {
        return Err(ActionError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn invite(email: Option<&str>) -> InviteCode {
        InviteCode {
            id: Uuid::new_v4(),
            code: "BTP-ABCDEFGH".to_string(),
            email: email.map(str::to_string),
            created_by: Uuid::new_v4(),
            expires_at: Some(Utc::now() + Duration::days(1)),
            used_at: None,
            used_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn generated_codes_use_unambiguous_alphabet() {
        for _ in 0..50 {
            let code = generate_code();
            let body = code.strip_prefix(CODE_PREFIX).unwrap();
            assert_eq!(body.len(), CODE_LENGTH);
            assert!(body.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!body.contains(['0', 'O', '1', 'I']));
        }
    }

    #[test]
    fn email_mismatch_wins_over_used_and_expired() {
        let now = Utc::now();
        let mut code = invite(Some("a@x.com"));
        code.used_at = Some(now);
        code.expires_at = Some(now - Duration::days(1));

        assert!(matches!(
            check_redeemable(&code, "b@x.com", now),
            Err(ActionError::EmailMismatch)
        ));
    }

    #[test]
    fn bound_email_comparison_ignores_case() {
        let code = invite(Some("Member@Example.com"));
        assert!(check_redeemable(&code, "member@example.com", Utc::now()).is_ok());
    }

    #[test]
    fn used_is_reported_before_expired() {
        let now = Utc::now();
        let mut code = invite(None);
        code.used_at = Some(now);
        code.expires_at = Some(now - Duration::days(1));

        assert!(matches!(
            check_redeemable(&code, "anyone@x.com", now),
            Err(ActionError::AlreadyUsed)
        ));
    }

    #[test]
    fn expired_code_is_rejected() {
        let now = Utc::now();
        let mut code = invite(None);
        code.expires_at = Some(now - Duration::seconds(1));

        assert!(matches!(
            check_redeemable(&code, "anyone@x.com", now),
            Err(ActionError::Expired)
        ));
    }
}
