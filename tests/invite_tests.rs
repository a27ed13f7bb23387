mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{TestApp, error_message, json};
use congregation_portal::{
    error::ActionError,
    invite::{self, CODE_PREFIX},
    models::{InviteCode, NewUser, Role, User},
};
use serde_json::json;
use uuid::Uuid;

const PASSWORD: &str = "Passw0rdStrong";

fn seeded_invite(app: &TestApp, code: &str, email: Option<&str>) -> InviteCode {
    let admin = app.seed_user("Naomi", Role::Admin);
    app.store
        .insert_invite(InviteCode {
            id: Uuid::new_v4(),
            code: code.to_string(),
            email: email.map(str::to_string),
            created_by: admin.id,
            expires_at: Some(Utc::now() + Duration::days(7)),
            used_at: None,
            used_by: None,
            created_at: Utc::now(),
        })
        .unwrap()
}

fn signup(email: &str, code: Option<&str>) -> serde_json::Value {
    json!({ "name": "Dorcas", "email": email, "password": PASSWORD, "invite_code": code })
}

fn account(email: &str) -> NewUser {
    NewUser {
        name: "Dorcas".to_string(),
        email: email.to_string(),
        password_hash: "not-a-real-hash".to_string(),
    }
}

// --- Issuing ---

#[tokio::test]
async fn admin_issues_bound_invite() {
    let app = TestApp::new();
    let admin = app.seed_user("Naomi", Role::Admin);

    let response = app
        .call(
            Method::POST,
            "/api/invites",
            Some(&admin),
            Some(json!({ "email": "Guest@Example.com" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let invite: InviteCode = json(response).await;
    assert!(invite.code.starts_with(CODE_PREFIX));
    assert_eq!(invite.email.as_deref(), Some("guest@example.com"));
    assert_eq!(invite.created_by, admin.id);
    assert!(invite.used_at.is_none());
    assert!(invite.expires_at.unwrap() > Utc::now() + Duration::days(29));
}

#[tokio::test]
async fn member_cannot_issue_invites() {
    let app = TestApp::new();
    let member = app.seed_user("Ruth", Role::User);

    let response = app
        .call(Method::POST, "/api/invites", Some(&member), Some(json!({})))
        .await;

    error_message(response, StatusCode::FORBIDDEN).await;
    assert!(app.repo().list_invites(10).await.unwrap().is_empty());
}

// --- Redeeming through signup ---

#[tokio::test]
async fn invite_only_signup_requires_a_code() {
    let app = TestApp::invite_only();

    let response = app
        .call(Method::POST, "/api/auth/signup", None, Some(signup("dorcas@example.com", None)))
        .await;

    let message = error_message(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(message, "An invite code is required to sign up");
}

#[tokio::test]
async fn invite_only_signup_consumes_the_code() {
    let app = TestApp::invite_only();
    seeded_invite(&app, "BTP-WELCOME2", None);

    let response = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup("dorcas@example.com", Some("BTP-WELCOME2"))),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let user: User = json(response).await;

    let invite = app.repo().get_invite("BTP-WELCOME2").await.unwrap().unwrap();
    assert_eq!(invite.used_by, Some(user.id));
    assert!(invite.used_at.is_some());

    let again = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup("other@example.com", Some("BTP-WELCOME2"))),
        )
        .await;
    let message = error_message(again, StatusCode::CONFLICT).await;
    assert_eq!(message, "This invite code has already been used");
}

#[tokio::test]
async fn unknown_code_is_rejected() {
    let app = TestApp::invite_only();

    let response = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup("dorcas@example.com", Some("BTP-NOSUCHCD"))),
        )
        .await;

    let message = error_message(response, StatusCode::NOT_FOUND).await;
    assert_eq!(message, "Invalid invite code");
}

#[tokio::test]
async fn bound_code_rejects_other_email_without_consuming() {
    let app = TestApp::invite_only();
    seeded_invite(&app, "BTP-BOUNDONE", Some("dorcas@example.com"));

    let response = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup("intruder@example.com", Some("BTP-BOUNDONE"))),
        )
        .await;
    error_message(response, StatusCode::FORBIDDEN).await;

    let invite = app.repo().get_invite("BTP-BOUNDONE").await.unwrap().unwrap();
    assert!(invite.used_at.is_none());

    // The bound address still redeems it, regardless of case.
    let response = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup("Dorcas@Example.com", Some("BTP-BOUNDONE"))),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn expired_code_is_gone() {
    let app = TestApp::invite_only();
    let mut invite = seeded_invite(&app, "BTP-OLDCODE1", None);
    invite.code = "BTP-OLDCODE2".to_string();
    invite.expires_at = Some(Utc::now() - Duration::minutes(1));
    app.store.insert_invite(invite).unwrap();

    let response = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup("dorcas@example.com", Some("BTP-OLDCODE2"))),
        )
        .await;

    let message = error_message(response, StatusCode::GONE).await;
    assert_eq!(message, "This invite code has expired");
}

#[tokio::test]
async fn failed_account_creation_does_not_burn_the_code() {
    let app = TestApp::invite_only();
    let existing = app.seed_user("Dorcas", Role::User);
    seeded_invite(&app, "BTP-KEEPME22", None);

    let response = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup(&existing.email, Some("BTP-KEEPME22"))),
        )
        .await;
    error_message(response, StatusCode::CONFLICT).await;

    let invite = app.repo().get_invite("BTP-KEEPME22").await.unwrap().unwrap();
    assert!(invite.used_at.is_none());
    assert!(invite.used_by.is_none());
}

// --- Concurrency ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_have_one_winner() {
    let app = TestApp::invite_only();
    seeded_invite(&app, "BTP-RACE2345", None);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let repo = app.repo();
            tokio::spawn(async move {
                let email = format!("racer{}@example.com", i);
                invite::redeem(&repo, "BTP-RACE2345", &email, account(&email), Utc::now()).await
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(ActionError::AlreadyUsed) => {}
            Err(other) => panic!("unexpected redemption error: {:?}", other),
        }
    }

    assert_eq!(winners, 1);
    let invite = app.repo().get_invite("BTP-RACE2345").await.unwrap().unwrap();
    let winner = app.repo().get_user(invite.used_by.unwrap()).await.unwrap();
    assert!(winner.is_some());
}
