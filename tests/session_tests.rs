mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::{TestApp, error_message, json, location, stale_paths};
use congregation_portal::{
    models::{Role, SessionResponse, User},
    session::hash_password,
};
use serde_json::json;

const PASSWORD: &str = "Passw0rdStrong";

fn signup_body(name: &str, email: &str) -> serde_json::Value {
    json!({ "name": name, "email": email, "password": PASSWORD })
}

// --- Sign up ---

#[tokio::test]
async fn signup_creates_member_with_lowercased_email() {
    let app = TestApp::new();
    let mut stale = app.subscribe();

    let response = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup_body("Lydia", "Lydia@Example.COM")),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let user: User = json(response).await;
    assert_eq!(user.email, "lydia@example.com");
    assert_eq!(user.role, Role::User);
    assert!(user.is_active);

    let paths = stale_paths(&mut stale);
    assert!(paths.contains(&"/admin/users"));
    assert!(paths.contains(&"/admin"));
}

#[tokio::test]
async fn signup_rejects_duplicate_email_case_insensitively() {
    let app = TestApp::new();
    app.call(Method::POST, "/api/auth/signup", None, Some(signup_body("Lydia", "lydia@example.com")))
        .await;

    let response = app
        .call(Method::POST, "/api/auth/signup", None, Some(signup_body("Other", "LYDIA@example.com")))
        .await;

    let message = error_message(response, StatusCode::CONFLICT).await;
    assert_eq!(message, "A user with this email already exists");
}

#[tokio::test]
async fn signup_reports_first_invalid_field() {
    let app = TestApp::new();

    // Both name and email are invalid; name is declared first.
    let response = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "name": "L", "email": "nope", "password": PASSWORD })),
        )
        .await;

    let message = error_message(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(message, "Name must be at least 2 characters");
}

#[tokio::test]
async fn signup_requires_mixed_case_and_digit() {
    let app = TestApp::new();

    let response = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "name": "Lydia", "email": "lydia@example.com", "password": "alllowercase1" })),
        )
        .await;

    let message = error_message(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert_eq!(message, "Password must contain at least one uppercase letter");
}

#[tokio::test]
async fn signup_ignores_invite_code_when_not_invite_only() {
    let app = TestApp::new();

    let response = app
        .call(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "name": "Lydia",
                "email": "lydia@example.com",
                "password": PASSWORD,
                "invite_code": "BTP-DOESNOTEXIST"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let app = TestApp::new();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- Sign in / sign out ---

#[tokio::test]
async fn signin_issues_token_that_opens_member_pages() {
    let app = TestApp::new();
    let hash = hash_password(PASSWORD).unwrap();
    app.seed_user_with_hash("Priscilla", Role::User, &hash);

    let response = app
        .call(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({ "email": "PRISCILLA@example.com", "password": PASSWORD })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session_token="));
    assert!(cookie.contains("HttpOnly"));

    let session: SessionResponse = json(response).await;
    assert_eq!(session.user.name, "Priscilla");

    // Bearer header
    let request = Request::builder()
        .uri("/profile")
        .header(header::AUTHORIZATION, format!("Bearer {}", session.token))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::OK);

    // Cookie
    let request = Request::builder()
        .uri("/profile")
        .header(header::COOKIE, format!("session_token={}", session.token))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::OK);

    // A signed-in caller is sent home from the sign-in page.
    let request = Request::builder()
        .uri("/auth/signin")
        .header(header::AUTHORIZATION, format!("Bearer {}", session.token))
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response).unwrap(), "/");
}

#[tokio::test]
async fn signin_failures_share_one_message() {
    let app = TestApp::new();
    let hash = hash_password(PASSWORD).unwrap();
    let user = app.seed_user_with_hash("Priscilla", Role::User, &hash);

    let wrong_password = app
        .call(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({ "email": user.email, "password": "Wr0ngPassword" })),
        )
        .await;
    let unknown_email = app
        .call(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
        )
        .await;

    let first = error_message(wrong_password, StatusCode::UNAUTHORIZED).await;
    let second = error_message(unknown_email, StatusCode::UNAUTHORIZED).await;
    assert_eq!(first, "Invalid email or password");
    assert_eq!(first, second);
}

#[tokio::test]
async fn disabled_account_cannot_sign_in() {
    let app = TestApp::new();
    let hash = hash_password(PASSWORD).unwrap();
    let admin = app.seed_user("Naomi", Role::Admin);
    let member = app.seed_user_with_hash("Priscilla", Role::User, &hash);

    let toggle = app
        .call(
            Method::POST,
            &format!("/api/users/{}/toggle-status", member.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(toggle.status(), StatusCode::OK);

    let response = app
        .call(
            Method::POST,
            "/api/auth/signin",
            None,
            Some(json!({ "email": member.email, "password": PASSWORD })),
        )
        .await;

    error_message(response, StatusCode::UNAUTHORIZED).await;
}

#[tokio::test]
async fn signout_expires_the_cookie() {
    let app = TestApp::new();

    let response = app.call(Method::POST, "/api/auth/signout", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("removal cookie")
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("session_token="));
    assert!(cookie.contains("Max-Age=0") || cookie.contains("Expires="));
}

// --- Sign-in page ---

#[tokio::test]
async fn signin_page_only_echoes_local_callbacks() {
    let app = TestApp::new();

    let local: serde_json::Value = json(app.get("/auth/signin?callbackUrl=%2Fprayer", None).await).await;
    assert_eq!(local["callback_url"], "/prayer");

    let foreign: serde_json::Value =
        json(app.get("/auth/signin?callbackUrl=https%3A%2F%2Fevil.example", None).await).await;
    assert!(foreign["callback_url"].is_null());

    // Browsers treat both of these as `//evil.example`.
    for disguised in ["%2F%5Cevil.example", "%2F%09%2Fevil.example"] {
        let page: serde_json::Value =
            json(app.get(&format!("/auth/signin?callbackUrl={disguised}"), None).await).await;
        assert!(page["callback_url"].is_null(), "{disguised} was echoed back");
    }
}
