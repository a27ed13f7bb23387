mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, error_message, json, stale_paths};
use congregation_portal::models::{AdminDashboardView, AdminUsersView, Role, User};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn admin_promotes_and_demotes_others() {
    let app = TestApp::new();
    let admin = app.seed_user("Deborah", Role::Admin);
    let member = app.seed_user("Barak", Role::User);
    let mut stale = app.subscribe();
    let uri = format!("/api/users/{}/role", member.id);

    let promoted: User = json(
        app.call(Method::PUT, &uri, Some(&admin), Some(json!({ "role": "ADMIN" })))
            .await,
    )
    .await;
    assert_eq!(promoted.role, Role::Admin);

    // Demoting another administrator is allowed.
    let demoted: User = json(
        app.call(Method::PUT, &uri, Some(&admin), Some(json!({ "role": "USER" })))
            .await,
    )
    .await;
    assert_eq!(demoted.role, Role::User);

    let paths = stale_paths(&mut stale);
    assert!(paths.contains(&"/admin/users"));
    assert!(paths.contains(&"/admin"));
}

#[tokio::test]
async fn promoted_member_reaches_admin_pages_immediately() {
    let app = TestApp::new();
    let admin = app.seed_user("Deborah", Role::Admin);
    let member = app.seed_user("Barak", Role::User);

    assert_eq!(app.get("/admin", Some(&member)).await.status(), StatusCode::TEMPORARY_REDIRECT);

    app.call(
        Method::PUT,
        &format!("/api/users/{}/role", member.id),
        Some(&admin),
        Some(json!({ "role": "ADMIN" })),
    )
    .await;

    assert_eq!(app.get("/admin", Some(&member)).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_cannot_demote_themselves() {
    let app = TestApp::new();
    let admin = app.seed_user("Deborah", Role::Admin);

    let response = app
        .call(
            Method::PUT,
            &format!("/api/users/{}/role", admin.id),
            Some(&admin),
            Some(json!({ "role": "USER" })),
        )
        .await;

    let message = error_message(response, StatusCode::FORBIDDEN).await;
    assert_eq!(message, "You cannot demote yourself");
    let stored = app.repo().get_user(admin.id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Admin);
}

#[tokio::test]
async fn admin_cannot_disable_themselves() {
    let app = TestApp::new();
    let admin = app.seed_user("Deborah", Role::Admin);

    let response = app
        .call(
            Method::POST,
            &format!("/api/users/{}/toggle-status", admin.id),
            Some(&admin),
            None,
        )
        .await;

    let message = error_message(response, StatusCode::FORBIDDEN).await;
    assert_eq!(message, "You cannot disable your own account");
    let stored = app.repo().get_user(admin.id).await.unwrap().unwrap();
    assert!(stored.is_active);
}

#[tokio::test]
async fn toggle_status_flips_back_and_forth() {
    let app = TestApp::new();
    let admin = app.seed_user("Deborah", Role::Admin);
    let member = app.seed_user("Barak", Role::User);
    let uri = format!("/api/users/{}/toggle-status", member.id);

    let disabled: User = json(app.call(Method::POST, &uri, Some(&admin), None).await).await;
    assert!(!disabled.is_active);
    // The disabled member's session no longer resolves.
    assert_eq!(app.get("/profile", Some(&member)).await.status(), StatusCode::TEMPORARY_REDIRECT);

    let enabled: User = json(app.call(Method::POST, &uri, Some(&admin), None).await).await;
    assert!(enabled.is_active);
}

#[tokio::test]
async fn members_cannot_manage_users() {
    let app = TestApp::new();
    let member = app.seed_user("Barak", Role::User);
    let other = app.seed_user("Jael", Role::User);

    let role = app
        .call(
            Method::PUT,
            &format!("/api/users/{}/role", member.id),
            Some(&member),
            Some(json!({ "role": "ADMIN" })),
        )
        .await;
    error_message(role, StatusCode::FORBIDDEN).await;

    let toggle = app
        .call(
            Method::POST,
            &format!("/api/users/{}/toggle-status", other.id),
            Some(&member),
            None,
        )
        .await;
    error_message(toggle, StatusCode::FORBIDDEN).await;
}

#[tokio::test]
async fn non_admin_with_invalid_body_gets_forbidden_not_validation() {
    let app = TestApp::new();
    let member = app.seed_user("Barak", Role::User);

    let response = app
        .call(
            Method::PUT,
            &format!("/api/users/{}/role", member.id),
            Some(&member),
            Some(json!({ "role": "OVERLORD" })),
        )
        .await;

    error_message(response, StatusCode::FORBIDDEN).await;
}

#[tokio::test]
async fn unknown_target_is_not_found() {
    let app = TestApp::new();
    let admin = app.seed_user("Deborah", Role::Admin);

    let response = app
        .call(
            Method::POST,
            &format!("/api/users/{}/toggle-status", Uuid::new_v4()),
            Some(&admin),
            None,
        )
        .await;

    let message = error_message(response, StatusCode::NOT_FOUND).await;
    assert_eq!(message, "User not found");
}

#[tokio::test]
async fn admin_pages_list_accounts_and_recent_activity() {
    let app = TestApp::new();
    let admin = app.seed_user("Deborah", Role::Admin);
    for name in ["Barak", "Jael", "Sisera", "Heber", "Lappidoth", "Abinoam"] {
        app.seed_user(name, Role::User);
    }

    let users: AdminUsersView = json(app.get("/admin/users", Some(&admin)).await).await;
    assert_eq!(users.users.len(), 7);

    let dashboard: AdminDashboardView = json(app.get("/admin", Some(&admin)).await).await;
    assert_eq!(dashboard.stats.users, 7);
    assert_eq!(dashboard.recent_users.len(), 5);
}

#[tokio::test]
async fn profile_rename_updates_own_account() {
    let app = TestApp::new();
    let member = app.seed_user("Barak", Role::User);
    let mut stale = app.subscribe();

    let response = app
        .call(Method::PUT, "/api/profile", Some(&member), Some(json!({ "name": "  Barak ben Abinoam " })))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let user: User = json(response).await;
    assert_eq!(user.name, "Barak ben Abinoam");
    assert_eq!(stale_paths(&mut stale), vec!["/profile"]);
}
