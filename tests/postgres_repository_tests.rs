//! Runs against a real Postgres instance. Start one, export DATABASE_URL and run
//! `cargo test -- --ignored`.

use chrono::{Duration, Utc};
use congregation_portal::{
    error::StoreError,
    models::{NewInvite, NewUser, PrayerRequestInput, Role},
    repository::{PostgresRepository, Repository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use uuid::Uuid;

async fn repository() -> RepositoryState {
    dotenv::dotenv().ok();
    let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for Postgres tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await
        .expect("Failed to connect to Postgres in tests");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate test database");

    Arc::new(PostgresRepository::new(pool)) as RepositoryState
}

fn new_user(tag: &str) -> NewUser {
    NewUser {
        name: format!("Test {}", tag),
        email: format!("{}-{}@Example.com", tag, Uuid::new_v4()),
        password_hash: "not-a-real-hash".to_string(),
    }
}

#[tokio::test]
#[ignore]
async fn emails_are_unique_regardless_of_case() {
    let repo = repository().await;
    let first = repo.create_user(new_user("case")).await.unwrap();
    assert_eq!(first.email, first.email.to_lowercase());

    let duplicate = NewUser {
        email: first.email.to_uppercase(),
        ..new_user("case")
    };
    let result = repo.create_user(duplicate).await;
    assert!(matches!(result, Err(StoreError::UniqueViolation(_))));
}

#[tokio::test]
#[ignore]
async fn concurrent_redemptions_have_one_winner() {
    let repo = repository().await;
    let admin = repo.create_user(new_user("admin")).await.unwrap();
    repo.update_user_role(admin.id, Role::Admin).await.unwrap();

    let code = format!("BTP-{}", &Uuid::new_v4().simple().to_string()[..8].to_uppercase());
    repo.create_invite(NewInvite {
        code: code.clone(),
        email: None,
        created_by: admin.id,
        expires_at: Some(Utc::now() + Duration::days(1)),
    })
    .await
    .unwrap();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let repo = repo.clone();
            let code = code.clone();
            tokio::spawn(async move {
                repo.redeem_invite(&code, new_user(&format!("racer{}", i)), Utc::now())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        if let Some(user) = handle.await.unwrap() {
            winners.push(user);
        }
    }

    assert_eq!(winners.len(), 1);
    let invite = repo.get_invite(&code).await.unwrap().unwrap();
    assert_eq!(invite.used_by, Some(winners[0].id));
}

#[tokio::test]
#[ignore]
async fn prayed_toggle_and_cascade() {
    let repo = repository().await;
    let owner = repo.create_user(new_user("owner")).await.unwrap();
    let request = repo
        .create_prayer_request(
            owner.id,
            PrayerRequestInput {
                title: "Strength".to_string(),
                content: "For the week ahead, please.".to_string(),
                is_anonymous: true,
                is_public: true,
            },
        )
        .await
        .unwrap();

    assert!(repo.toggle_prayed(owner.id, request.id).await.unwrap());
    let wall = repo.list_prayer_wall(owner.id).await.unwrap();
    let entry = wall.iter().find(|entry| entry.id == request.id).unwrap();
    assert_eq!(entry.prayed_count, 1);
    assert!(entry.prayed_by_me);
    assert!(entry.author_name.is_none());

    assert!(!repo.toggle_prayed(owner.id, request.id).await.unwrap());

    repo.add_comment(request.id, owner.id, "Amen".to_string()).await.unwrap();
    assert!(repo.delete_prayer_request(request.id).await.unwrap());
    assert!(repo.list_comments(&[request.id]).await.unwrap().is_empty());
}
