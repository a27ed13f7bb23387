#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderValue, Method, Request, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use congregation_portal::{
    AppConfig, AppState, BroadcastInvalidator, GateConfig, JwtIdentityResolver, MemoryRepository,
    RouteGate, create_router,
    auth::IdentityState,
    models::{Role, User},
    repository::RepositoryState,
    views::{StaleViews, ViewState},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::ServiceExt;
use uuid::Uuid;

/// TestApp
///
/// A fully assembled router backed by the in-memory store. The store and the view
/// channel stay reachable so tests can seed records and observe invalidations.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryRepository>,
    pub views: Arc<BroadcastInvalidator>,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn invite_only() -> Self {
        Self::with_config(AppConfig {
            invite_only: true,
            ..AppConfig::default()
        })
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::with_store(Arc::new(MemoryRepository::new()), config)
    }

    pub fn with_store(store: Arc<MemoryRepository>, config: AppConfig) -> Self {
        let repo = store.clone() as RepositoryState;
        let views = Arc::new(BroadcastInvalidator::default());
        let identity =
            Arc::new(JwtIdentityResolver::new(repo.clone(), config.clone())) as IdentityState;
        let gate = RouteGate::new(GateConfig::default()).expect("default gate table is valid");

        let state = AppState {
            repo,
            identity,
            views: views.clone() as ViewState,
            gate: Arc::new(gate),
            config: config.clone(),
        };

        Self {
            router: create_router(state),
            store,
            views,
            config,
        }
    }

    pub fn repo(&self) -> RepositoryState {
        self.store.clone() as RepositoryState
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StaleViews> {
        self.views.subscribe()
    }

    /// Seeds an account directly in the store.
    pub fn seed_user(&self, name: &str, role: Role) -> User {
        self.seed_user_with_hash(name, role, "not-a-real-hash")
    }

    pub fn seed_user_with_hash(&self, name: &str, role: Role, password_hash: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            role,
            is_active: true,
            created_at: Utc::now(),
        };
        self.store
            .insert_user(user, password_hash)
            .expect("seeding a user")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Sends a request as `caller` (via the local `x-user-id` header), or anonymously.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&User>,
        body: Option<Value>,
    ) -> Response {
        self.send(request(method, uri, caller, body)).await
    }

    pub async fn get(&self, uri: &str, caller: Option<&User>) -> Response {
        self.call(Method::GET, uri, caller, None).await
    }
}

pub fn request(method: Method, uri: &str, caller: Option<&User>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = caller {
        builder = builder.header("x-user-id", user.id.to_string());
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

pub async fn json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Asserts the status and returns the `error` message of an `ErrorBody`.
pub async fn error_message(response: Response, expected: StatusCode) -> String {
    assert_eq!(response.status(), expected);
    let body: Value = json(response).await;
    body["error"].as_str().expect("error field").to_string()
}

pub fn location(response: &Response) -> Option<&HeaderValue> {
    response.headers().get(header::LOCATION)
}

/// Drains every pending invalidation event into the list of affected paths.
pub fn stale_paths(receiver: &mut broadcast::Receiver<StaleViews>) -> Vec<&'static str> {
    let mut paths = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        paths.extend(event.views.iter().map(|view| view.path()));
    }
    paths
}
