use congregation_portal::{
    AppState, BroadcastInvalidator, GateConfig, JwtIdentityResolver, RouteGate,
    auth::IdentityState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    views::ViewState,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point. Initializes configuration, logging, the database, the
/// route gate, the identity provider and the HTTP server, in that order.
#[tokio::main]
async fn main() {
    // 1. Configuration (panics on missing required values)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Log filter: RUST_LOG wins, otherwise verbose local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "congregation_portal=debug,tower_http=info,axum=trace".into());

    // 3. Log format by environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for log aggregation.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!(
        invite_only = config.invite_only,
        "Application starting in {:?} mode",
        config.env
    );

    // 4. Database Initialization (Postgres) and schema migrations
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Route gate: an overlapping or malformed table refuses to start.
    let gate = RouteGate::new(GateConfig::default())
        .expect("FATAL: Route gate configuration is invalid.");

    // 6. Identity provider and view invalidation channel
    let identity = Arc::new(JwtIdentityResolver::new(repo.clone(), config.clone())) as IdentityState;
    let views = Arc::new(BroadcastInvalidator::default()) as ViewState;

    // 7. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        identity,
        views,
        gate: Arc::new(gate),
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("HTTP server terminated: {}", err);
    }
}
