use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use studyhall_api::middleware::require_auth;
use studyhall_api::{AppState, AppStateInner, auth, groups, messages, profile};
use studyhall_engine::{ChangeFeed, MutationGateway, SubscriptionManager, Sweeper};
use studyhall_gateway::connection;

#[derive(Clone)]
struct ServerState {
    manager: SubscriptionManager,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyhall=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("STUDYHALL_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("STUDYHALL_DB_PATH").unwrap_or_else(|_| "studyhall.db".into());
    let host = std::env::var("STUDYHALL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("STUDYHALL_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let sweep_interval_secs: u64 = std::env::var("STUDYHALL_SWEEP_INTERVAL_SECS")
        .unwrap_or_else(|_| "3600".into())
        .parse()?;

    // Init database and change feed
    let db = Arc::new(studyhall_db::Database::open(&PathBuf::from(&db_path))?);
    let feed = ChangeFeed::new();

    // Background sweep: once at startup, then every interval. The handle
    // lives for the rest of main, so the timer dies with the process.
    let _sweeper = Sweeper::start(
        db.clone(),
        feed.clone(),
        Duration::from_secs(sweep_interval_secs),
    );

    // Shared state
    let gateway = MutationGateway::new(db.clone(), feed.clone());
    let manager = SubscriptionManager::new(db.clone(), feed.clone());
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        gateway,
        jwt_secret: jwt_secret.clone(),
    });

    let state = ServerState {
        manager,
        jwt_secret,
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/groups", get(groups::list_groups))
        .route("/groups", post(groups::create_group))
        .route("/groups/{group_id}/join", post(groups::join_group))
        .route("/groups/joined", get(groups::joined_groups))
        .route("/groups/created", get(groups::created_groups))
        .route("/groups/{group_id}/messages", get(messages::get_messages))
        .route("/groups/{group_id}/messages", post(messages::send_message))
        .route("/profile", get(profile::get_profile))
        .route("/profile", put(profile::update_profile))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Studyhall server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.manager, state.jwt_secret))
}
