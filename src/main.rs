//! Access server - license-key gated access for client devices
//!
//! Architecture:
//! - In-memory session/key state machine behind a single lock
//! - JSON files for the durable key catalog and session state
//! - Axum for the HTTP API with rate limiting
//! - Tokio for the async runtime

mod access;
mod error;
mod handlers;
mod model;
mod persist;
mod prelude;
mod state;
mod utils;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::access::{AccessController, DeviceRegistry, KeyLedger, SessionTable};
use crate::persist::{JsonStore, Store};
use crate::prelude::*;
use crate::state::{AppState, Config};

#[tokio::main]
async fn main() {
  dotenvy::dotenv().ok();

  // Initialize tracing
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "keygate=debug,tower_http=debug,axum=trace".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  // Load configuration from environment
  let config = Config {
    keys_path: env::var("KEYS_PATH").unwrap_or_else(|_| "data.json".into()).into(),
    sessions_path: env::var("SESSIONS_PATH")
      .unwrap_or_else(|_| "sessions.json".into())
      .into(),
    admin_token: env::var("ADMIN_TOKEN").expect("ADMIN_TOKEN not set"),
  };

  info!("Starting access server v{}", env!("CARGO_PKG_VERSION"));

  // Reload durable state
  let store = JsonStore::new(&config.keys_path, &config.sessions_path);
  let catalog = store.load_keys().await.expect("Failed to load key catalog");
  let persisted =
    store.load_sessions().await.expect("Failed to load session state");

  info!(
    "Loaded {} keys, {} sessions, {} blocked devices",
    catalog.keys.len(),
    persisted.active_sessions.len(),
    persisted.blocked_devices.len()
  );

  let controller = AccessController::new(
    KeyLedger::from_keys(catalog.keys),
    DeviceRegistry::from_devices(persisted.blocked_devices),
    SessionTable::from_sessions(persisted.active_sessions),
  );

  let app_state = Arc::new(AppState::new(controller, store, config));

  // Configure rate limiting (100 requests per minute per IP)
  let governor_conf = Arc::new(
    GovernorConfigBuilder::default()
      .per_second(2)
      .burst_size(100)
      .finish()
      .expect("Failed to build rate limiter config"),
  );

  let governor_limiter = governor_conf.limiter().clone();

  // Spawn rate limiter cleanup task
  tokio::spawn(async move {
    loop {
      tokio::time::sleep(Duration::from_secs(60)).await;
      governor_limiter.retain_recent();
    }
  });

  let admin = Router::new()
    .route("/user-details", get(handlers::user_details))
    .route("/block-device", post(handlers::block_device))
    .route("/unblock-device", post(handlers::unblock_device))
    .route("/block-device/{device_id}", post(handlers::block_device_direct))
    .route(
      "/unblock-device/{device_id}",
      post(handlers::unblock_device_direct),
    )
    .route(
      "/disconnect-device/{device_id}",
      post(handlers::disconnect_device_direct),
    )
    .route("/admin/keys", post(handlers::create_key).get(handlers::list_keys))
    .route("/admin/keys/{key}/block", post(handlers::block_key))
    .route("/admin/keys/{key}/unblock", post(handlers::unblock_key))
    .layer(middleware::from_fn_with_state(
      app_state.clone(),
      handlers::require_admin,
    ));

  // Build router with middleware
  let app = Router::new()
    .route("/app-opened", post(handlers::app_opened))
    .route("/login-direct", post(handlers::key_login))
    .route("/disconnect", post(handlers::disconnect))
    .route("/status", get(handlers::status))
    .route("/blocked-devices", get(handlers::blocked_devices))
    .route("/health", get(handlers::health))
    .merge(admin)
    .layer(
      ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(
          CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        ),
    )
    .with_state(app_state);

  // Start HTTP server
  let port: u16 =
    env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3000);
  let addr = SocketAddr::from(([0, 0, 0, 0], port));

  info!("HTTP server listening on {}", addr);

  let listener =
    tokio::net::TcpListener::bind(addr).await.expect("Failed to bind");
  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await
  .expect("Server error");
}
