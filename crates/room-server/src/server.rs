//! HTTP listener and top-level server wiring.
//!
//! This module:
//! - serves `GET /ws?room=<id>&role=<role>` (WebSocket upgrade),
//! - serves `GET /api/config` (static status object),
//! - applies the CORS policy from configuration,
//! - owns the `ConnectionManager` and its idle-room sweeper.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use room_protocol::ConnectParams;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use crate::ai::{AiResponder, OllamaResponder};
use crate::config::Config;
use crate::connection::{Connection, WsConnection};
use crate::manager::{ConnectionManager, ManagerSettings};

/// Shared application state passed to axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
}

/// Build the axum router with all routes.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/config", get(config_handler))
        .with_state(state)
        .layer(cors_layer(allowed_origins))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}

/// Handle returned by `start()`; keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    manager: Arc<ConnectionManager>,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
    eviction: JoinHandle<()>,
}

impl ServerHandle {
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Stop accepting connections and wait for the listener to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.eviction.abort();
        if let Err(e) = self.server.await {
            error!(error = %e, "server task failed");
        }
    }
}

/// Validate `config`, bind the listener and start serving in the background.
pub async fn start(config: &Config, ai: Arc<dyn AiResponder>) -> anyhow::Result<ServerHandle> {
    config.validate()?;

    let manager = Arc::new(ConnectionManager::new(ai, ManagerSettings::from_config(config)));
    let eviction =
        Arc::clone(&manager).start_eviction_task(config.room_sweep_interval(), config.room_idle());

    let router = build_router(
        AppState {
            manager: Arc::clone(&manager),
        },
        &config.allowed_origins,
    );

    let listener = TcpListener::bind(config.socket_addr_string())
        .await
        .with_context(|| format!("failed to bind {}", config.socket_addr_string()))?;
    let port = listener.local_addr()?.port();
    info!(addr = %config.bind_addr, port, "room server listening");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let server = tokio::spawn(async move {
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await;
        if let Err(e) = served {
            error!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        port,
        manager,
        shutdown,
        server,
        eviction,
    })
}

/// Run the server with the given configuration until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let ai: Arc<dyn AiResponder> =
        Arc::new(OllamaResponder::new(&config.ai).context("failed to build AI client")?);
    info!(base_url = %config.ai.base_url, model = %config.ai.model, "AI responder configured");

    let handle = start(&config, ai).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    handle.shutdown().await;
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn handle_socket(socket: WebSocket, params: ConnectParams, state: AppState) {
    let conn = WsConnection::new(socket);

    let (room_id, role) = match params.validate() {
        Ok(valid) => valid,
        Err(e) => {
            warn!(room = %params.room, role = %params.role, error = %e, "rejecting connection");
            conn.reject(&e.to_string()).await;
            return;
        }
    };

    // Rejections are logged and closed by the manager.
    let _ = state.manager.register_client(room_id, role, conn).await;
}

async fn config_handler() -> impl IntoResponse {
    info!("handling config request");
    Json(json!({ "message": "Config loaded successfully" }))
}
