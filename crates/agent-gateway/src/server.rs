//! The dual-transport HTTP/SSE server.
//!
//! One loopback TCP listener, three paths:
//!
//! | Path           | Transport        | Purpose                                  |
//! |----------------|------------------|------------------------------------------|
//! | `/mcp`         | streamable HTTP  | request/response in one exchange         |
//! | `/mcp/sse`     | SSE              | long-lived stream of responses + events  |
//! | `/mcp/message` | HTTP POST        | request submission for SSE sessions      |
//!
//! CORS is permissive for local development; the listener itself only
//! ever binds loopback.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use host_bus::{EventQueue, SessionTransport};
use host_types::{
    EventKind, HostError, RpcRequest, RpcResponse, ShutdownListener, WalletEvent,
};

use crate::rpc::Dispatcher;
use crate::session::SessionManager;
use crate::{DEFAULT_PORT, HEARTBEAT_INTERVAL};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listener port (`SSE_PORT`); always bound on loopback.
    pub port: u16,
    pub heartbeat_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<SessionManager>,
    bus: Arc<host_bus::EventBroadcaster>,
    heartbeat_interval: Duration,
    shutdown: ShutdownListener,
}

/// The dual-transport server instance.
pub struct GatewayServer {
    config: GatewayConfig,
    state: AppState,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        dispatcher: Arc<Dispatcher>,
        sessions: Arc<SessionManager>,
        bus: Arc<host_bus::EventBroadcaster>,
        shutdown: ShutdownListener,
    ) -> Self {
        Self {
            state: AppState {
                dispatcher,
                sessions,
                bus,
                heartbeat_interval: config.heartbeat_interval,
                shutdown,
            },
            config,
        }
    }

    /// The axum router, exposed for in-process tests.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/mcp", post(handle_mcp))
            .route("/mcp/sse", get(handle_sse))
            .route("/mcp/message", post(handle_message))
            .route("/health", get(health_check))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind loopback and serve until shutdown. SSE sessions close as
    /// part of graceful shutdown.
    pub async fn serve(self) -> Result<(), HostError> {
        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| HostError::internal(format!("cannot bind {addr}: {e}")))?;
        info!(addr = %addr, "Agent gateway listening");

        let mut shutdown = self.state.shutdown.clone();
        let router = self.router();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
            .map_err(|e| HostError::internal(format!("gateway server error: {e}")))?;

        info!("Agent gateway stopped");
        Ok(())
    }
}

/// Streamable-HTTP endpoint: request and response in one exchange.
async fn handle_mcp(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return Json(RpcResponse::failure(
                serde_json::Value::Null,
                -32700,
                format!("Parse error: {e}"),
            ));
        }
    };
    Json(state.dispatcher.dispatch(request).await)
}

#[derive(Debug, Deserialize)]
struct MessageParams {
    session: String,
}

/// Companion endpoint for SSE clients; the response arrives on the
/// session's stream, correlated by request ID.
async fn handle_message(
    State(state): State<AppState>,
    Query(params): Query<MessageParams>,
    body: String,
) -> impl IntoResponse {
    if !state.sessions.contains(&params.session) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"code": "unknown_session", "message": "no such SSE session"}})),
        );
    }

    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": "parse_error", "message": e.to_string()}})),
            );
        }
    };

    let request_id = request.id.clone();
    let session_id = params.session.clone();
    tokio::spawn(async move {
        let response = state.dispatcher.dispatch(request).await;
        if !state.sessions.push_response(&session_id, response) {
            warn!(
                session_id = session_id.as_str(),
                "Dropping response for vanished SSE session"
            );
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({"status": "accepted", "id": request_id})),
    )
}

/// Open an SSE stream: assign a session, register with the
/// broadcaster, and pump responses + events until disconnect.
async fn handle_sse(
    State(state): State<AppState>,
) -> Sse<ReceiverStream<Result<Event, Infallible>>> {
    let (session_id, response_rx) = state.sessions.create();
    let event_queue = state.bus.register(&session_id, SessionTransport::Sse);

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(64);
    tokio::spawn(session_pump(
        state.clone(),
        session_id,
        event_queue,
        response_rx,
        tx,
    ));

    Sse::new(ReceiverStream::new(rx))
}

async fn session_pump(
    state: AppState,
    session_id: String,
    mut event_queue: EventQueue,
    mut response_rx: mpsc::Receiver<RpcResponse>,
    tx: mpsc::Sender<Result<Event, Infallible>>,
) {
    info!(session_id = session_id.as_str(), "SSE session connected");

    // Greeting carries the session ID the client needs for
    // /mcp/message correlation.
    let mut connected = WalletEvent::new(
        EventKind::Connected,
        json!({
            "session_id": session_id,
            "server": host_types::SERVER_NAME,
            "version": host_types::PROTOCOL_VERSION,
        }),
    );
    connected.stamp();
    if send_event(&tx, &connected).await.is_err() {
        cleanup(&state, &session_id);
        return;
    }

    let mut heartbeat = tokio::time::interval(state.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    heartbeat.reset(); // skip the immediate first tick
    let mut shutdown = state.shutdown.clone();

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                debug!(session_id = session_id.as_str(), "SSE session closing on shutdown");
                break;
            }
            event = event_queue.recv() => {
                match event {
                    Some(event) => {
                        if send_event(&tx, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            response = response_rx.recv() => {
                match response {
                    Some(response) => {
                        let payload = serde_json::to_string(&response).unwrap_or_default();
                        if tx.send(Ok(Event::default().event("message").data(payload))).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                let mut beat = WalletEvent::new(EventKind::Heartbeat, json!({}));
                beat.stamp();
                if send_event(&tx, &beat).await.is_err() {
                    break;
                }
            }
        }
    }

    cleanup(&state, &session_id);
    info!(session_id = session_id.as_str(), "SSE session closed");
}

async fn send_event(
    tx: &mpsc::Sender<Result<Event, Infallible>>,
    event: &WalletEvent,
) -> Result<(), ()> {
    let payload = serde_json::to_string(event).unwrap_or_default();
    tx.send(Ok(Event::default().event(event.kind.as_str()).data(payload)))
        .await
        .map_err(|_| ())
}

fn cleanup(state: &AppState, session_id: &str) {
    state.bus.unregister(session_id);
    state.sessions.remove(session_id);
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": host_types::SERVER_NAME,
        "version": host_types::PROTOCOL_VERSION,
    }))
}
