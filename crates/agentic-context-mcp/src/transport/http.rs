//! HTTP transport: `POST /mcp` carries one request per call, sessions are
//! keyed by the `Mcp-Session-Id` header returned from `initialize`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Json as AxumJson, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::protocol::ProtocolHandler;
use crate::session::{Session, SessionRegistry};
use crate::types::{McpError, McpResult, RequestId};

pub const SESSION_HEADER: &str = "mcp-session-id";

/// Sessions unused for this long are closed and forgotten.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

/// Shared server state passed to all routes via axum State.
pub struct ServerState {
    pub token: Option<String>,
    pub handler: ProtocolHandler,
    pub sessions: SessionRegistry,
}

pub struct HttpTransport {
    state: Arc<ServerState>,
    session_idle: Duration,
}

impl HttpTransport {
    pub fn new(handler: ProtocolHandler, token: Option<String>) -> Self {
        Self {
            state: Arc::new(ServerState {
                token,
                handler,
                sessions: SessionRegistry::new(),
            }),
            session_idle: DEFAULT_SESSION_IDLE,
        }
    }

    pub fn with_session_idle(mut self, idle: Duration) -> Self {
        self.session_idle = idle;
        self
    }

    pub fn router(&self) -> Router {
        let state = Arc::clone(&self.state);
        Router::new()
            .route("/mcp", post(handle_request).delete(handle_delete))
            .layer(middleware::from_fn_with_state(Arc::clone(&state), auth_layer))
            .route("/health", get(handle_health))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Run the HTTP server on the given address until Ctrl-C.
    pub async fn run(&self, addr: &str) -> McpResult<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(McpError::Io)?;

        tracing::info!("HTTP transport listening on {addr}");

        let sweeper = tokio::spawn(sweep_idle_sessions(
            Arc::clone(&self.state),
            self.session_idle,
        ));

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Interrupted, stopping HTTP transport");
            })
            .await
            .map_err(|e| McpError::Transport(e.to_string()));
        sweeper.abort();
        served?;

        if let Err(e) = self.state.handler.state().save() {
            tracing::error!("Failed to save state on exit: {e}");
        }
        Ok(())
    }
}

async fn sweep_idle_sessions(state: Arc<ServerState>, max_idle: Duration) {
    let period = (max_idle / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let pruned = state.sessions.prune(max_idle).await;
        if pruned > 0 {
            tracing::debug!("Pruned {pruned} HTTP sessions");
        }
    }
}

fn error_response(status: StatusCode, error: &McpError) -> Response {
    let body = error.to_json_rpc_error(RequestId::Null);
    (status, AxumJson(body)).into_response()
}

/// Bearer token check. /health is routed outside this layer.
async fn auth_layer(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: middleware::Next,
) -> Response {
    if let Some(expected) = &state.token {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected);

        if !authorized {
            return error_response(StatusCode::UNAUTHORIZED, &McpError::Unauthorized);
        }
    }

    next.run(request).await
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

async fn handle_request(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (session, is_new) = match session_id(&headers) {
        Some(id) => match state.sessions.get(id).await {
            Some(session) => (session, false),
            None => {
                return error_response(
                    StatusCode::NOT_FOUND,
                    &McpError::SessionNotReady(format!("unknown session {id}")),
                )
            }
        },
        None => (Arc::new(Session::new()), true),
    };

    let encoded = state.handler.handle_bytes(&session, &body).await;

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        encoded,
    )
        .into_response();

    if is_new && session.is_ready() {
        let id = state.sessions.insert(Arc::clone(&session)).await;
        tracing::info!("HTTP session {id} ready");
        if let Ok(value) = HeaderValue::from_str(&id) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    } else if !is_new && session.is_closed() {
        state.sessions.remove(&session.id().to_string()).await;
    }

    response
}

async fn handle_delete(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> StatusCode {
    let Some(id) = session_id(&headers) else {
        return StatusCode::NOT_FOUND;
    };
    match state.sessions.remove(id).await {
        Some(_) => {
            tracing::info!("HTTP session {id} deleted");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// Health check endpoint, no auth required.
async fn handle_health(State(state): State<Arc<ServerState>>) -> AxumJson<serde_json::Value> {
    AxumJson(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.count().await,
        "methods": state.handler.registry().len(),
    }))
}
