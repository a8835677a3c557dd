//! Dispatch core: routes decoded requests to the negotiator, the built-in
//! methods, or a registered handler, and produces exactly one response each.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Map, Value};

use agentic_context::ContextStore;

use crate::config::ServerConfig;
use crate::resources::ResourceRegistry;
use crate::session::{Session, StateManager};
use crate::tools::{default_registry, ToolRegistry};
use crate::types::*;

use super::codec;
use super::negotiation::negotiate;

/// Shared by every session of the process. Cloning is cheap.
#[derive(Clone)]
pub struct ProtocolHandler {
    registry: Arc<ToolRegistry>,
    state: Arc<StateManager>,
    config: Arc<ServerConfig>,
}

impl ProtocolHandler {
    pub fn new(registry: ToolRegistry, state: StateManager, config: ServerConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            state: Arc::new(state),
            config: Arc::new(config),
        }
    }

    /// Bundled handlers, default config, in-memory state.
    pub fn in_memory() -> McpResult<Self> {
        Ok(Self::new(
            default_registry()?,
            StateManager::in_memory(),
            ServerConfig::default(),
        ))
    }

    pub fn new_session(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        tracing::info!("Session {} opened", session.id());
        session
    }

    pub fn store(&self) -> Arc<ContextStore> {
        self.state.store()
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Decode one frame, dispatch it, and encode the response.
    pub async fn handle_bytes(&self, session: &Session, bytes: &[u8]) -> Vec<u8> {
        let response = match codec::decode(bytes) {
            Ok(request) => self.dispatch(session, request).await,
            Err(e) => {
                tracing::warn!("Session {}: {e}", session.id());
                Response::from_decode_error(&e)
            }
        };
        codec::encode(&response)
    }

    pub async fn dispatch(&self, session: &Session, request: JsonRpcRequest) -> Response {
        let id = request.id.clone();
        let method = request.method.clone();
        tracing::debug!("Session {}: dispatch {method} (id {id})", session.id());

        match self.route(session, request).await {
            Ok(result) => Response::success(id, result),
            Err(e) => {
                if e.is_internal() {
                    tracing::error!("{method} (id {id}) failed: {e}");
                } else if e.is_domain() {
                    tracing::debug!("{method} (id {id}) rejected: {e}");
                } else {
                    tracing::warn!("{method} (id {id}): {e}");
                }
                Response::error(id, &e)
            }
        }
    }

    async fn route(&self, session: &Session, request: JsonRpcRequest) -> McpResult<Value> {
        if request.method == "initialize" {
            return self.handle_initialize(session, request.params);
        }

        session.ensure_ready()?;

        let method = request.method.as_str();
        if let Some(capability) = required_capability(method) {
            if !session.has_capability(capability) {
                return Err(McpError::CapabilityNotNegotiated(capability.to_string()));
            }
        }

        match method {
            "ping" => Ok(json!({})),
            "shutdown" => self.handle_shutdown(session),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "resources/list" => self.handle_resources_list(),
            "resources/templates/list" => Ok(serde_json::to_value(ResourceTemplateListResult {
                resource_templates: ResourceRegistry::list_templates(),
            })?),
            "resources/read" => self.handle_resources_read(request.params),
            name => self.invoke(name, request.params).await,
        }
    }

    fn handle_initialize(&self, session: &Session, params: Map<String, Value>) -> McpResult<Value> {
        session.begin_negotiation()?;

        let outcome = serde_json::from_value::<InitializeParams>(Value::Object(params))
            .map_err(|e| McpError::InvalidParams(e.to_string()))
            .and_then(|params| negotiate(&self.config, &params));

        match outcome {
            Ok(negotiated) => {
                let result = negotiated.to_result(&self.config);
                if !session.complete_negotiation(negotiated) {
                    return Err(McpError::SessionNotReady(session.state().to_string()));
                }
                tracing::info!("Session {} ready", session.id());
                Ok(serde_json::to_value(result)?)
            }
            Err(e) => {
                session.close();
                tracing::warn!("Session {} negotiation failed: {e}", session.id());
                Err(e)
            }
        }
    }

    fn handle_shutdown(&self, session: &Session) -> McpResult<Value> {
        tracing::info!("Shutdown requested by session {}", session.id());
        let saved = self.state.save();
        session.close();
        saved?;
        Ok(json!({}))
    }

    fn handle_tools_list(&self) -> McpResult<Value> {
        let result = ToolListResult {
            tools: self.registry.list_tools(),
            next_cursor: None,
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_resources_list(&self) -> McpResult<Value> {
        let result = ResourceListResult {
            resources: ResourceRegistry::list_resources(&self.state.store()),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn handle_resources_read(&self, params: Map<String, Value>) -> McpResult<Value> {
        let read: ResourceReadParams = serde_json::from_value(Value::Object(params))
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let result = ResourceRegistry::read(&read.uri, &self.state.store())?;
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_tools_call(&self, params: Map<String, Value>) -> McpResult<Value> {
        let call: ToolCallParams = serde_json::from_value(Value::Object(params))
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;
        let (name, arguments) = call.into_parts();
        self.invoke(&name, arguments).await
    }

    async fn invoke(&self, name: &str, params: Map<String, Value>) -> McpResult<Value> {
        let entry = self.registry.lookup(name)?;
        entry.schema.validate(&params)?;

        let call = entry.handler.call(self.state.store(), params);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(result)) => {
                self.state.mark_dirty();
                if let Err(e) = self.state.maybe_auto_save() {
                    tracing::error!("Auto-save failed: {e}");
                }
                Ok(result)
            }
            Ok(Err(e)) => Err(e),
            Err(panic) => Err(McpError::InternalError(format!(
                "Handler '{name}' panicked: {}",
                panic_message(&*panic)
            ))),
        }
    }
}

/// The `tools/*` and `resources/*` built-ins answer only when the matching
/// capability was negotiated. Registered methods are always callable by name.
fn required_capability(method: &str) -> Option<&'static str> {
    if method.starts_with("tools/") {
        Some("tools")
    } else if method.starts_with("resources/") {
        Some("resources")
    } else {
        None
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
