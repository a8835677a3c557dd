//! Handler registration and lookup.
//!
//! The registry is filled at startup and then shared read-only behind an
//! `Arc`, so lookups take no locks.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use agentic_context::ContextStore;

use crate::protocol::validator::ParamSchema;
use crate::types::{McpError, McpResult, ToolDefinition};

use super::{agents, slots, tasks, tickets};

/// Methods handled by the dispatch core itself. They cannot be registered.
pub const RESERVED_METHODS: &[&str] = &[
    "initialize",
    "ping",
    "shutdown",
    "tools/list",
    "tools/call",
    "resources/list",
    "resources/templates/list",
    "resources/read",
];

/// A named method implementation. Params have already been validated
/// against the method's schema.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value>;
}

/// Adapter turning an async function into a `ToolHandler`.
pub struct FnHandler<F>(F);

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Arc<ContextStore>, Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<Value>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Arc<ContextStore>, Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = McpResult<Value>> + Send + 'static,
{
    async fn call(&self, store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
        (self.0)(store, params).await
    }
}

/// One registered method.
#[derive(Clone)]
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub schema: ParamSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolEntry {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.schema.to_json_schema(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    entries: BTreeMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`. Names are unique, and the built-in
    /// method names are taken.
    pub fn register<H>(
        &mut self,
        name: &str,
        description: &str,
        schema: ParamSchema,
        handler: H,
    ) -> McpResult<()>
    where
        H: ToolHandler + 'static,
    {
        if RESERVED_METHODS.contains(&name) || self.entries.contains_key(name) {
            return Err(McpError::DuplicateMethod(name.to_string()));
        }
        if name.is_empty() {
            return Err(McpError::InvalidParams(
                "Method name must not be empty".to_string(),
            ));
        }
        self.entries.insert(
            name.to_string(),
            ToolEntry {
                name: name.to_string(),
                description: description.to_string(),
                schema,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> McpResult<&ToolEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| McpError::MethodNotFound(name.to_string()))
    }

    /// Definitions of every registered method, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.entries.values().map(ToolEntry::definition).collect()
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry with every bundled handler module.
pub fn default_registry() -> McpResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    tasks::register(&mut registry)?;
    tickets::register(&mut registry)?;
    agents::register(&mut registry)?;
    slots::register(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::validator::ParamType;
    use serde_json::json;

    async fn echo(_store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
        Ok(Value::Object(params))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "echo",
                "Echo params",
                ParamSchema::new().required("text", ParamType::String, ""),
                handler_fn(echo),
            )
            .unwrap();
        assert_eq!(registry.lookup("echo").unwrap().name, "echo");
        assert!(matches!(
            registry.lookup("missing"),
            Err(McpError::MethodNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_and_reserved() {
        let mut registry = ToolRegistry::new();
        registry
            .register("echo", "", ParamSchema::new(), handler_fn(echo))
            .unwrap();
        assert!(matches!(
            registry.register("echo", "", ParamSchema::new(), handler_fn(echo)),
            Err(McpError::DuplicateMethod(_))
        ));
        assert!(matches!(
            registry.register("initialize", "", ParamSchema::new(), handler_fn(echo)),
            Err(McpError::DuplicateMethod(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_default_registry_sorted() {
        let registry = default_registry().unwrap();
        let names = registry.method_names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"create_task"));
        assert!(names.contains(&"inject_context"));

        let tools = registry.list_tools();
        let create = tools.iter().find(|t| t.name == "create_task").unwrap();
        assert_eq!(create.input_schema["required"], json!(["order_id"]));
    }

    #[tokio::test]
    async fn test_handler_fn_invocation() {
        let handler = handler_fn(echo);
        let mut params = Map::new();
        params.insert("text".into(), json!("hi"));
        let result = handler
            .call(Arc::new(ContextStore::new()), params)
            .await
            .unwrap();
        assert_eq!(result["text"], "hi");
    }
}
