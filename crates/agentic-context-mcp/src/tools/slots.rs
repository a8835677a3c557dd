//! Named context slots and prompt composition.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use agentic_context::{ContextStore, Slot, SlotRole};

use crate::protocol::validator::{optional_str, required_str, ParamSchema, ParamType};
use crate::types::McpResult;

use super::registry::{handler_fn, ToolRegistry};

pub fn register(registry: &mut ToolRegistry) -> McpResult<()> {
    registry.register(
        "inject_context",
        "Create or replace a named context slot",
        ParamSchema::new()
            .required("name", ParamType::String, "Slot name")
            .required("role", ParamType::String, "system, user, assistant or tool")
            .required("content", ParamType::String, "")
            .optional("options", ParamType::Object, "Free-form slot options"),
        handler_fn(inject_context),
    )?;
    registry.register(
        "get_context",
        "Get a context slot by name",
        ParamSchema::new().required("name", ParamType::String, "Slot name"),
        handler_fn(get_context),
    )?;
    registry.register(
        "list_context",
        "List context slots, optionally by role",
        ParamSchema::new().optional("role", ParamType::String, ""),
        handler_fn(list_context),
    )?;
    registry.register(
        "compose_context",
        "Render slots as prompt text, one '[role - name]: content' line each",
        ParamSchema::new().optional("names", ParamType::Array, "Slot names in output order"),
        handler_fn(compose_context),
    )?;
    Ok(())
}

fn role_rank(role: SlotRole) -> u8 {
    match role {
        SlotRole::System => 0,
        SlotRole::User => 1,
        SlotRole::Assistant => 2,
        SlotRole::Tool => 3,
    }
}

fn sorted_slots(store: &ContextStore) -> Vec<Slot> {
    let mut slots = store.slots.list(|_| true);
    slots.sort_by(|a, b| a.name.cmp(&b.name));
    slots
}

async fn inject_context(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let name = required_str(&params, "name")?;
    let role = SlotRole::from_str(required_str(&params, "role")?)?;
    let content = required_str(&params, "content")?;

    let mut slot = Slot::new(name, role, content);
    slot.options = params.get("options").filter(|v| !v.is_null()).cloned();

    let previous = store.slots.put(name, slot.clone());
    tracing::debug!("Injected {role} slot '{name}'");
    Ok(json!({ "slot": slot, "replaced": previous.is_some() }))
}

async fn get_context(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let name = required_str(&params, "name")?;
    let slot = store.slots.get(name)?;
    Ok(serde_json::to_value(slot)?)
}

async fn list_context(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let role = optional_str(&params, "role")
        .map(SlotRole::from_str)
        .transpose()?;

    let slots: Vec<Slot> = sorted_slots(&store)
        .into_iter()
        .filter(|s| role.map_or(true, |r| s.role == r))
        .collect();

    Ok(json!({ "count": slots.len(), "slots": slots }))
}

async fn compose_context(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let slots = match params.get("names").and_then(Value::as_array) {
        Some(names) => names
            .iter()
            .filter_map(Value::as_str)
            .map(|name| store.slots.get(name))
            .collect::<Result<Vec<_>, _>>()?,
        None => prompt_order(&store),
    };

    Ok(json!({ "prompt": render_prompt(&slots), "slots": slots.len() }))
}

/// Every slot, system first, then by role and name.
pub fn prompt_order(store: &ContextStore) -> Vec<Slot> {
    let mut slots = sorted_slots(store);
    slots.sort_by_key(|s| role_rank(s.role));
    slots
}

/// One `[role - name]: content` line per slot.
pub fn render_prompt(slots: &[Slot]) -> String {
    slots
        .iter()
        .map(|s| format!("[{} - {}]: {}", s.role, s.name, s.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::McpError;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_inject_upserts() {
        let store = Arc::new(ContextStore::new());
        let first = inject_context(
            store.clone(),
            params(json!({"name": "Instruction", "role": "system", "content": "Be precise."})),
        )
        .await
        .unwrap();
        assert_eq!(first["replaced"], false);

        let second = inject_context(
            store.clone(),
            params(json!({
                "name": "Instruction",
                "role": "system",
                "content": "Be brief.",
                "options": {"priority": 1}
            })),
        )
        .await
        .unwrap();
        assert_eq!(second["replaced"], true);

        let slot = get_context(store.clone(), params(json!({"name": "Instruction"})))
            .await
            .unwrap();
        assert_eq!(slot["content"], "Be brief.");
        assert_eq!(slot["options"]["priority"], 1);
        assert_eq!(store.slots.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_role_is_invalid_params() {
        let store = Arc::new(ContextStore::new());
        let err = inject_context(
            store,
            params(json!({"name": "x", "role": "narrator", "content": "..."})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_compose_orders_by_role() {
        let store = Arc::new(ContextStore::new());
        for (name, role, content) in [
            ("KnowledgeDB", "tool", "Docs retrieved."),
            ("Question", "user", "Explain sessions."),
            ("Instruction", "system", "Answer with examples."),
        ] {
            inject_context(
                store.clone(),
                params(json!({"name": name, "role": role, "content": content})),
            )
            .await
            .unwrap();
        }

        let composed = compose_context(store.clone(), Map::new()).await.unwrap();
        assert_eq!(
            composed["prompt"],
            "[system - Instruction]: Answer with examples.\n\
             [user - Question]: Explain sessions.\n\
             [tool - KnowledgeDB]: Docs retrieved."
        );

        let picked = compose_context(store.clone(), params(json!({"names": ["Question"]})))
            .await
            .unwrap();
        assert_eq!(picked["slots"], 1);

        let listed = list_context(store, params(json!({"role": "user"})))
            .await
            .unwrap();
        assert_eq!(listed["count"], 1);
    }
}
