//! Production tasks: one per order, moved through the factory stages.

use std::sync::{Arc, OnceLock};

use serde_json::{json, Map, Value};

use agentic_context::{ContextStore, Record, TransitionTable};

use crate::protocol::validator::{optional_str, required_str, ParamSchema, ParamType};
use crate::types::{McpError, McpResult};

use super::registry::{handler_fn, ToolRegistry};

pub const KIND: &str = "task";

static TABLE: OnceLock<TransitionTable> = OnceLock::new();

pub fn table() -> &'static TransitionTable {
    TABLE.get_or_init(|| {
        TransitionTable::new(KIND, "RAW_MATERIAL")
            .with("RAW_MATERIAL", "materials_ready", "ASSEMBLY")
            .with("ASSEMBLY", "assembled", "QUALITY")
            .with("QUALITY", "quality_passed", "SHIPPING")
            .with("QUALITY", "quality_failed", "FAILED")
            .with("SHIPPING", "shipped", "COMPLETED")
    })
}

/// Station agent working a stage; terminal stages have none.
fn stage_agent(stage: &str) -> Option<&'static str> {
    match stage {
        "RAW_MATERIAL" => Some("raw_material_agent"),
        "ASSEMBLY" => Some("assembly_agent"),
        "QUALITY" => Some("quality_agent"),
        "SHIPPING" => Some("shipping_agent"),
        _ => None,
    }
}

fn assign_stage_agent(task: &mut Record) {
    match stage_agent(&task.status) {
        Some(agent) => {
            task.set_field("assigned_agent", agent);
            task.log(format!("{agent} assigned"));
        }
        None => task.set_field("assigned_agent", Value::Null),
    }
}

pub fn register(registry: &mut ToolRegistry) -> McpResult<()> {
    registry.register(
        "create_task",
        "Create a production task for an order, starting at RAW_MATERIAL",
        ParamSchema::new().required("order_id", ParamType::String, "Order identifier"),
        handler_fn(create_task),
    )?;
    registry.register(
        "advance_task",
        "Move a task to its next stage: materials_ready, assembled, quality_passed, quality_failed, shipped",
        ParamSchema::new()
            .required("order_id", ParamType::String, "Order identifier")
            .required("event", ParamType::String, "Stage event"),
        handler_fn(advance_task),
    )?;
    registry.register(
        "get_task",
        "Get a task with its stage history",
        ParamSchema::new().required("order_id", ParamType::String, "Order identifier"),
        handler_fn(get_task),
    )?;
    registry.register(
        "list_tasks",
        "List tasks, optionally only those in one stage",
        ParamSchema::new().optional("stage", ParamType::String, "Stage filter"),
        handler_fn(list_tasks),
    )?;
    Ok(())
}

async fn create_task(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let order_id = required_str(&params, "order_id")?;

    let mut task = table().new_record(order_id);
    task.set_field("order_id", order_id);
    task.set_field("task_id", uuid::Uuid::new_v4().to_string());
    assign_stage_agent(&mut task);

    let task = store.records.create(task.key(), task)?;
    tracing::debug!("Created task for order {order_id}");
    Ok(serde_json::to_value(task)?)
}

async fn advance_task(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let order_id = required_str(&params, "order_id")?;
    let event = required_str(&params, "event")?;

    let task = store
        .records
        .mutate(&Record::key_for(KIND, order_id), |task| {
            table().advance(task, event)?;
            assign_stage_agent(task);
            Ok(())
        })?;

    tracing::debug!("Task {order_id} advanced to {}", task.status);
    Ok(serde_json::to_value(task)?)
}

async fn get_task(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let order_id = required_str(&params, "order_id")?;
    let task = store.records.get(&Record::key_for(KIND, order_id))?;
    Ok(serde_json::to_value(task)?)
}

async fn list_tasks(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let stage = optional_str(&params, "stage");
    if let Some(stage) = stage {
        if !table().is_state(stage) {
            return Err(McpError::InvalidParams(format!(
                "Unknown stage '{stage}'. Use one of: {}",
                table().states().join(", ")
            )));
        }
    }

    let tasks: Vec<Record> = store
        .records_of(KIND)
        .into_iter()
        .filter(|t| stage.map_or(true, |s| t.status == s))
        .collect();

    Ok(json!({ "count": tasks.len(), "tasks": tasks }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let store = Arc::new(ContextStore::new());
        let created = create_task(store.clone(), params(json!({"order_id": "ORD-1"})))
            .await
            .unwrap();
        assert_eq!(created["status"], "RAW_MATERIAL");
        assert_eq!(created["fields"]["assigned_agent"], "raw_material_agent");

        for event in ["materials_ready", "assembled", "quality_passed", "shipped"] {
            advance_task(
                store.clone(),
                params(json!({"order_id": "ORD-1", "event": event})),
            )
            .await
            .unwrap();
        }

        let task = store.records.get("task:ORD-1").unwrap();
        assert_eq!(task.status, "COMPLETED");
        assert_eq!(task.field("assigned_agent"), Some(&Value::Null));
        assert!(table().is_terminal("COMPLETED"));
    }

    #[tokio::test]
    async fn test_out_of_order_event() {
        let store = Arc::new(ContextStore::new());
        create_task(store.clone(), params(json!({"order_id": "ORD-2"})))
            .await
            .unwrap();
        let err = advance_task(
            store.clone(),
            params(json!({"order_id": "ORD-2", "event": "shipped"})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::InvalidTransition { .. }));
        assert_eq!(store.records.get("task:ORD-2").unwrap().status, "RAW_MATERIAL");
    }

    #[tokio::test]
    async fn test_list_by_stage() {
        let store = Arc::new(ContextStore::new());
        for id in ["A", "B", "C"] {
            create_task(store.clone(), params(json!({"order_id": id})))
                .await
                .unwrap();
        }
        advance_task(
            store.clone(),
            params(json!({"order_id": "B", "event": "materials_ready"})),
        )
        .await
        .unwrap();

        let listed = list_tasks(store.clone(), params(json!({"stage": "ASSEMBLY"})))
            .await
            .unwrap();
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["tasks"][0]["id"], "B");

        let err = list_tasks(store, params(json!({"stage": "PAINTING"})))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));
    }
}
