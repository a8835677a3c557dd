//! Agent registry with per-agent message inboxes.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use serde_json::{json, Map, Value};

use agentic_context::{ContextStore, Record, TransitionTable};

use crate::protocol::validator::{optional_str, required_str, ParamSchema, ParamType};
use crate::types::{McpError, McpResult};

use super::registry::{handler_fn, ToolRegistry};

pub const KIND: &str = "agent";

static TABLE: OnceLock<TransitionTable> = OnceLock::new();

pub fn table() -> &'static TransitionTable {
    TABLE.get_or_init(|| {
        TransitionTable::new(KIND, "idle")
            .with("idle", "assign", "busy")
            .with("busy", "release", "idle")
    })
}

fn take_inbox(agent: &mut Record) -> Vec<Value> {
    match agent.fields.remove("inbox") {
        Some(Value::Array(messages)) => messages,
        _ => Vec::new(),
    }
}

pub fn register(registry: &mut ToolRegistry) -> McpResult<()> {
    registry.register(
        "register_agent",
        "Register an agent with a role; it starts idle with an empty inbox",
        ParamSchema::new()
            .required("agent_id", ParamType::String, "")
            .required("role", ParamType::String, "What the agent does"),
        handler_fn(register_agent),
    )?;
    registry.register(
        "send_message",
        "Deliver a message from one registered agent to another",
        ParamSchema::new()
            .required("sender_id", ParamType::String, "")
            .required("receiver_id", ParamType::String, "")
            .required("content", ParamType::Any, "Message body"),
        handler_fn(send_message),
    )?;
    registry.register(
        "fetch_inbox",
        "Return an agent's pending messages and clear the inbox unless keep is true",
        ParamSchema::new()
            .required("agent_id", ParamType::String, "")
            .optional("keep", ParamType::Boolean, "Leave messages in the inbox"),
        handler_fn(fetch_inbox),
    )?;
    registry.register(
        "update_agent",
        "Apply assign or release to an agent",
        ParamSchema::new()
            .required("agent_id", ParamType::String, "")
            .required("event", ParamType::String, "assign or release"),
        handler_fn(update_agent),
    )?;
    registry.register(
        "list_agents",
        "List registered agents, optionally by role",
        ParamSchema::new().optional("role", ParamType::String, ""),
        handler_fn(list_agents),
    )?;
    Ok(())
}

async fn register_agent(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let agent_id = required_str(&params, "agent_id")?;
    let role = required_str(&params, "role")?;

    let mut agent = table().new_record(agent_id);
    agent.set_field("role", role);
    agent.set_field("inbox", Value::Array(Vec::new()));

    let agent = store.records.create(agent.key(), agent)?;
    tracing::debug!("Registered agent {agent_id} as {role}");
    Ok(serde_json::to_value(agent)?)
}

async fn send_message(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let sender_id = required_str(&params, "sender_id")?;
    let receiver_id = required_str(&params, "receiver_id")?;
    let content = params.get("content").cloned().unwrap_or(Value::Null);

    if sender_id == receiver_id {
        return Err(McpError::Rejected(format!(
            "Agent {sender_id} cannot message itself"
        )));
    }
    if !store.records.contains(&Record::key_for(KIND, sender_id)) {
        return Err(McpError::NotFound(Record::key_for(KIND, sender_id)));
    }

    let message_id = uuid::Uuid::new_v4().to_string();
    let message = json!({
        "message_id": message_id,
        "sender_id": sender_id,
        "content": content,
        "sent_at": Utc::now(),
    });

    let receiver = store
        .records
        .mutate(&Record::key_for(KIND, receiver_id), |agent| {
            let mut inbox = take_inbox(agent);
            inbox.push(message);
            agent.set_field("inbox", Value::Array(inbox));
            Ok(())
        })?;

    let pending = receiver
        .field("inbox")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    Ok(json!({
        "message_id": message_id,
        "receiver_id": receiver_id,
        "pending": pending,
    }))
}

async fn fetch_inbox(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let agent_id = required_str(&params, "agent_id")?;
    let keep = params.get("keep").and_then(Value::as_bool).unwrap_or(false);
    let key = Record::key_for(KIND, agent_id);

    let messages = if keep {
        let mut agent = store.records.get(&key)?;
        take_inbox(&mut agent)
    } else {
        let mut drained = Vec::new();
        store.records.mutate(&key, |agent| {
            drained = take_inbox(agent);
            agent.set_field("inbox", Value::Array(Vec::new()));
            Ok(())
        })?;
        drained
    };

    Ok(json!({ "agent_id": agent_id, "messages": messages }))
}

async fn update_agent(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let agent_id = required_str(&params, "agent_id")?;
    let event = required_str(&params, "event")?;

    let agent = store
        .records
        .mutate(&Record::key_for(KIND, agent_id), |agent| {
            table().advance(agent, event)?;
            Ok(())
        })?;
    Ok(json!({ "agent_id": agent.id, "status": agent.status }))
}

async fn list_agents(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let role = optional_str(&params, "role");

    let agents: Vec<Value> = store
        .records_of(KIND)
        .into_iter()
        .filter(|a| role.map_or(true, |r| a.field_str("role") == Some(r)))
        .map(|a| {
            let pending = a.field("inbox").and_then(Value::as_array).map_or(0, Vec::len);
            json!({
                "agent_id": a.id,
                "role": a.field_str("role"),
                "status": a.status,
                "pending": pending,
            })
        })
        .collect();

    Ok(json!({ "count": agents.len(), "agents": agents }))
}
