//! Customer service tickets.

use std::sync::{Arc, OnceLock};

use serde_json::{json, Map, Value};

use agentic_context::{ContextStore, Record, TransitionTable};

use crate::protocol::validator::{optional_str, required_str, ParamSchema, ParamType};
use crate::types::McpResult;

use super::registry::{handler_fn, ToolRegistry};

pub const KIND: &str = "ticket";

static TABLE: OnceLock<TransitionTable> = OnceLock::new();

pub fn table() -> &'static TransitionTable {
    TABLE.get_or_init(|| {
        TransitionTable::new(KIND, "open")
            .with("open", "start", "in_progress")
            .with("open", "close", "closed")
            .with("in_progress", "resolve", "resolved")
            .with("resolved", "close", "closed")
            .with("resolved", "reopen", "open")
    })
}

fn new_ticket_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("TK-{}", hex[..8].to_uppercase())
}

pub fn register(registry: &mut ToolRegistry) -> McpResult<()> {
    registry.register(
        "submit_ticket",
        "Open a support ticket and return its id",
        ParamSchema::new()
            .required("user_id", ParamType::String, "Submitting user")
            .required("subject", ParamType::String, "")
            .required("content", ParamType::String, ""),
        handler_fn(submit_ticket),
    )?;
    registry.register(
        "get_ticket",
        "Get a ticket by id",
        ParamSchema::new().required("ticket_id", ParamType::String, "Ticket id (TK-...)"),
        handler_fn(get_ticket),
    )?;
    registry.register(
        "update_ticket",
        "Apply start, resolve, close or reopen to a ticket",
        ParamSchema::new()
            .required("ticket_id", ParamType::String, "Ticket id (TK-...)")
            .required("event", ParamType::String, "Status event")
            .optional("note", ParamType::String, "Note appended to the history"),
        handler_fn(update_ticket),
    )?;
    registry.register(
        "list_tickets",
        "List tickets, optionally filtered by user and status",
        ParamSchema::new()
            .optional("user_id", ParamType::String, "")
            .optional("status", ParamType::String, ""),
        handler_fn(list_tickets),
    )?;
    Ok(())
}

async fn submit_ticket(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let user_id = required_str(&params, "user_id")?;
    let subject = required_str(&params, "subject")?;
    let content = required_str(&params, "content")?;

    let mut ticket = table().new_record(&new_ticket_id());
    ticket.set_field("user_id", user_id);
    ticket.set_field("subject", subject);
    ticket.set_field("content", content);

    let ticket = store.records.create(ticket.key(), ticket)?;
    tracing::debug!("Ticket {} submitted by {user_id}", ticket.id);
    Ok(json!({ "ticket_id": ticket.id, "status": ticket.status }))
}

async fn get_ticket(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let ticket_id = required_str(&params, "ticket_id")?;
    let ticket = store.records.get(&Record::key_for(KIND, ticket_id))?;
    Ok(serde_json::to_value(ticket)?)
}

async fn update_ticket(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let ticket_id = required_str(&params, "ticket_id")?;
    let event = required_str(&params, "event")?;
    let note = optional_str(&params, "note");

    let ticket = store
        .records
        .mutate(&Record::key_for(KIND, ticket_id), |ticket| {
            table().advance(ticket, event)?;
            if let Some(note) = note {
                ticket.log(format!("note: {note}"));
            }
            Ok(())
        })?;
    Ok(serde_json::to_value(ticket)?)
}

async fn list_tickets(store: Arc<ContextStore>, params: Map<String, Value>) -> McpResult<Value> {
    let user_id = optional_str(&params, "user_id");
    let status = optional_str(&params, "status");

    let tickets: Vec<Record> = store
        .records_of(KIND)
        .into_iter()
        .filter(|t| user_id.map_or(true, |u| t.field_str("user_id") == Some(u)))
        .filter(|t| status.map_or(true, |s| t.status == s))
        .collect();

    Ok(json!({ "count": tickets.len(), "tickets": tickets }))
}
