//! Resource URI templates and fixed resource definitions.

use agentic_context::ContextStore;

use crate::types::{ResourceDefinition, ResourceTemplateDefinition};

pub const STATS_URI: &str = "context://stats";
pub const PROMPT_URI: &str = "context://prompt";
pub const RECORD_SCHEME: &str = "record://";
pub const SLOT_SCHEME: &str = "slot://";

pub const JSON_MIME: &str = "application/json";
pub const TEXT_MIME: &str = "text/plain";

pub fn list_templates() -> Vec<ResourceTemplateDefinition> {
    vec![
        ResourceTemplateDefinition {
            uri_template: "record://{kind}/{id}".to_string(),
            name: "Record".to_string(),
            description: Some("One record with its fields and history".to_string()),
            mime_type: Some(JSON_MIME.to_string()),
        },
        ResourceTemplateDefinition {
            uri_template: "slot://{name}".to_string(),
            name: "Context Slot".to_string(),
            description: Some("One named context slot".to_string()),
            mime_type: Some(JSON_MIME.to_string()),
        },
    ]
}

fn fixed_resources() -> Vec<ResourceDefinition> {
    vec![
        ResourceDefinition {
            uri: STATS_URI.to_string(),
            name: "Store Statistics".to_string(),
            description: Some("Record and slot counts by kind".to_string()),
            mime_type: Some(JSON_MIME.to_string()),
        },
        ResourceDefinition {
            uri: PROMPT_URI.to_string(),
            name: "Composed Prompt".to_string(),
            description: Some("All slots rendered as prompt lines".to_string()),
            mime_type: Some(TEXT_MIME.to_string()),
        },
    ]
}

/// Fixed resources first, then every record and slot currently stored.
pub fn list_resources(store: &ContextStore) -> Vec<ResourceDefinition> {
    let mut records = store.records.list(|_| true);
    records.sort_by(|a, b| (&a.kind, &a.id).cmp(&(&b.kind, &b.id)));

    let mut slots = store.slots.list(|_| true);
    slots.sort_by(|a, b| a.name.cmp(&b.name));

    let records = records.into_iter().map(|record| ResourceDefinition {
        uri: format!("{RECORD_SCHEME}{}/{}", record.kind, record.id),
        name: format!("{} {}", record.kind, record.id),
        description: Some(format!("Status: {}", record.status)),
        mime_type: Some(JSON_MIME.to_string()),
    });
    let slots = slots.into_iter().map(|slot| ResourceDefinition {
        uri: format!("{SLOT_SCHEME}{}", slot.name),
        name: slot.name.clone(),
        description: Some(format!("{} slot", slot.role)),
        mime_type: Some(JSON_MIME.to_string()),
    });

    fixed_resources().into_iter().chain(records).chain(slots).collect()
}
