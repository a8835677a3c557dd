//! Resource listing and URI dispatch.

use agentic_context::{ContextStore, Record};

use crate::tools::slots::{prompt_order, render_prompt};
use crate::types::{
    McpError, McpResult, ReadResourceResult, ResourceContent, ResourceDefinition,
    ResourceTemplateDefinition,
};

use super::templates::{self, JSON_MIME, PROMPT_URI, RECORD_SCHEME, SLOT_SCHEME, STATS_URI, TEXT_MIME};

pub struct ResourceRegistry;

impl ResourceRegistry {
    pub fn list_templates() -> Vec<ResourceTemplateDefinition> {
        templates::list_templates()
    }

    pub fn list_resources(store: &ContextStore) -> Vec<ResourceDefinition> {
        templates::list_resources(store)
    }

    pub fn read(uri: &str, store: &ContextStore) -> McpResult<ReadResourceResult> {
        let content = if let Some(rest) = uri.strip_prefix(RECORD_SCHEME) {
            let (kind, id) = rest
                .split_once('/')
                .filter(|(kind, id)| !kind.is_empty() && !id.is_empty())
                .ok_or_else(|| {
                    McpError::InvalidParams("Record URI must be record://{kind}/{id}".to_string())
                })?;
            let record = store.records.get(&Record::key_for(kind, id))?;
            json_content(uri, &record)?
        } else if let Some(name) = uri.strip_prefix(SLOT_SCHEME) {
            if name.is_empty() {
                return Err(McpError::InvalidParams(
                    "Slot URI must be slot://{name}".to_string(),
                ));
            }
            json_content(uri, &store.slots.get(name)?)?
        } else if uri == STATS_URI {
            json_content(uri, &store.stats())?
        } else if uri == PROMPT_URI {
            ResourceContent {
                uri: uri.to_string(),
                mime_type: Some(TEXT_MIME.to_string()),
                text: render_prompt(&prompt_order(store)),
            }
        } else {
            return Err(McpError::NotFound(uri.to_string()));
        };

        Ok(ReadResourceResult {
            contents: vec![content],
        })
    }
}

fn json_content<T: serde::Serialize>(uri: &str, value: &T) -> McpResult<ResourceContent> {
    Ok(ResourceContent {
        uri: uri.to_string(),
        mime_type: Some(JSON_MIME.to_string()),
        text: serde_json::to_string_pretty(value)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentic_context::{Slot, SlotRole};

    fn store() -> ContextStore {
        let store = ContextStore::new();
        let ticket = Record::new("ticket", "TK-0000ABCD", "open");
        store.records.create(ticket.key(), ticket).unwrap();
        store
            .slots
            .put("Instruction", Slot::new("Instruction", SlotRole::System, "Be brief."));
        store
            .slots
            .put("Question", Slot::new("Question", SlotRole::User, "Where is my order?"));
        store
    }

    #[test]
    fn test_list_includes_stored_items() {
        let uris: Vec<String> = ResourceRegistry::list_resources(&store())
            .into_iter()
            .map(|r| r.uri)
            .collect();
        assert_eq!(
            uris,
            vec![
                "context://stats",
                "context://prompt",
                "record://ticket/TK-0000ABCD",
                "slot://Instruction",
                "slot://Question",
            ]
        );
    }

    #[test]
    fn test_read_record_and_slot() {
        let store = store();
        let result = ResourceRegistry::read("record://ticket/TK-0000ABCD", &store).unwrap();
        let record: Record = serde_json::from_str(&result.contents[0].text).unwrap();
        assert_eq!(record.status, "open");

        let result = ResourceRegistry::read("slot://Question", &store).unwrap();
        assert!(result.contents[0].text.contains("Where is my order?"));
    }

    #[test]
    fn test_read_prompt() {
        let result = ResourceRegistry::read("context://prompt", &store()).unwrap();
        assert_eq!(
            result.contents[0].text,
            "[system - Instruction]: Be brief.\n[user - Question]: Where is my order?"
        );
        assert_eq!(result.contents[0].mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_read_errors() {
        let store = store();
        assert!(matches!(
            ResourceRegistry::read("record://ticket/TK-MISSING", &store),
            Err(McpError::NotFound(_))
        ));
        assert!(matches!(
            ResourceRegistry::read("record://ticket", &store),
            Err(McpError::InvalidParams(_))
        ));
        assert!(matches!(
            ResourceRegistry::read("memory://stats", &store),
            Err(McpError::NotFound(_))
        ));
    }
}
