//! Capability sets and initialization types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SERVER_NAME: &str = "agentic-context-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capability name to support flag. Ordered so encoding is deterministic.
pub type CapabilitySet = BTreeMap<String, bool>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

/// Parameters of the reserved `initialize` method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Requested versions, client preference order.
    #[serde(default, alias = "versions")]
    pub protocol_versions: Vec<String>,
    /// Single requested version, as sent by MCP clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub capabilities: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Implementation>,
}

impl InitializeParams {
    /// Requested versions; a lone `protocolVersion` counts as a one-entry list.
    pub fn requested_versions(&self) -> Vec<String> {
        let mut versions = self.protocol_versions.clone();
        if let Some(v) = &self.protocol_version {
            if !versions.contains(v) {
                versions.push(v.clone());
            }
        }
        versions
    }

    /// Client capabilities as flags. `true` or an object declares support;
    /// anything else (false, null, numbers, strings) does not.
    pub fn declared_capabilities(&self) -> CapabilitySet {
        self.capabilities
            .iter()
            .map(|(name, value)| {
                let declared = matches!(value, Value::Bool(true) | Value::Object(_));
                (name.clone(), declared)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: CapabilitySet,
    pub server_info: Implementation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_versions_alias_and_single() {
        let params: InitializeParams =
            serde_json::from_value(json!({ "versions": ["1.1.0", "2.0.0"] })).unwrap();
        assert_eq!(params.requested_versions(), vec!["1.1.0", "2.0.0"]);

        let params: InitializeParams =
            serde_json::from_value(json!({ "protocolVersion": "2024-11-05" })).unwrap();
        assert_eq!(params.requested_versions(), vec!["2024-11-05"]);
    }

    #[test]
    fn test_declared_capabilities() {
        let params: InitializeParams = serde_json::from_value(json!({
            "capabilities": {
                "tools": true,
                "logging": false,
                "roots": { "listChanged": true },
                "sampling": null,
                "weird": 1
            }
        }))
        .unwrap();
        let caps = params.declared_capabilities();
        assert_eq!(caps.get("tools"), Some(&true));
        assert_eq!(caps.get("logging"), Some(&false));
        assert_eq!(caps.get("roots"), Some(&true));
        assert_eq!(caps.get("sampling"), Some(&false));
        assert_eq!(caps.get("weird"), Some(&false));
    }
}
