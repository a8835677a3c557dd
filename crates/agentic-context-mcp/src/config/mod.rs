//! Configuration loading and resolution.

use std::path::PathBuf;

use crate::types::{CapabilitySet, McpError, McpResult, SERVER_NAME, SERVER_VERSION};

/// Environment variable naming the snapshot file.
pub const STATE_ENV: &str = "AGENTIC_CONTEXT_STATE";

/// Environment variable holding the HTTP bearer token.
pub const TOKEN_ENV: &str = "AGENTIC_TOKEN";

/// Protocol versions supported by default, most preferred first.
pub const DEFAULT_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Server-side settings consulted during negotiation and dispatch.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    /// Supported protocol versions in preference order.
    pub protocol_versions: Vec<String>,
    pub capabilities: CapabilitySet,
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let capabilities = [
            ("tools", true),
            ("logging", true),
            ("prompts", false),
            ("resources", true),
        ]
        .into_iter()
        .map(|(name, on)| (name.to_string(), on))
        .collect();

        Self {
            name: SERVER_NAME.to_string(),
            version: SERVER_VERSION.to_string(),
            protocol_versions: DEFAULT_PROTOCOL_VERSIONS
                .iter()
                .map(|v| v.to_string())
                .collect(),
            capabilities,
            instructions: Some(
                "Call tools/list to discover methods. Records persist for the life of the server."
                    .to_string(),
            ),
        }
    }
}

impl ServerConfig {
    /// Replace the supported versions. An empty list keeps the defaults.
    pub fn with_protocol_versions(mut self, versions: Vec<String>) -> Self {
        if !versions.is_empty() {
            self.protocol_versions = versions;
        }
        self
    }

    /// Apply `name=bool` capability overrides.
    pub fn with_capability_flags(mut self, flags: &[String]) -> McpResult<Self> {
        for flag in flags {
            let (name, on) = parse_capability_flag(flag)?;
            self.capabilities.insert(name, on);
        }
        Ok(self)
    }
}

/// Parse `name=bool` (or a bare `name`, meaning true).
pub fn parse_capability_flag(flag: &str) -> McpResult<(String, bool)> {
    let (name, value) = match flag.split_once('=') {
        Some((name, value)) => (name.trim(), value.trim()),
        None => (flag.trim(), "true"),
    };
    if name.is_empty() {
        return Err(McpError::InvalidParams(format!(
            "Capability flag '{flag}' has no name"
        )));
    }
    let on = match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => true,
        "false" | "off" | "no" | "0" => false,
        _ => {
            return Err(McpError::InvalidParams(format!(
                "Capability flag '{flag}' must be name=true or name=false"
            )))
        }
    };
    Ok((name.to_string(), on))
}

/// Resolve the snapshot path: explicit flag, then environment, then
/// `.actx/state.actx` in the working directory if it already exists.
/// `None` means state stays in memory.
pub fn resolve_state_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(STATE_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let cwd_state = PathBuf::from(".actx/state.actx");
    cwd_state.exists().then_some(cwd_state)
}
