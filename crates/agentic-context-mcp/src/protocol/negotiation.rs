//! Protocol version and capability negotiation during initialization.

use crate::config::ServerConfig;
use crate::types::{
    CapabilitySet, Implementation, InitializeParams, InitializeResult, McpError, McpResult,
};

/// Outcome of a successful `initialize`, fixed for the life of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiated {
    pub version: String,
    pub capabilities: CapabilitySet,
    pub client: Option<Implementation>,
}

impl Negotiated {
    pub fn to_result(&self, config: &ServerConfig) -> InitializeResult {
        InitializeResult {
            protocol_version: self.version.clone(),
            capabilities: self.capabilities.clone(),
            server_info: Implementation {
                name: config.name.clone(),
                version: config.version.clone(),
            },
            instructions: config.instructions.clone(),
        }
    }
}

/// First version in the server's preference order that the client also lists.
pub fn negotiate_version(server: &[String], client: &[String]) -> McpResult<String> {
    server
        .iter()
        .find(|v| client.contains(v))
        .cloned()
        .ok_or_else(|| McpError::NoCompatibleVersion {
            requested: client.to_vec(),
            supported: server.to_vec(),
        })
}

/// A capability is on only when both sides declare it. Names present on
/// either side appear in the result.
pub fn negotiate_capabilities(server: &CapabilitySet, client: &CapabilitySet) -> CapabilitySet {
    server
        .keys()
        .chain(client.keys())
        .map(|name| {
            let on = server.get(name).copied().unwrap_or(false)
                && client.get(name).copied().unwrap_or(false);
            (name.clone(), on)
        })
        .collect()
}

/// Run both negotiations for one `initialize` request.
pub fn negotiate(config: &ServerConfig, params: &InitializeParams) -> McpResult<Negotiated> {
    let requested = params.requested_versions();
    if requested.is_empty() {
        return Err(McpError::InvalidParams(
            "initialize requires protocolVersions or protocolVersion".to_string(),
        ));
    }

    let version = negotiate_version(&config.protocol_versions, &requested)?;
    let capabilities =
        negotiate_capabilities(&config.capabilities, &params.declared_capabilities());

    match &params.client_info {
        Some(client) => tracing::info!(
            "Negotiated protocol {version} with client {} v{}",
            client.name,
            client.version
        ),
        None => tracing::info!("Negotiated protocol {version} with anonymous client"),
    }

    Ok(Negotiated {
        version,
        capabilities,
        client: params.client_info.clone(),
    })
}
