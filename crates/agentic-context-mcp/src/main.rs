//! AgenticContext MCP Server entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use agentic_context::SnapshotReader;
use agentic_context_mcp::config::{resolve_state_path, ServerConfig};
use agentic_context_mcp::protocol::ProtocolHandler;
use agentic_context_mcp::session::StateManager;
use agentic_context_mcp::tools::default_registry;
use agentic_context_mcp::tools::registry::RESERVED_METHODS;
use agentic_context_mcp::transport::{StdioTransport, TcpServer};

#[derive(Parser)]
#[command(
    name = "agentic-context-mcp",
    about = "MCP server for AgenticContext, negotiated sessions dispatching named tools against shared state",
    version
)]
struct Cli {
    /// Path to .actx state snapshot. Also reads AGENTIC_CONTEXT_STATE.
    #[arg(short, long, global = true)]
    state: Option<String>,

    /// Supported protocol version, most preferred first. Repeatable.
    #[arg(long = "protocol-version", global = true)]
    protocol_versions: Vec<String>,

    /// Server capability override as name=true|false. Repeatable.
    #[arg(long = "capability", global = true)]
    capabilities: Vec<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Start MCP server over raw TCP, one session per connection.
    ServeTcp {
        /// Listen address (host:port).
        #[arg(long, default_value = "127.0.0.1:3200")]
        addr: String,
    },

    /// Start MCP server over HTTP.
    #[cfg(feature = "http")]
    ServeHttp {
        /// Listen address (host:port).
        #[arg(long, default_value = "127.0.0.1:3100")]
        addr: String,

        /// Bearer token for authentication.
        /// Also reads from AGENTIC_TOKEN env var.
        #[arg(long)]
        token: Option<String>,

        /// Close HTTP sessions unused for this many seconds.
        #[arg(long, default_value_t = 1800)]
        session_idle_secs: u64,
    },

    /// Validate a .actx state snapshot.
    Validate {
        /// Snapshot to check; defaults to the resolved state path.
        path: Option<String>,
    },

    /// Print server capabilities, versions, and methods as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   agentic-context-mcp completions bash > ~/.local/share/bash-completion/completions/agentic-context-mcp
    ///   agentic-context-mcp completions zsh > ~/.zfunc/_agentic-context-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl,
}

impl Cli {
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        Ok(ServerConfig::default()
            .with_protocol_versions(self.protocol_versions.clone())
            .with_capability_flags(&self.capabilities)?)
    }

    fn handler(&self) -> anyhow::Result<ProtocolHandler> {
        let state_path = resolve_state_path(self.state.as_deref());
        let state = StateManager::open_or_memory(state_path.as_deref())?;
        Ok(ProtocolHandler::new(
            default_registry()?,
            state,
            self.server_config()?,
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.as_ref().unwrap_or(&Commands::Serve) {
        Commands::Serve => {
            let handler = cli.handler()?;
            StdioTransport::new().run(handler).await?;
        }

        Commands::ServeTcp { addr } => {
            let handler = cli.handler()?;
            TcpServer::new(handler).run(addr).await?;
        }

        #[cfg(feature = "http")]
        Commands::ServeHttp {
            addr,
            token,
            session_idle_secs,
        } => {
            use agentic_context_mcp::config::TOKEN_ENV;
            use agentic_context_mcp::transport::HttpTransport;

            // Resolve token: CLI flag > env var
            let effective_token = token.clone().or_else(|| std::env::var(TOKEN_ENV).ok());
            if effective_token.is_some() {
                tracing::info!("Auth: bearer token required");
            }

            let handler = cli.handler()?;
            HttpTransport::new(handler, effective_token)
                .with_session_idle(std::time::Duration::from_secs(*session_idle_secs))
                .run(addr)
                .await?;
        }

        Commands::Validate { path } => {
            let path = path
                .as_deref()
                .map(PathBuf::from)
                .or_else(|| resolve_state_path(cli.state.as_deref()));
            let Some(path) = path else {
                eprintln!("No state file given and none configured (use --state or a path argument).");
                std::process::exit(1);
            };
            match SnapshotReader::read_from_file(&path) {
                Ok(snapshot) => {
                    println!("Valid state file: {}", path.display());
                    println!("  Records: {}", snapshot.records.len());
                    println!("  Slots:   {}", snapshot.slots.len());
                    println!("  Created: {}", snapshot.created_at.to_rfc3339());
                    println!("  Updated: {}", snapshot.updated_at.to_rfc3339());
                }
                Err(e) => {
                    eprintln!("Invalid state file: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Info => {
            let config = cli.server_config()?;
            let tools = default_registry()?.list_tools();
            let info = serde_json::json!({
                "server": { "name": config.name, "version": config.version },
                "protocol_versions": config.protocol_versions,
                "capabilities": config.capabilities,
                "builtin_methods": RESERVED_METHODS,
                "tools": tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "tool_count": tools.len(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(
                *shell,
                &mut cmd,
                "agentic-context-mcp",
                &mut std::io::stdout(),
            );
        }

        Commands::Repl => {
            let handler = cli.handler()?;
            agentic_context_mcp::repl::run(handler)?;
        }
    }

    Ok(())
}
