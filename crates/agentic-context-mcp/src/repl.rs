//! Interactive REPL over an in-process session.
//!
//! Launch with `agentic-context-mcp repl`. Type `/help` for available
//! commands, Tab for completion.

use std::sync::Arc;

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};
use serde_json::{json, Map, Value};

use crate::protocol::ProtocolHandler;
use crate::session::Session;
use crate::tools::registry::RESERVED_METHODS;
use crate::types::{JsonRpcRequest, RequestId, Response};

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/init", "Initialize the session (optional protocol version)"),
    ("/call", "Call a method: /call <method> [json params]"),
    ("/tools", "List registered methods"),
    ("/stats", "Show store statistics"),
    ("/session", "Show session state and negotiated capabilities"),
    ("/save", "Write the state snapshot now"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
struct ContextHelper {
    methods: Vec<String>,
}

impl Completer for ContextHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        // Method name completion after /call
        if let Some(args) = input.strip_prefix("/call ") {
            if !args.contains(' ') {
                let prefix_start = input.len() - args.len();
                let matches: Vec<Pair> = self
                    .methods
                    .iter()
                    .filter(|m| m.starts_with(args))
                    .map(|m| Pair {
                        display: m.clone(),
                        replacement: format!("{m} "),
                    })
                    .collect();
                return Ok((prefix_start, matches));
            }
        }

        Ok((pos, Vec::new()))
    }
}

impl Hinter for ContextHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for ContextHelper {}
impl Validator for ContextHelper {}
impl Helper for ContextHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Session state.
struct ReplState {
    handler: ProtocolHandler,
    session: Arc<Session>,
    next_id: i64,
}

impl ReplState {
    /// Dispatch on the surrounding tokio runtime from this blocking loop.
    fn request(&mut self, method: &str, params: Map<String, Value>) -> Response {
        self.next_id += 1;
        let request = JsonRpcRequest::new(RequestId::Number(self.next_id), method, params);
        let handler = &self.handler;
        let session = &self.session;
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(handler.dispatch(session, request))
        })
    }
}

/// Run the interactive REPL. Must be called from a multi-threaded runtime.
pub fn run(handler: ProtocolHandler) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1magentic-context-mcp v{}\x1b[0m \x1b[90m\u{2014} Shared Context for AI Agents\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let methods = handler
        .registry()
        .method_names()
        .into_iter()
        .map(String::from)
        .chain(
            RESERVED_METHODS
                .iter()
                .filter(|m| **m != "initialize")
                .map(|m| m.to_string()),
        )
        .collect();

    let mut rl: Editor<ContextHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(ContextHelper { methods }));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".agentic_context_mcp_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let session = handler.new_session();
    let mut state = ReplState {
        handler,
        session,
        next_id: 0,
    };
    let prompt = " \x1b[36mcontext>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let mut parts = input.splitn(2, ' ');
                let cmd = parts.next().unwrap_or("");
                let args = parts.next().unwrap_or("").trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "init" => cmd_init(args, &mut state),
                    "call" => cmd_call(args, &mut state),
                    "tools" => cmd_tools(&state),
                    "stats" => cmd_stats(&state),
                    "session" => cmd_session(&state),
                    "save" => cmd_save(&state),
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(&hist_path);
    if let Err(e) = state.handler.state().save() {
        eprintln!("  Failed to save state: {e}");
    }

    Ok(())
}

fn print_response(response: &Response) {
    match response {
        Response::Success(ok) => {
            let pretty = serde_json::to_string_pretty(&ok.result).unwrap_or_default();
            for line in pretty.lines() {
                eprintln!("  {line}");
            }
        }
        Response::Error(err) => {
            eprintln!(
                "  \x1b[31merror {}\x1b[0m: {}",
                err.error.code, err.error.message
            );
            if let Some(data) = &err.error.data {
                eprintln!("    {data}");
            }
        }
    }
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completes commands and, after /call, method names.");
    eprintln!();
}

fn cmd_init(args: &str, state: &mut ReplState) {
    let versions: Vec<String> = if args.is_empty() {
        state.handler.config().protocol_versions.clone()
    } else {
        args.split_whitespace().map(String::from).collect()
    };
    let capabilities: Map<String, Value> = state
        .handler
        .config()
        .capabilities
        .keys()
        .map(|name| (name.clone(), Value::Bool(true)))
        .collect();
    let params = json!({
        "protocolVersions": versions,
        "capabilities": capabilities,
        "clientInfo": { "name": "repl", "version": env!("CARGO_PKG_VERSION") },
    });
    let params = match params {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let response = state.request("initialize", params);
    print_response(&response);

    if state.session.is_closed() {
        eprintln!("  Session closed. Starting a fresh one; run /init again.");
        state.session = state.handler.new_session();
    }
}

fn cmd_call(args: &str, state: &mut ReplState) {
    let mut parts = args.splitn(2, ' ');
    let method = parts.next().unwrap_or("");
    if method.is_empty() {
        eprintln!("  Usage: /call <method> [json params]");
        return;
    }

    let params = match parts.next().map(str::trim).filter(|s| !s.is_empty()) {
        None => Map::new(),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                eprintln!("  Params must be a JSON object.");
                return;
            }
            Err(e) => {
                eprintln!("  Invalid JSON: {e}");
                return;
            }
        },
    };

    let response = state.request(method, params);
    print_response(&response);
}

fn cmd_tools(state: &ReplState) {
    let tools = state.handler.registry().list_tools();
    eprintln!();
    eprintln!("  {} methods registered:", tools.len());
    eprintln!();
    for tool in &tools {
        eprintln!(
            "    {:<20} {}",
            tool.name,
            tool.description.as_deref().unwrap_or("")
        );
    }
    eprintln!();
}

fn cmd_stats(state: &ReplState) {
    let stats = state.handler.store().stats();
    eprintln!();
    match state.handler.state().file_path() {
        Some(path) => eprintln!("  State file: {}", path.display()),
        None => eprintln!("  State file: (in memory)"),
    }
    eprintln!("    Records: {}", stats.records);
    for (kind, count) in &stats.by_kind {
        eprintln!("      {kind:<10} {count}");
    }
    eprintln!("    Slots:   {}", stats.slots);
    eprintln!();
}

fn cmd_session(state: &ReplState) {
    let session = &state.session;
    eprintln!();
    eprintln!("  Session {}", session.id());
    eprintln!("    State:   {}", session.state());
    if let Some(negotiated) = session.negotiated() {
        eprintln!("    Version: {}", negotiated.version);
        for (name, on) in &negotiated.capabilities {
            eprintln!("      {name:<12} {on}");
        }
    }
    eprintln!();
}

fn cmd_save(state: &ReplState) {
    let manager = state.handler.state();
    if manager.file_path().is_none() {
        eprintln!("  No state file configured (use --state).");
        return;
    }
    manager.mark_dirty();
    match manager.save() {
        Ok(()) => eprintln!("  Saved."),
        Err(e) => eprintln!("  Save failed: {e}"),
    }
}
