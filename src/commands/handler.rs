//! Command Handler
//!
//! Every command is a plain function `fn(&CommandContext, &[Bytes]) -> Reply`
//! registered in a [`CommandTable`] under its upper-case name. The handler
//! looks the name up case-insensitively and calls the function with the
//! remaining arguments.
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO message`
//! - `SET key value [PX milliseconds]`
//! - `GET key`
//! - `CONFIG GET parameter`
//! - `KEYS *`

use crate::config::ServerConfig;
use crate::protocol::{Frame, Reply};
use crate::storage::Store;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Shared state a command may read or mutate.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub store: Arc<Store>,
    pub config: Arc<ServerConfig>,
}

/// A command implementation. Receives the arguments after the command name.
pub type CommandFn = fn(&CommandContext, &[Bytes]) -> Reply;

/// Maps upper-case command names to their implementations.
#[derive(Debug, Clone)]
pub struct CommandTable {
    commands: HashMap<&'static str, CommandFn>,
}

impl Default for CommandTable {
    fn default() -> Self {
        let mut table = Self {
            commands: HashMap::new(),
        };
        table.register("PING", cmd_ping);
        table.register("ECHO", cmd_echo);
        table.register("SET", cmd_set);
        table.register("GET", cmd_get);
        table.register("CONFIG", cmd_config);
        table.register("KEYS", cmd_keys);
        table
    }
}

impl CommandTable {
    /// Builds the table with every supported command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `func` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &'static str, func: CommandFn) {
        debug_assert!(name.bytes().all(|b| !b.is_ascii_lowercase()));
        self.commands.insert(name, func);
    }

    /// Looks a command up by name, ignoring ASCII case.
    pub fn lookup(&self, name: &[u8]) -> Option<CommandFn> {
        let name = std::str::from_utf8(name).ok()?.to_ascii_uppercase();
        self.commands.get(name.as_str()).copied()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Executes decoded frames against the store.
///
/// Cheap to clone: one is handed to every connection.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    ctx: CommandContext,
    table: Arc<CommandTable>,
}

impl CommandHandler {
    pub fn new(store: Arc<Store>, config: Arc<ServerConfig>) -> Self {
        Self {
            ctx: CommandContext { store, config },
            table: Arc::new(CommandTable::new()),
        }
    }

    /// Executes one frame.
    ///
    /// Returns `None` for an empty frame, which names no command and gets
    /// no reply. Every other frame gets exactly one reply.
    pub fn execute(&self, frame: &Frame) -> Option<Reply> {
        let (name, args) = frame.args().split_first()?;

        trace!(command = %String::from_utf8_lossy(name), args = args.len(), "Executing");

        let reply = match self.table.lookup(name) {
            Some(func) => func(&self.ctx, args),
            None => Reply::error(format!(
                "ERR unknown command '{}'",
                String::from_utf8_lossy(name)
            )),
        };
        Some(reply)
    }
}

fn wrong_arity(command: &str) -> Reply {
    Reply::error(format!(
        "ERR wrong number of arguments for '{}' command",
        command
    ))
}

/// Parses a decimal integer argument.
fn parse_integer(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

// ============================================================================
// Commands
// ============================================================================

/// PING
fn cmd_ping(_ctx: &CommandContext, _args: &[Bytes]) -> Reply {
    Reply::pong()
}

/// ECHO message
fn cmd_echo(_ctx: &CommandContext, args: &[Bytes]) -> Reply {
    match args.first() {
        Some(message) => Reply::bulk(message.clone()),
        None => wrong_arity("echo"),
    }
}

/// SET key value [PX milliseconds]
///
/// Only a fourth argument of `PX` is interpreted; anything else after the
/// value is ignored. A non-positive millisecond count stores the key
/// without expiry.
fn cmd_set(ctx: &CommandContext, args: &[Bytes]) -> Reply {
    let [key, value, options @ ..] = args else {
        return wrong_arity("set");
    };

    let mut ttl = None;
    if let Some(option) = options.first() {
        if option.eq_ignore_ascii_case(b"PX") {
            let Some(raw) = options.get(1) else {
                return Reply::error("ERR syntax error");
            };
            match parse_integer(raw) {
                Some(ms) if ms > 0 => ttl = Some(Duration::from_millis(ms as u64)),
                Some(_) => {}
                None => return Reply::error("ERR invalid expire time in 'set' command"),
            }
        }
    }

    ctx.store.write(key.clone(), value.clone(), ttl);
    Reply::ok()
}

/// GET key
fn cmd_get(ctx: &CommandContext, args: &[Bytes]) -> Reply {
    let [key] = args else {
        return wrong_arity("get");
    };

    match ctx.store.read(key) {
        Some(value) => Reply::bulk(value),
        None => Reply::null(),
    }
}

/// CONFIG GET parameter
///
/// Unknown parameters answer with an empty value.
fn cmd_config(ctx: &CommandContext, args: &[Bytes]) -> Reply {
    match args {
        [subcommand, parameter, ..] if subcommand.eq_ignore_ascii_case(b"GET") => {
            let value = ctx
                .config
                .get(&String::from_utf8_lossy(parameter))
                .unwrap_or_default();
            Reply::array(vec![
                Reply::bulk(parameter.clone()),
                Reply::bulk(Bytes::copy_from_slice(value.as_bytes())),
            ])
        }
        _ => wrong_arity("config"),
    }
}

/// KEYS pattern
///
/// Only the match-everything pattern `*` is supported.
fn cmd_keys(ctx: &CommandContext, args: &[Bytes]) -> Reply {
    let [pattern] = args else {
        return wrong_arity("keys");
    };

    if &pattern[..] != b"*" {
        return Reply::error("ERR unsupported pattern");
    }

    Reply::bulk_array(ctx.store.keys())
}
