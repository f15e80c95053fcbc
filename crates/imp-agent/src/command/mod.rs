//! Verb-keyed command tables.
//!
//! A table is assembled once with [`CommandTableBuilder`] and is read-only
//! afterwards, so lookups need no locking. Verbs match without regard to
//! ASCII case. Registering a verb twice is allowed; the first registration
//! wins, which lets agents list aliases after their primary spelling.

mod builtins;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use imp_wire::MessageType;
use tracing::debug;

pub use self::builtins::{BuiltinContext, register_builtins};

const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::command");

/// Outcome of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// The command succeeded; the text is sent back as a `DONE` reply.
    Ok(String),
    /// The command succeeded and needs no reply.
    Noop,
    /// The command failed; the text is sent back as an `ERROR` reply.
    Error(String),
}

impl CommandResult {
    /// Successful result with reply text.
    pub fn ok(reply: impl Into<String>) -> Self {
        Self::Ok(reply.into())
    }

    /// Failed result with a human-readable reason.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error(reason.into())
    }

    /// Reply type and text to send, if any.
    #[must_use]
    pub fn reply(&self) -> Option<(MessageType, &str)> {
        match self {
            Self::Ok(text) => Some((MessageType::Done, text.as_str())),
            Self::Noop => None,
            Self::Error(text) => Some((MessageType::Error, text.as_str())),
        }
    }
}

/// Executes one command verb.
///
/// Handlers signal failure through [`CommandResult::Error`]; they must not
/// panic.
pub trait CommandHandler: Send + Sync {
    /// Runs the command with its argument string and the request type.
    fn execute(&self, args: &str, kind: MessageType) -> CommandResult;
}

impl<F> CommandHandler for F
where
    F: Fn(&str, MessageType) -> CommandResult + Send + Sync,
{
    fn execute(&self, args: &str, kind: MessageType) -> CommandResult {
        self(args, kind)
    }
}

#[derive(Clone)]
enum CommandAction {
    Handler(Arc<dyn CommandHandler>),
    Help,
}

/// One row of a command table.
#[derive(Clone)]
pub struct CommandDescriptor {
    verb: String,
    usage: String,
    description: String,
    action: CommandAction,
}

impl CommandDescriptor {
    /// Verb as registered.
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Usage synopsis, e.g. `cadence [ms]`.
    #[must_use]
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// One-line description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandDescriptor")
            .field("verb", &self.verb)
            .field("usage", &self.usage)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Collects command registrations at startup.
#[derive(Debug, Default)]
pub struct CommandTableBuilder {
    rows: Vec<CommandDescriptor>,
}

impl CommandTableBuilder {
    /// Starts an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `verb`.
    #[must_use]
    pub fn register(
        self,
        verb: impl Into<String>,
        handler: impl CommandHandler + 'static,
        usage: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.push(
            verb.into(),
            usage.into(),
            description.into(),
            CommandAction::Handler(Arc::new(handler)),
        )
    }

    /// Registers a verb that lists the table's own usage and descriptions.
    ///
    /// With no argument the reply names every verb; with a verb argument it
    /// describes that command.
    #[must_use]
    pub fn register_help(
        self,
        verb: impl Into<String>,
        usage: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.push(
            verb.into(),
            usage.into(),
            description.into(),
            CommandAction::Help,
        )
    }

    /// Freezes the registrations into a table.
    #[must_use]
    pub fn build(self) -> CommandTable {
        let mut index = HashMap::with_capacity(self.rows.len());
        for (position, row) in self.rows.iter().enumerate() {
            index.entry(row.verb.to_ascii_lowercase()).or_insert(position);
        }
        CommandTable {
            rows: self.rows,
            index,
        }
    }

    fn push(
        mut self,
        verb: String,
        usage: String,
        description: String,
        action: CommandAction,
    ) -> Self {
        self.rows.push(CommandDescriptor {
            verb,
            usage,
            description,
            action,
        });
        self
    }
}

/// Immutable verb-to-handler lookup.
#[derive(Debug, Clone)]
pub struct CommandTable {
    rows: Vec<CommandDescriptor>,
    index: HashMap<String, usize>,
}

impl CommandTable {
    /// Starts building a table.
    #[must_use]
    pub fn builder() -> CommandTableBuilder {
        CommandTableBuilder::new()
    }

    /// Finds the descriptor `verb` resolves to.
    #[must_use]
    pub fn lookup(&self, verb: &str) -> Option<&CommandDescriptor> {
        self.index
            .get(&verb.to_ascii_lowercase())
            .and_then(|position| self.rows.get(*position))
    }

    /// Every registration in registration order, aliases included.
    pub fn descriptors(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.rows.iter()
    }

    /// Number of registrations, aliases included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Splits `raw_body` into a verb and arguments and runs the matching
    /// handler.
    ///
    /// An empty body or an unknown verb yields [`CommandResult::Error`]
    /// naming the problem. Otherwise the handler's result is returned as is.
    #[must_use]
    pub fn dispatch(&self, raw_body: &str, kind: MessageType) -> CommandResult {
        let body = raw_body.trim();
        let (verb, args) = body
            .split_once(char::is_whitespace)
            .map_or((body, ""), |(verb, args)| (verb, args.trim()));
        if verb.is_empty() {
            return CommandResult::error("empty command");
        }

        let Some(descriptor) = self.lookup(verb) else {
            debug!(target: COMMAND_TARGET, verb, "unknown command");
            return CommandResult::error(format!("unknown command '{verb}'"));
        };
        debug!(
            target: COMMAND_TARGET,
            verb = %descriptor.verb,
            kind = %kind,
            "dispatching command"
        );
        match &descriptor.action {
            CommandAction::Handler(handler) => handler.execute(args, kind),
            CommandAction::Help => self.help(args),
        }
    }

    fn help(&self, args: &str) -> CommandResult {
        if args.is_empty() {
            let verbs: Vec<&str> = self.rows.iter().map(|row| row.verb.as_str()).collect();
            return CommandResult::ok(format!("commands: {}", verbs.join(" ")));
        }
        match self.lookup(args) {
            Some(row) => CommandResult::ok(format!("usage: {} - {}", row.usage, row.description)),
            None => CommandResult::error(format!("unknown command '{args}'")),
        }
    }
}
