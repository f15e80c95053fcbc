//! Commands every agent answers regardless of its instrument.
//!
//! `EXEC` requests to the queue-control verbs (`cadence <ms>` and `abort`)
//! run without a reply; `REQ` requests get a `DONE` reply describing the
//! new state.

use std::time::Duration;

use imp_wire::{MessageType, NodeName};

use super::{CommandResult, CommandTableBuilder};
use crate::queue::{DispatchQueue, QueueState};

/// State the built-in commands report on and control.
#[derive(Debug, Clone)]
pub struct BuiltinContext {
    /// Name of the agent answering.
    pub node: NodeName,
    /// The agent's outbound queue.
    pub queue: DispatchQueue,
}

/// Registers `help`, `ping`, `version`, `echo`, `cadence`, `abort` and
/// `queue` on `builder`.
#[must_use]
pub fn register_builtins(
    builder: CommandTableBuilder,
    context: &BuiltinContext,
) -> CommandTableBuilder {
    let node = context.node.clone();
    let cadence_queue = context.queue.clone();
    let abort_queue = context.queue.clone();
    let status_queue = context.queue.clone();

    builder
        .register_help("help", "help [verb]", "list commands or describe one")
        .register(
            "ping",
            move |_args: &str, _kind: MessageType| CommandResult::ok(format!("pong node={node}")),
            "ping",
            "check that the agent is answering",
        )
        .register(
            "version",
            |_args: &str, _kind: MessageType| {
                CommandResult::ok(concat!("version=", env!("CARGO_PKG_VERSION")))
            },
            "version",
            "report the agent software version",
        )
        .register("echo", echo, "echo <text>", "reply with the given text")
        .register(
            "cadence",
            move |args: &str, kind: MessageType| cadence(&cadence_queue, args, kind),
            "cadence [ms]",
            "show or set the minimum spacing between outbound sends",
        )
        .register(
            "abort",
            move |_args: &str, kind: MessageType| {
                let discarded = abort_queue.abort();
                quiet_on_exec(kind, format!("discarded={discarded}"))
            },
            "abort",
            "discard every pending outbound message",
        )
        .register(
            "queue",
            move |_args: &str, _kind: MessageType| queue_status(&status_queue),
            "queue",
            "report outbound queue length and state",
        )
}

fn echo(args: &str, _kind: MessageType) -> CommandResult {
    if args.is_empty() {
        CommandResult::error("echo requires text")
    } else {
        CommandResult::ok(args)
    }
}

fn cadence(queue: &DispatchQueue, args: &str, kind: MessageType) -> CommandResult {
    if args.is_empty() {
        return CommandResult::ok(format!("cadence_ms={}", queue.cadence().as_millis()));
    }
    match args.parse::<u64>() {
        Ok(millis) => {
            queue.set_cadence(Duration::from_millis(millis));
            quiet_on_exec(kind, format!("cadence_ms={millis}"))
        }
        Err(_) => CommandResult::error(format!("invalid cadence '{args}': expected milliseconds")),
    }
}

fn queue_status(queue: &DispatchQueue) -> CommandResult {
    let state = match queue.state() {
        QueueState::Idle => "idle",
        QueueState::Draining => "draining",
    };
    CommandResult::ok(format!(
        "pending={} state={state} cadence_ms={}",
        queue.len(),
        queue.cadence().as_millis()
    ))
}

fn quiet_on_exec(kind: MessageType, reply: String) -> CommandResult {
    if kind == MessageType::Exec {
        CommandResult::Noop
    } else {
        CommandResult::Ok(reply)
    }
}
