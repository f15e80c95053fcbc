//! Inbound message handling for one agent.
//!
//! An [`Agent`] ties the pieces together: it listens on its well-known port
//! through the [`ContactRegistry`], serves every accepted connection on its
//! own thread with a [`LineChannel`], decodes each line, runs commands
//! through its [`CommandTable`] one at a time, and writes the reply back on
//! the same connection. Outbound traffic that is not a reply goes through the
//! agent's [`DispatchQueue`].

mod report;
mod sessions;

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use imp_wire::{Message, MessageError, MessageType, NodeName, decode_bytes, encode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::channel::{ChannelError, LineChannel};
use crate::command::CommandTable;
use crate::contact::{Connection, ContactError, ContactRegistry, ListenHandle};
use crate::lifecycle::{LifecycleReporter, StructuredLifecycleReporter};
use crate::queue::{Destination, DispatchQueue, QueueError};

pub use self::report::{ReportSink, TracingReportSink};
use self::sessions::Sessions;

const AGENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::agent");
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors raised while starting an agent or publishing from it.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The well-known port could not be opened.
    #[error("failed to open agent port: {source}")]
    Listen {
        #[source]
        source: ContactError,
    },
    /// A worker thread could not be started.
    #[error("failed to start {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("accept thread panicked")]
    ThreadPanic,
    /// An outbound message was invalid.
    #[error("invalid outbound message: {source}")]
    Message {
        #[source]
        source: MessageError,
    },
    /// An outbound message could not be queued.
    #[error("failed to queue outbound message: {source}")]
    Queue {
        #[source]
        source: QueueError,
    },
}

/// One instrument agent: a node name, a command table and the sockets and
/// queue it talks through.
pub struct Agent {
    node: NodeName,
    table: CommandTable,
    registry: Arc<ContactRegistry>,
    queue: DispatchQueue,
    reports: Arc<dyn ReportSink>,
    reporter: Arc<dyn LifecycleReporter>,
    max_line_bytes: usize,
    command_lock: Mutex<()>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Agent")
            .field("node", &self.node)
            .field("table", &self.table)
            .field("max_line_bytes", &self.max_line_bytes)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Assembles an agent. Reports are logged and lifecycle events traced
    /// until other sinks are supplied.
    #[must_use]
    pub fn new(
        node: NodeName,
        table: CommandTable,
        registry: Arc<ContactRegistry>,
        queue: DispatchQueue,
    ) -> Self {
        Self {
            node,
            table,
            registry,
            queue,
            reports: Arc::new(TracingReportSink),
            reporter: Arc::new(StructuredLifecycleReporter),
            max_line_bytes: imp_config::DEFAULT_MAX_LINE_BYTES,
            command_lock: Mutex::new(()),
        }
    }

    /// Replaces the consumer of inbound reports.
    #[must_use]
    pub fn with_report_sink(mut self, reports: Arc<dyn ReportSink>) -> Self {
        self.reports = reports;
        self
    }

    /// Replaces the lifecycle reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn LifecycleReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Sets the longest inbound line accepted before truncation.
    #[must_use]
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Name this agent answers to.
    #[must_use]
    pub fn node(&self) -> &NodeName {
        &self.node
    }

    /// The agent's command table.
    #[must_use]
    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// The agent's outbound queue.
    #[must_use]
    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Handles one received line and returns the reply to send, if any.
    ///
    /// Malformed lines are logged and dropped. Commands addressed to another
    /// node are answered with `ERROR`; reports addressed elsewhere are
    /// dropped. Reports for this node go to the report sink. Commands run
    /// under the agent's command lock, so at most one executes at a time.
    pub fn handle_line(&self, raw: &[u8]) -> Option<Message> {
        let message = match decode_bytes(raw) {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    target: AGENT_TARGET,
                    node = %self.node,
                    error = %error,
                    "discarding malformed line"
                );
                return None;
            }
        };

        if !message.destination().matches(&self.node) {
            warn!(
                target: AGENT_TARGET,
                node = %self.node,
                source = %message.source(),
                destination = %message.destination(),
                "message addressed to another node"
            );
            if message.kind().is_report() {
                return None;
            }
            let reason = format!(
                "message for {} delivered to {}",
                message.destination(),
                self.node
            );
            return self.reply_to(&message, MessageType::Error, &reason);
        }

        if message.kind().is_report() {
            self.reports.receive(&message);
            return None;
        }

        let result = {
            let _guard = self
                .command_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.table.dispatch(message.body(), message.kind())
        };
        let (kind, text) = result.reply()?;
        self.reply_to(&message, kind, text)
    }

    /// Serves one connection until the peer closes it.
    ///
    /// Lines cut short by the line limit are never dispatched. A command
    /// whose header survived the cut is answered with `ERROR`; anything else
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] when reading or replying fails; the peer is
    /// then treated as disconnected.
    pub fn serve<S: Read + Write>(&self, stream: S) -> Result<(), ChannelError> {
        let mut channel = LineChannel::new(stream, self.max_line_bytes);
        while let Some(line) = channel.read_line()? {
            let reply = if line.is_truncated() {
                self.reject_oversized(line.bytes())
            } else {
                self.handle_line(line.bytes())
            };
            if let Some(reply) = reply {
                channel.write_line(&encode(&reply))?;
            }
        }
        Ok(())
    }

    /// Queues a message from this agent to node `to` at `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Message`] for an invalid body and
    /// [`AgentError::Queue`] when the dispatch worker cannot start.
    pub fn publish(
        &self,
        to: &NodeName,
        destination: Destination,
        kind: MessageType,
        body: &str,
    ) -> Result<(), AgentError> {
        let message = Message::new(self.node.clone(), to.clone(), kind, body)
            .map_err(|source| AgentError::Message { source })?;
        self.queue
            .enqueue_message(destination, &message)
            .map_err(|source| AgentError::Queue { source })
    }

    /// Opens `port` through the registry and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Listen`] when the port cannot be opened and
    /// [`AgentError::Spawn`] when the accept thread cannot start.
    pub fn start(self, port: u16) -> Result<AgentHandle, AgentError> {
        let listen = self
            .registry
            .listen_on(port)
            .map_err(|source| AgentError::Listen { source })?;
        self.reporter.listener_bound(&self.node, listen.local_addr());

        let agent = Arc::new(self);
        let shutdown = Arc::new(AtomicBool::new(false));
        let sessions = Arc::new(Sessions::default());
        let thread = {
            let agent = Arc::clone(&agent);
            let listen = listen.clone();
            let shutdown = Arc::clone(&shutdown);
            let sessions = Arc::clone(&sessions);
            thread::Builder::new()
                .name(format!("accept-{}", agent.node))
                .spawn(move || run_accept_loop(&agent, &listen, &shutdown, &sessions))
                .map_err(|source| AgentError::Spawn {
                    role: "accept",
                    source,
                })?
        };

        Ok(AgentHandle {
            agent,
            listen,
            shutdown,
            sessions,
            thread: Some(thread),
        })
    }

    fn reject_oversized(&self, prefix: &[u8]) -> Option<Message> {
        let message = decode_bytes(prefix).ok();
        warn!(
            target: AGENT_TARGET,
            node = %self.node,
            limit = self.max_line_bytes,
            source = ?message.as_ref().map(Message::source),
            "discarding oversized line"
        );
        let message = message?;
        if message.kind().is_report() || !message.destination().matches(&self.node) {
            return None;
        }
        let reason = format!("line exceeds {} bytes", self.max_line_bytes);
        self.reply_to(&message, MessageType::Error, &reason)
    }

    fn reply_to(&self, request: &Message, kind: MessageType, text: &str) -> Option<Message> {
        let flattened = text.replace(['\r', '\n'], " ");
        let body = match flattened.trim() {
            "" if kind == MessageType::Error => "failed",
            "" => "ok",
            trimmed => trimmed,
        };
        match Message::new(self.node.clone(), request.source().clone(), kind, body) {
            Ok(reply) => Some(reply),
            Err(error) => {
                warn!(
                    target: AGENT_TARGET,
                    node = %self.node,
                    error = %error,
                    "reply could not be built"
                );
                None
            }
        }
    }
}

/// Handle to a running agent's accept thread.
///
/// Dropping the handle stops accepting new connections.
pub struct AgentHandle {
    agent: Arc<Agent>,
    listen: ListenHandle,
    shutdown: Arc<AtomicBool>,
    sessions: Arc<Sessions>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AgentHandle {
    /// The running agent.
    #[must_use]
    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Address the agent accepts connections on.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.listen.local_addr()
    }

    /// Number of connections currently being served.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Stops accepting and closes every open connection.
    ///
    /// The listening port stays registered for the life of the process.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        wake_acceptor(self.listen.local_addr());
        self.sessions.close_all();
    }

    /// Stops the agent and waits for the accept thread to finish.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ThreadPanic`] when the accept thread panicked.
    pub fn join(mut self) -> Result<(), AgentError> {
        self.shutdown();
        match self.thread.take() {
            Some(handle) => handle.join().map_err(|_| AgentError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_accept_loop(
    agent: &Arc<Agent>,
    listen: &ListenHandle,
    shutdown: &AtomicBool,
    sessions: &Arc<Sessions>,
) {
    debug!(
        target: AGENT_TARGET,
        node = %agent.node,
        port = listen.port(),
        "accept loop active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match agent.registry.accept_next(listen) {
            Ok(connection) => {
                last_error = None;
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                spawn_session(agent, connection, sessions);
            }
            Err(error) => {
                let kind = match &error {
                    ContactError::Accept { source, .. } => Some(source.kind()),
                    _ => None,
                };
                if kind.is_none() || last_error != kind {
                    warn!(
                        target: AGENT_TARGET,
                        node = %agent.node,
                        error = %error,
                        "accept failed"
                    );
                }
                last_error = kind;
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    debug!(target: AGENT_TARGET, node = %agent.node, "accept loop stopped");
}

fn spawn_session(agent: &Arc<Agent>, connection: Connection, sessions: &Arc<Sessions>) {
    let peer = connection.peer();
    let id = sessions.track(&connection);
    agent.reporter.peer_connected(peer);

    let session_agent = Arc::clone(agent);
    let session_registry = Arc::clone(sessions);
    let spawned = thread::Builder::new()
        .name(format!("session-{peer}"))
        .spawn(move || {
            let outcome = session_agent.serve(connection);
            session_registry.forget(id);
            session_agent
                .reporter
                .peer_disconnected(peer, outcome.as_ref().err());
        });
    if let Err(error) = spawned {
        sessions.forget(id);
        warn!(
            target: AGENT_TARGET,
            peer = %peer,
            error = %error,
            "failed to start session thread"
        );
    }
}

fn wake_acceptor(addr: SocketAddr) {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    if let Err(error) = TcpStream::connect_timeout(&SocketAddr::new(ip, addr.port()), WAKE_TIMEOUT)
    {
        debug!(
            target: AGENT_TARGET,
            error = %error,
            "could not wake accept loop"
        );
    }
}
