//! Runtime for instrument-control agents.
//!
//! An agent listens on a well-known TCP port, decodes the single-line
//! messages other agents send it, runs commands from its command table and
//! replies on the same connection. Messages it originates itself, such as
//! status reports and heartbeats, go through a throttled dispatch queue so a
//! burst of reports never floods a peer.
//!
//! The crate is layered bottom-up:
//!
//! - [`contact`] owns listening ports and outbound connections.
//! - [`channel`] frames a byte stream into CR or LF terminated lines.
//! - [`queue`] serialises outbound sends with a minimum cadence.
//! - [`command`] maps verbs to handlers.
//! - [`agent`] ties them together; [`bootstrap`] builds one from
//!   configuration.

pub mod agent;
pub mod bootstrap;
pub mod channel;
pub mod command;
pub mod contact;
pub mod heartbeat;
mod lifecycle;
pub mod queue;
mod shutdown;
pub mod telemetry;

pub use agent::{Agent, AgentError, AgentHandle, ReportSink, TracingReportSink};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Runtime, StaticConfigLoader, SystemConfigLoader, bootstrap,
    bootstrap_with,
};
pub use channel::{ChannelError, Line, LineChannel};
pub use command::{
    BuiltinContext, CommandDescriptor, CommandHandler, CommandResult, CommandTable,
    CommandTableBuilder, register_builtins,
};
pub use contact::{Connection, ContactError, ContactRegistry, ListenHandle, RegistrySettings};
pub use heartbeat::{HeartbeatHandle, HeartbeatSettings};
pub use lifecycle::{LifecycleReporter, ReporterObserver, StructuredLifecycleReporter};
pub use queue::{
    Destination, DispatchObserver, DispatchQueue, QueueError, QueueState, SocketTransmitter,
    Transmit, TracingDispatchObserver, Transport,
};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
