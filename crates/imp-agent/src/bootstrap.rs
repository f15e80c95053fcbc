//! Agent bootstrap orchestration.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use ortho_config::{OrthoConfig as _, OrthoError};
use thiserror::Error;

use imp_config::Config;
use imp_wire::{MessageError, NodeName};

use crate::agent::{Agent, AgentError, AgentHandle};
use crate::command::{BuiltinContext, CommandTable, CommandTableBuilder, register_builtins};
use crate::contact::{ContactError, ContactRegistry};
use crate::heartbeat::{HeartbeatHandle, HeartbeatSettings};
use crate::lifecycle::{LifecycleReporter, ReporterObserver};
use crate::queue::{Destination, DispatchQueue, SocketTransmitter};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the agent configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that always returns the configuration it was built with.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// A configured node name is not a valid address.
    #[error("invalid {role} node name: {source}")]
    NodeName {
        /// Which setting held the name.
        role: &'static str,
        /// Validation failure.
        #[source]
        source: MessageError,
    },
    /// The listen socket names a transport agents cannot accept on.
    #[error("agents accept commands over TCP only, not {endpoint}")]
    UnsupportedListenTransport {
        /// Configured endpoint.
        endpoint: String,
    },
    /// The listen host could not be resolved.
    #[error("failed to resolve listen host: {source}")]
    Contact {
        /// Underlying resolution error.
        #[source]
        source: ContactError,
    },
    /// The agent could not start listening.
    #[error("failed to start agent: {source}")]
    Start {
        /// Underlying agent error.
        #[source]
        source: AgentError,
    },
    /// The heartbeat thread could not start.
    #[error("failed to start heartbeat: {source}")]
    Heartbeat {
        /// Underlying spawn error.
        #[source]
        source: io::Error,
    },
}

/// A running agent process: listener, queue and optional heartbeat.
pub struct Runtime {
    config: Config,
    agent: AgentHandle,
    heartbeat: Option<HeartbeatHandle>,
    telemetry: TelemetryHandle,
}

impl Runtime {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// The running agent.
    #[must_use]
    pub fn agent(&self) -> &Agent {
        self.agent.agent()
    }

    /// Address the agent accepts connections on.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.agent.local_addr()
    }

    /// Returns `true` when heartbeats are being sent.
    #[must_use]
    pub fn heartbeat_enabled(&self) -> bool {
        self.heartbeat.is_some()
    }

    /// Stops the heartbeat and the agent, then waits for the accept thread.
    ///
    /// Entries already queued are left to the dispatch worker.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ThreadPanic`] when the accept thread panicked.
    pub fn shutdown(self) -> Result<(), AgentError> {
        if let Some(heartbeat) = self.heartbeat {
            let _beats = heartbeat.stop();
        }
        self.agent.join()
    }
}

/// Bootstraps an agent that answers only the built-in commands.
///
/// # Errors
///
/// As [`bootstrap_with`].
pub fn bootstrap(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn LifecycleReporter>,
) -> Result<Runtime, BootstrapError> {
    bootstrap_with(loader, reporter, |commands| commands)
}

/// Bootstraps an agent using the supplied collaborators.
///
/// `commands` receives a builder that already holds the built-in commands
/// and adds the instrument's own.
///
/// # Errors
///
/// Returns a [`BootstrapError`] naming the first step that failed. The
/// reporter is told about the failure before it is returned.
pub fn bootstrap_with<F>(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn LifecycleReporter>,
    commands: F,
) -> Result<Runtime, BootstrapError>
where
    F: FnOnce(CommandTableBuilder) -> CommandTableBuilder,
{
    reporter.bootstrap_starting();
    match start(loader, &reporter, commands) {
        Ok(runtime) => {
            reporter.bootstrap_succeeded(&runtime.config);
            Ok(runtime)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn start<F>(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn LifecycleReporter>,
    commands: F,
) -> Result<Runtime, BootstrapError>
where
    F: FnOnce(CommandTableBuilder) -> CommandTableBuilder,
{
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;

    let node = node_name("agent", config.node_name())?;
    let status_node = node_name("status", config.status_node())?;
    if config.listen_socket().is_datagram() {
        return Err(BootstrapError::UnsupportedListenTransport {
            endpoint: config.listen_socket().to_string(),
        });
    }

    let registry = Arc::new(
        ContactRegistry::from_config(&config)
            .map_err(|source| BootstrapError::Contact { source })?,
    );
    let queue = DispatchQueue::new(
        node.as_str(),
        config.dispatch_cadence(),
        Arc::new(SocketTransmitter::new(Arc::clone(&registry))),
        Arc::new(ReporterObserver::new(Arc::clone(reporter))),
    );
    let context = BuiltinContext {
        node: node.clone(),
        queue: queue.clone(),
    };
    let table = commands(register_builtins(CommandTable::builder(), &context)).build();

    let agent = Agent::new(node.clone(), table, registry, queue.clone())
        .with_reporter(Arc::clone(reporter))
        .with_max_line_bytes(config.max_line_bytes());
    let agent = agent
        .start(config.listen_socket().port())
        .map_err(|source| BootstrapError::Start { source })?;

    let heartbeat = match (config.heartbeat_interval(), config.status_socket()) {
        (Some(interval), Some(endpoint)) => {
            let settings = HeartbeatSettings {
                from: node,
                to: status_node,
                destination: Destination::from(endpoint),
                interval,
            };
            Some(
                HeartbeatHandle::start(settings, queue)
                    .map_err(|source| BootstrapError::Heartbeat { source })?,
            )
        }
        _ => None,
    };

    Ok(Runtime {
        config,
        agent,
        heartbeat,
        telemetry,
    })
}

fn node_name(role: &'static str, name: &str) -> Result<NodeName, BootstrapError> {
    NodeName::new(name).map_err(|source| BootstrapError::NodeName { role, source })
}
