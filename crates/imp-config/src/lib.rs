//! Layered configuration for instrument agents and the operator CLI.
//!
//! Values resolve with the usual precedence: built-in defaults, then a
//! configuration file, then `IMP_*` environment variables, then command-line
//! flags. Every field carries a default so an agent can start with no
//! configuration at all.

use std::time::Duration;

pub use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod socket;

pub use defaults::{
    DEFAULT_DISPATCH_CADENCE_MS, DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_LISTEN_BACKLOG,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_LINE_BYTES, DEFAULT_NODE_NAME, DEFAULT_REGISTRY_CAPACITY,
    DEFAULT_STATUS_NODE, DEFAULT_TCP_PORT, default_dispatch_cadence_ms,
    default_heartbeat_interval_ms, default_listen_backlog, default_listen_socket,
    default_log_filter, default_log_filter_string, default_log_format, default_max_line_bytes,
    default_node_name, default_registry_capacity, default_status_node,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError};

/// Resolved configuration for a single agent process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "IMP")]
pub struct Config {
    /// Name this agent answers to in message destinations.
    #[ortho_config(default = default_node_name())]
    pub node_name: String,
    /// Endpoint the agent accepts inbound connections on.
    #[ortho_config(default = default_listen_socket())]
    pub listen_socket: SocketEndpoint,
    /// Pending-connection backlog requested from the operating system.
    #[ortho_config(default = default_listen_backlog())]
    pub listen_backlog: u32,
    /// Maximum number of ports the contact registry holds open at once.
    #[ortho_config(default = default_registry_capacity())]
    pub registry_capacity: usize,
    /// Minimum spacing between outbound sends, in milliseconds.
    #[ortho_config(default = default_dispatch_cadence_ms())]
    pub dispatch_cadence_ms: u64,
    /// Longest inbound line accepted before truncation, in bytes.
    #[ortho_config(default = default_max_line_bytes())]
    pub max_line_bytes: usize,
    /// Heartbeat period in milliseconds; zero disables it.
    #[ortho_config(default = default_heartbeat_interval_ms())]
    pub heartbeat_interval_ms: u64,
    /// Node that receives heartbeats and published status.
    #[ortho_config(default = default_status_node())]
    pub status_node: String,
    /// Endpoint of the status node; heartbeats are only sent when set.
    pub status_socket: Option<SocketEndpoint>,
    /// Filter expression handed to the tracing subscriber.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            listen_socket: default_listen_socket(),
            listen_backlog: default_listen_backlog(),
            registry_capacity: default_registry_capacity(),
            dispatch_cadence_ms: default_dispatch_cadence_ms(),
            max_line_bytes: default_max_line_bytes(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            status_node: default_status_node(),
            status_socket: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Node name this agent answers to.
    #[must_use]
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Listening endpoint.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Pending-connection backlog.
    #[must_use]
    pub fn listen_backlog(&self) -> u32 {
        self.listen_backlog
    }

    /// Contact registry capacity.
    #[must_use]
    pub fn registry_capacity(&self) -> usize {
        self.registry_capacity
    }

    /// Minimum spacing between outbound sends.
    #[must_use]
    pub fn dispatch_cadence(&self) -> Duration {
        Duration::from_millis(self.dispatch_cadence_ms)
    }

    /// Longest accepted inbound line, in bytes.
    #[must_use]
    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Heartbeat period, or `None` when the heartbeat is disabled.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }

    /// Node that receives heartbeats and published status.
    #[must_use]
    pub fn status_node(&self) -> &str {
        &self.status_node
    }

    /// Endpoint of the status node, when configured.
    #[must_use]
    pub fn status_socket(&self) -> Option<&SocketEndpoint> {
        self.status_socket.as_ref()
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_usable_agent() {
        let config = Config::default();
        assert_eq!(config.node_name(), DEFAULT_NODE_NAME);
        assert_eq!(config.listen_socket().port(), DEFAULT_TCP_PORT);
        assert_eq!(
            config.dispatch_cadence(),
            Duration::from_millis(DEFAULT_DISPATCH_CADENCE_MS)
        );
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.status_socket(), None);
    }

    #[test]
    fn zero_heartbeat_interval_disables_heartbeat() {
        let mut config = Config::default();
        assert_eq!(config.heartbeat_interval(), None);
        config.heartbeat_interval_ms = 2_500;
        assert_eq!(
            config.heartbeat_interval(),
            Some(Duration::from_millis(2_500))
        );
    }
}
