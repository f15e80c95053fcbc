use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Well-known TCP port an agent listens on when nothing else is configured.
pub const DEFAULT_TCP_PORT: u16 = 9779;

/// Node name adopted by an agent that has not been given one.
pub const DEFAULT_NODE_NAME: &str = "AGENT";

/// Pending-connection backlog requested for listening sockets.
pub const DEFAULT_LISTEN_BACKLOG: u32 = 128;

/// Number of distinct ports the contact registry will hold open.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 64;

/// Minimum spacing between consecutive outbound sends, in milliseconds.
pub const DEFAULT_DISPATCH_CADENCE_MS: u64 = 100;

/// Longest inbound line accepted before truncation, in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 4096;

/// Heartbeat period in milliseconds; zero disables the heartbeat.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 0;

/// Node that receives heartbeats when nothing else is configured.
pub const DEFAULT_STATUS_NODE: &str = "OPS";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default node name as an owned value.
pub fn default_node_name() -> String {
    DEFAULT_NODE_NAME.to_string()
}

/// Default listening endpoint for an agent.
pub fn default_listen_socket() -> SocketEndpoint {
    SocketEndpoint::tcp("0.0.0.0", DEFAULT_TCP_PORT)
}

pub fn default_listen_backlog() -> u32 {
    DEFAULT_LISTEN_BACKLOG
}

pub fn default_registry_capacity() -> usize {
    DEFAULT_REGISTRY_CAPACITY
}

pub fn default_dispatch_cadence_ms() -> u64 {
    DEFAULT_DISPATCH_CADENCE_MS
}

pub fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

pub fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

pub fn default_status_node() -> String {
    DEFAULT_STATUS_NODE.to_string()
}

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}
