//! Error types for contact registry operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while listening, accepting, connecting or resolving.
#[derive(Debug, Error)]
pub enum ContactError {
    /// The registry already holds its maximum number of listening ports.
    #[error("no free registry slot for port {port}: capacity of {capacity} ports reached")]
    PortExhausted { port: u16, capacity: usize },
    /// Binding or listening on the requested address failed.
    #[error("failed to listen at {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// Accepting a peer on a listening port failed.
    #[error("failed to accept on port {port}: {source}")]
    Accept {
        port: u16,
        #[source]
        source: io::Error,
    },
    /// Opening an outbound connection failed.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    /// Host name resolution failed.
    #[error("failed to resolve host '{host}': {source}")]
    ResolveHost {
        host: String,
        #[source]
        source: io::Error,
    },
    /// Host name resolved to no usable address.
    #[error("no addresses resolved for host '{host}'")]
    ResolveEmpty { host: String },
    /// Service name is neither a port number nor a known service.
    #[error("unknown service '{service}'")]
    UnknownService { service: String },
}

impl ContactError {
    /// Returns `true` for resolution failures.
    #[must_use]
    pub fn is_resolve(&self) -> bool {
        matches!(
            self,
            Self::ResolveHost { .. } | Self::ResolveEmpty { .. } | Self::UnknownService { .. }
        )
    }
}
