//! Structured reporting for agent lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use imp_config::Config;
use imp_wire::NodeName;

use crate::bootstrap::BootstrapError;
use crate::channel::ChannelError;
use crate::queue::{Destination, DispatchObserver, QueueError};

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the agent's well-known port is listening.
    fn listener_bound(&self, node: &NodeName, addr: SocketAddr);

    /// Invoked when a peer connection is accepted.
    fn peer_connected(&self, peer: SocketAddr);

    /// Invoked when a peer connection ends, with the failure if any.
    fn peer_disconnected(&self, peer: SocketAddr, error: Option<&ChannelError>);

    /// Invoked when the outbound queue is aborted.
    fn queue_aborted(&self, discarded: usize);

    /// Invoked when a queued send fails.
    fn send_failed(&self, destination: &Destination, error: &QueueError);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listener_bound(&self, node: &NodeName, addr: SocketAddr) {
        (**self).listener_bound(node, addr);
    }

    fn peer_connected(&self, peer: SocketAddr) {
        (**self).peer_connected(peer);
    }

    fn peer_disconnected(&self, peer: SocketAddr, error: Option<&ChannelError>) {
        (**self).peer_disconnected(peer, error);
    }

    fn queue_aborted(&self, discarded: usize) {
        (**self).queue_aborted(discarded);
    }

    fn send_failed(&self, destination: &Destination, error: &QueueError) {
        (**self).send_failed(destination, error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "bootstrap_starting",
            "starting agent bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "bootstrap_succeeded",
            node = %config.node_name(),
            socket = %config.listen_socket(),
            cadence_ms = config.dispatch_cadence_ms,
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "agent bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "agent bootstrap failed"
        );
    }

    fn listener_bound(&self, node: &NodeName, addr: SocketAddr) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "listener_bound",
            node = %node,
            addr = %addr,
            "agent listening"
        );
    }

    fn peer_connected(&self, peer: SocketAddr) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "peer_connected",
            peer = %peer,
            "peer connected"
        );
    }

    fn peer_disconnected(&self, peer: SocketAddr, error: Option<&ChannelError>) {
        match error {
            Some(error) => tracing::warn!(
                target: LIFECYCLE_TARGET,
                event = "peer_disconnected",
                peer = %peer,
                error = %error,
                "peer connection failed"
            ),
            None => tracing::debug!(
                target: LIFECYCLE_TARGET,
                event = "peer_disconnected",
                peer = %peer,
                "peer disconnected"
            ),
        }
    }

    fn queue_aborted(&self, discarded: usize) {
        tracing::warn!(
            target: LIFECYCLE_TARGET,
            event = "queue_aborted",
            discarded,
            "outbound queue aborted"
        );
    }

    fn send_failed(&self, destination: &Destination, error: &QueueError) {
        tracing::warn!(
            target: LIFECYCLE_TARGET,
            event = "send_failed",
            destination = %destination,
            error = %error,
            "queued send failed"
        );
    }
}

/// Forwards dispatch queue notifications to a [`LifecycleReporter`].
#[derive(Clone)]
pub struct ReporterObserver {
    reporter: Arc<dyn LifecycleReporter>,
}

impl ReporterObserver {
    /// Wraps `reporter`.
    #[must_use]
    pub fn new(reporter: Arc<dyn LifecycleReporter>) -> Self {
        Self { reporter }
    }
}

impl DispatchObserver for ReporterObserver {
    fn aborted(&self, discarded: usize) {
        self.reporter.queue_aborted(discarded);
    }

    fn send_failed(&self, destination: &Destination, error: &QueueError) {
        self.reporter.send_failed(destination, error);
    }
}
