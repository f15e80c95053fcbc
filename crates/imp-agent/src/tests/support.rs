//! Shared doubles for the behavioural suites.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ortho_config::{OrthoConfig as _, OrthoError};

use imp_config::{Config, SocketEndpoint};
use imp_wire::NodeName;

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::channel::ChannelError;
use crate::lifecycle::LifecycleReporter;
use crate::queue::{Destination, QueueError, Transmit};

/// Lifecycle events captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ListenerBound(String),
    PeerConnected,
    PeerDisconnected,
    QueueAborted(usize),
    SendFailed(String),
}

/// Records lifecycle events for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().expect("reporter mutex poisoned").clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingReporter {
    fn bootstrap_starting(&self) {
        self.record(LifecycleEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(LifecycleEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(LifecycleEvent::BootstrapFailed(error.to_string()));
    }

    fn listener_bound(&self, node: &NodeName, _addr: SocketAddr) {
        self.record(LifecycleEvent::ListenerBound(node.to_string()));
    }

    fn peer_connected(&self, _peer: SocketAddr) {
        self.record(LifecycleEvent::PeerConnected);
    }

    fn peer_disconnected(&self, _peer: SocketAddr, _error: Option<&ChannelError>) {
        self.record(LifecycleEvent::PeerDisconnected);
    }

    fn queue_aborted(&self, discarded: usize) {
        self.record(LifecycleEvent::QueueAborted(discarded));
    }

    fn send_failed(&self, destination: &Destination, _error: &QueueError) {
        self.record(LifecycleEvent::SendFailed(destination.to_string()));
    }
}

/// Loader returning a loopback configuration on an ephemeral port.
pub struct LoopbackConfigLoader {
    config: Config,
}

impl LoopbackConfigLoader {
    pub fn new(node: &str) -> Self {
        Self {
            config: Config {
                node_name: node.to_owned(),
                listen_socket: SocketEndpoint::tcp("127.0.0.1", 0),
                dispatch_cadence_ms: 0,
                ..Config::default()
            },
        }
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }
}

impl ConfigLoader for LoopbackConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Loader that fails by passing an unparsable command-line value.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("imp-agent"),
            OsString::from("--listen-backlog"),
            OsString::from("many"),
        ])
    }
}

/// Transmitter that records each delivery with the time it happened.
#[derive(Default)]
pub struct RecordingTransmit {
    sent: Mutex<Vec<(String, Instant)>>,
    delay: Duration,
}

impl RecordingTransmit {
    /// Transmitter whose every send takes `delay`.
    pub fn slow(delay: Duration) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            delay,
        }
    }

    /// Texts delivered so far, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("transmit mutex poisoned")
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    /// Gaps between consecutive deliveries.
    pub fn gaps(&self) -> Vec<Duration> {
        let sent = self.sent.lock().expect("transmit mutex poisoned");
        sent.windows(2)
            .map(|pair| pair[1].1.duration_since(pair[0].1))
            .collect()
    }
}

impl Transmit for RecordingTransmit {
    fn transmit(&self, _destination: &Destination, text: &str) -> Result<(), QueueError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.sent
            .lock()
            .expect("transmit mutex poisoned")
            .push((text.to_owned(), Instant::now()));
        Ok(())
    }
}
