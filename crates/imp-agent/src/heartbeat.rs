//! Periodic `STATUS` heartbeat sent to the status node.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use imp_wire::{Message, MessageType, NodeName};
use tracing::{debug, warn};

use crate::queue::{Destination, DispatchQueue};

const HEARTBEAT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::heartbeat");

/// Where and how often heartbeats are sent.
#[derive(Debug, Clone)]
pub struct HeartbeatSettings {
    /// Node sending the heartbeat.
    pub from: NodeName,
    /// Node receiving it.
    pub to: NodeName,
    /// Address of the receiving node.
    pub destination: Destination,
    /// Time between heartbeats.
    pub interval: Duration,
}

/// Handle to a running heartbeat thread.
///
/// Dropping the handle stops the heartbeat without waiting for the thread.
#[derive(Debug)]
pub struct HeartbeatHandle {
    stop: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<u64>>,
}

impl HeartbeatHandle {
    /// Starts sending heartbeats through `queue`.
    ///
    /// The first heartbeat is queued after one full interval. Each carries a
    /// sequence number starting at 1.
    ///
    /// # Errors
    ///
    /// Returns the operating system error when the thread cannot start.
    pub fn start(settings: HeartbeatSettings, queue: DispatchQueue) -> io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name(format!("heartbeat-{}", settings.from))
            .spawn(move || {
                let mut sequence = 0_u64;
                loop {
                    match stopped.recv_timeout(settings.interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            sequence += 1;
                            beat(&settings, &queue, sequence);
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(
                    target: HEARTBEAT_TARGET,
                    sent = sequence,
                    "heartbeat stopped"
                );
                sequence
            })?;
        Ok(Self {
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    /// Stops the heartbeat and returns how many beats were queued.
    #[must_use]
    pub fn stop(mut self) -> u64 {
        self.stop.take();
        self.thread
            .take()
            .and_then(|thread| thread.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The thread may already have exited.
            let _ = stop.send(());
        }
    }
}

fn beat(settings: &HeartbeatSettings, queue: &DispatchQueue, sequence: u64) {
    let body = format!("heartbeat seq={sequence} node={}", settings.from);
    let queued = Message::new(
        settings.from.clone(),
        settings.to.clone(),
        MessageType::Status,
        body,
    )
    .map_err(|error| error.to_string())
    .and_then(|message| {
        queue
            .enqueue_message(settings.destination.clone(), &message)
            .map_err(|error| error.to_string())
    });
    if let Err(error) = queued {
        warn!(
            target: HEARTBEAT_TARGET,
            sequence,
            error = %error,
            "heartbeat not queued"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::queue::{QueueError, TracingDispatchObserver, Transmit};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Transmit for Recorder {
        fn transmit(&self, _destination: &Destination, text: &str) -> Result<(), QueueError> {
            self.0.lock().expect("recorder").push(text.to_owned());
            Ok(())
        }
    }

    #[test]
    fn beats_carry_increasing_sequence_numbers() {
        let recorder = Arc::new(Recorder::default());
        let queue = DispatchQueue::new(
            "heartbeat-test",
            Duration::ZERO,
            recorder.clone(),
            Arc::new(TracingDispatchObserver),
        );
        let settings = HeartbeatSettings {
            from: NodeName::new("CCD").expect("node"),
            to: NodeName::new("OPS").expect("node"),
            destination: Destination::datagram("localhost", "9002"),
            interval: Duration::from_millis(20),
        };

        let handle = HeartbeatHandle::start(settings, queue.clone()).expect("start");
        thread::sleep(Duration::from_millis(130));
        let sent = handle.stop();
        assert!(queue.wait_idle(Duration::from_secs(5)));

        let lines = recorder.0.lock().expect("recorder");
        assert!(sent >= 2, "expected at least two beats, got {sent}");
        assert_eq!(lines.len() as u64, sent);
        assert_eq!(lines[0], "CCD>OPS STATUS: heartbeat seq=1 node=CCD\r");
        assert_eq!(lines[1], "CCD>OPS STATUS: heartbeat seq=2 node=CCD\r");
    }

    #[test]
    fn stopping_before_the_first_interval_sends_nothing() {
        let queue = DispatchQueue::new(
            "heartbeat-idle",
            Duration::ZERO,
            Arc::new(Recorder::default()),
            Arc::new(TracingDispatchObserver),
        );
        let settings = HeartbeatSettings {
            from: NodeName::new("CCD").expect("node"),
            to: NodeName::new("OPS").expect("node"),
            destination: Destination::stream("localhost", "9002"),
            interval: Duration::from_secs(60),
        };

        let handle = HeartbeatHandle::start(settings, queue).expect("start");
        assert_eq!(handle.stop(), 0);
    }
}
