//! Throttled, serialised outbound dispatch.
//!
//! A [`DispatchQueue`] owns an ordered list of pending entries and at most
//! one worker thread. The worker is started by the first enqueue that finds
//! the queue idle, sends entries in FIFO order with at least the configured
//! cadence between consecutive sends, and exits as soon as the queue is
//! empty. Callers never wait on a send.

mod destination;
mod errors;
mod transmit;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use imp_wire::{Message, encode};
use tracing::{debug, warn};

pub use self::destination::{Destination, Transport};
pub use self::errors::QueueError;
#[cfg(test)]
pub(crate) use self::transmit::MockTransmit;
pub use self::transmit::{SocketTransmitter, Transmit};

const QUEUE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::queue");

/// Whether a worker is currently draining the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// No worker is running.
    Idle,
    /// A worker is popping and sending entries.
    Draining,
}

/// Receives notifications about queue events that are not errors of the
/// enqueuing caller.
pub trait DispatchObserver: Send + Sync {
    /// The queue was aborted and `discarded` pending entries were dropped.
    fn aborted(&self, discarded: usize);

    /// Delivering one entry failed. The worker continues with the next.
    fn send_failed(&self, destination: &Destination, error: &QueueError);
}

/// Observer that records events with `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatchObserver;

impl DispatchObserver for TracingDispatchObserver {
    fn aborted(&self, discarded: usize) {
        warn!(target: QUEUE_TARGET, discarded, "dispatch queue aborted");
    }

    fn send_failed(&self, destination: &Destination, error: &QueueError) {
        warn!(
            target: QUEUE_TARGET,
            destination = %destination,
            error = %error,
            "queued send failed"
        );
    }
}

#[derive(Debug)]
struct DispatchEntry {
    destination: Destination,
    text: String,
}

#[derive(Debug)]
struct QueueInner {
    entries: VecDeque<DispatchEntry>,
    worker_running: bool,
    abort_requested: bool,
    cadence: Duration,
    last_sent: Option<Instant>,
}

impl QueueInner {
    fn state(&self) -> QueueState {
        if self.worker_running {
            QueueState::Draining
        } else {
            QueueState::Idle
        }
    }

    fn is_idle(&self) -> bool {
        !self.worker_running && self.entries.is_empty()
    }

    /// Time left before the cadence allows the next send.
    fn cadence_remaining(&self, now: Instant) -> Option<Duration> {
        let ready_at = self.last_sent? + self.cadence;
        ready_at
            .checked_duration_since(now)
            .filter(|remaining| !remaining.is_zero())
    }
}

struct Shared {
    name: String,
    inner: Mutex<QueueInner>,
    wake: Condvar,
    idle: Condvar,
    transmitter: Arc<dyn Transmit>,
    observer: Arc<dyn DispatchObserver>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-agent outbound queue with a single lazily started worker.
#[derive(Clone)]
pub struct DispatchQueue {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DispatchQueue")
            .field("name", &self.shared.name)
            .field("inner", &*self.shared.lock())
            .finish_non_exhaustive()
    }
}

impl DispatchQueue {
    /// Creates an idle queue. `name` labels the worker thread and logs.
    pub fn new(
        name: impl Into<String>,
        cadence: Duration,
        transmitter: Arc<dyn Transmit>,
        observer: Arc<dyn DispatchObserver>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                inner: Mutex::new(QueueInner {
                    entries: VecDeque::new(),
                    worker_running: false,
                    abort_requested: false,
                    cadence,
                    last_sent: None,
                }),
                wake: Condvar::new(),
                idle: Condvar::new(),
                transmitter,
                observer,
            }),
        }
    }

    /// Appends an entry and starts the worker if the queue was idle.
    ///
    /// Clears a previously raised abort.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::WorkerSpawn`] when no worker could be started;
    /// the entry stays queued.
    pub fn enqueue(
        &self,
        destination: Destination,
        text: impl Into<String>,
    ) -> Result<(), QueueError> {
        let mut inner = self.shared.lock();
        inner.abort_requested = false;
        inner.entries.push_back(DispatchEntry {
            destination,
            text: text.into(),
        });
        if inner.worker_running {
            return Ok(());
        }
        inner.worker_running = true;
        drop(inner);
        self.spawn_worker()
    }

    /// Encodes `message` and enqueues it.
    ///
    /// # Errors
    ///
    /// As [`DispatchQueue::enqueue`].
    pub fn enqueue_message(
        &self,
        destination: Destination,
        message: &Message,
    ) -> Result<(), QueueError> {
        self.enqueue(destination, encode(message))
    }

    /// Discards every pending entry and returns how many were dropped.
    ///
    /// A send already in progress completes; nothing after it is sent. The
    /// observer is told how many entries were discarded.
    pub fn abort(&self) -> usize {
        let discarded = {
            let mut inner = self.shared.lock();
            let discarded = inner.entries.len();
            inner.entries.clear();
            inner.abort_requested = true;
            discarded
        };
        self.shared.wake.notify_all();
        self.shared.observer.aborted(discarded);
        discarded
    }

    /// Returns `true` while an abort has not been cleared by an enqueue.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.shared.lock().abort_requested
    }

    /// Changes the minimum spacing between sends, effective for the next send.
    pub fn set_cadence(&self, cadence: Duration) {
        self.shared.lock().cadence = cadence;
        self.shared.wake.notify_all();
    }

    /// Minimum spacing between sends.
    #[must_use]
    pub fn cadence(&self) -> Duration {
        self.shared.lock().cadence
    }

    /// Number of entries waiting to be sent.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    /// Returns `true` when nothing is waiting to be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a worker is draining the queue.
    #[must_use]
    pub fn state(&self) -> QueueState {
        self.shared.lock().state()
    }

    /// Blocks until the queue is empty and its worker has exited, or until
    /// `timeout` passes. Returns `true` when the queue went idle.
    #[must_use]
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let inner = self.shared.lock();
        let (inner, _) = self
            .shared
            .idle
            .wait_timeout_while(inner, timeout, |inner| !inner.is_idle())
            .unwrap_or_else(PoisonError::into_inner);
        inner.is_idle()
    }

    fn spawn_worker(&self) -> Result<(), QueueError> {
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("dispatch-{}", self.shared.name))
            .spawn(move || drain(&shared));
        match spawned {
            Ok(_) => Ok(()),
            Err(source) => {
                self.shared.lock().worker_running = false;
                Err(QueueError::WorkerSpawn { source })
            }
        }
    }
}

fn drain(shared: &Shared) {
    debug!(target: QUEUE_TARGET, queue = %shared.name, "dispatch worker started");
    let mut inner = shared.lock();
    loop {
        if let Some(remaining) = inner.cadence_remaining(Instant::now()) {
            if inner.entries.is_empty() {
                break;
            }
            inner = shared
                .wake
                .wait_timeout(inner, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
            continue;
        }

        let Some(entry) = inner.entries.pop_front() else {
            break;
        };
        drop(inner);

        deliver(shared, &entry);

        inner = shared.lock();
        inner.last_sent = Some(Instant::now());
    }
    inner.worker_running = false;
    drop(inner);
    shared.idle.notify_all();
    debug!(target: QUEUE_TARGET, queue = %shared.name, "dispatch worker idle");
}

/// Sends one entry. A panicking transmitter or observer counts as a failed
/// send so the worker always returns to the loop.
fn deliver(shared: &Shared, entry: &DispatchEntry) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        shared.transmitter.transmit(&entry.destination, &entry.text)
    }))
    .unwrap_or_else(|_| {
        Err(QueueError::TransmitPanicked {
            destination: entry.destination.to_string(),
        })
    });
    let Err(error) = outcome else {
        return;
    };
    let reported = panic::catch_unwind(AssertUnwindSafe(|| {
        shared.observer.send_failed(&entry.destination, &error);
    }));
    if reported.is_err() {
        warn!(
            target: QUEUE_TARGET,
            queue = %shared.name,
            destination = %entry.destination,
            error = %error,
            "dispatch observer panicked while reporting a failed send"
        );
    }
}
