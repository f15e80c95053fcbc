//! Error types for outbound dispatch.

use std::io;

use thiserror::Error;

use crate::channel::ChannelError;
use crate::contact::ContactError;

/// Errors raised while queueing or delivering an entry.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The destination could not be resolved or connected to.
    #[error("cannot reach {destination}: {source}")]
    Contact {
        destination: String,
        #[source]
        source: ContactError,
    },
    /// Writing the line to the connection failed.
    #[error("failed to send to {destination}: {source}")]
    Channel {
        destination: String,
        #[source]
        source: ChannelError,
    },
    /// Sending the datagram failed.
    #[error("failed to send datagram to {destination}: {source}")]
    Datagram {
        destination: String,
        #[source]
        source: io::Error,
    },
    /// The transmitter panicked while delivering the entry.
    #[error("transmitter panicked while sending to {destination}")]
    TransmitPanicked { destination: String },
    /// The worker thread could not be started. The entry stays queued and
    /// the next enqueue retries.
    #[error("failed to start dispatch worker: {source}")]
    WorkerSpawn {
        #[source]
        source: io::Error,
    },
}
