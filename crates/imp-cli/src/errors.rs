//! Error types for the CLI runtime.

use std::io;

use thiserror::Error;

use imp_agent::{ChannelError, ContactError};
use imp_wire::MessageError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("invalid agent address '{address}': {reason}")]
    AgentAddress { address: String, reason: &'static str },
    #[error("invalid message: {0}")]
    Message(#[from] MessageError),
    #[error("cannot reach agent: {0}")]
    Contact(#[source] ContactError),
    #[error("failed to configure connection: {0}")]
    Configure(#[source] io::Error),
    #[error("failed to send message: {0}")]
    Send(#[source] ChannelError),
    #[error("no reply from agent within {timeout_ms} ms")]
    ReplyTimeout { timeout_ms: u64 },
    #[error("failed to read reply: {0}")]
    ReadReply(#[source] ChannelError),
    #[error("agent closed the connection without a final reply")]
    MissingReply,
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl AppError {
    /// Classifies a read failure, separating timeouts from other faults.
    pub(crate) fn from_read(error: ChannelError, timeout_ms: u64) -> Self {
        match &error {
            ChannelError::Read { source }
                if matches!(
                    source.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                Self::ReplyTimeout { timeout_ms }
            }
            _ => Self::ReadReply(error),
        }
    }
}
