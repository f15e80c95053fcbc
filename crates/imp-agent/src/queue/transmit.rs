//! Delivery of a single queued entry.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use crate::channel::LineChannel;
use crate::contact::{ContactError, ContactRegistry};

use super::{Destination, QueueError, Transport};

/// Sends one encoded line to a destination.
#[cfg_attr(test, mockall::automock)]
pub trait Transmit: Send + Sync {
    /// Delivers `text` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns a [`QueueError`] describing why delivery failed.
    fn transmit(&self, destination: &Destination, text: &str) -> Result<(), QueueError>;
}

/// Transmitter that resolves destinations through a [`ContactRegistry`].
///
/// Stream destinations get a fresh connection per entry, closed once the
/// line is written. Datagram destinations get one UDP packet.
#[derive(Debug, Clone)]
pub struct SocketTransmitter {
    registry: Arc<ContactRegistry>,
    connect_timeout: Duration,
}

impl SocketTransmitter {
    /// Default bound on connection establishment.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Builds a transmitter backed by `registry`.
    #[must_use]
    pub fn new(registry: Arc<ContactRegistry>) -> Self {
        Self {
            registry,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Overrides the connection timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn contact_error(destination: &Destination, source: ContactError) -> QueueError {
        QueueError::Contact {
            destination: destination.to_string(),
            source,
        }
    }

    fn send_stream(
        &self,
        destination: &Destination,
        port: u16,
        text: &str,
    ) -> Result<(), QueueError> {
        let connection = self
            .registry
            .connect_with_timeout(destination.host(), port, self.connect_timeout)
            .map_err(|source| Self::contact_error(destination, source))?;
        let mut channel = LineChannel::new(connection, text.len());
        channel
            .write_line(text)
            .map(|_| ())
            .map_err(|source| QueueError::Channel {
                destination: destination.to_string(),
                source,
            })
    }

    fn send_datagram(
        &self,
        destination: &Destination,
        port: u16,
        text: &str,
    ) -> Result<(), QueueError> {
        let address = self
            .registry
            .resolve_host(destination.host())
            .map_err(|source| Self::contact_error(destination, source))?;
        let target = SocketAddr::new(address, port);
        let local = match address {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let datagram_error = |source| QueueError::Datagram {
            destination: destination.to_string(),
            source,
        };
        let socket = UdpSocket::bind(local).map_err(datagram_error)?;
        socket
            .send_to(text.as_bytes(), target)
            .map(|_| ())
            .map_err(datagram_error)
    }
}

impl Transmit for SocketTransmitter {
    fn transmit(&self, destination: &Destination, text: &str) -> Result<(), QueueError> {
        let port = self
            .registry
            .resolve_service(destination.service())
            .map_err(|source| Self::contact_error(destination, source))?;
        match destination.transport() {
            Transport::Stream => self.send_stream(destination, port, text),
            Transport::Datagram => self.send_datagram(destination, port, text),
        }
    }
}
