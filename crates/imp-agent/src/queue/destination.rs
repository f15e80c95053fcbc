//! Addresses of outbound queue entries.

use std::fmt;

use imp_config::SocketEndpoint;

/// Transport used to deliver one queued entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transport {
    /// One short-lived TCP connection per entry.
    #[default]
    Stream,
    /// One UDP datagram per entry, delivered at most once.
    Datagram,
}

/// Where a queued entry is sent: a host plus a numeric port or service name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    host: String,
    service: String,
    transport: Transport,
}

impl Destination {
    /// TCP destination.
    pub fn stream(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            transport: Transport::Stream,
        }
    }

    /// UDP destination.
    pub fn datagram(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            transport: Transport::Datagram,
        }
    }

    /// Host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port number or service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Transport used for delivery.
    #[must_use]
    pub fn transport(&self) -> Transport {
        self.transport
    }
}

impl From<&SocketEndpoint> for Destination {
    fn from(endpoint: &SocketEndpoint) -> Self {
        let service = endpoint.port().to_string();
        if endpoint.is_datagram() {
            Self::datagram(endpoint.host(), service)
        } else {
            Self::stream(endpoint.host(), service)
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.transport {
            Transport::Stream => "tcp",
            Transport::Datagram => "udp",
        };
        write!(formatter, "{scheme}://{}:{}", self.host, self.service)
    }
}
