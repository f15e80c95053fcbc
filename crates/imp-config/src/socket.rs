use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};
use thiserror::Error;
use url::Url;

/// Declarative configuration for agent sockets.
///
/// Deserialises from either a `tcp://host:port` / `udp://host:port` string
/// or a table tagged with `transport`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// Connection-oriented endpoint used for command/reply traffic.
    Tcp { host: String, port: u16 },
    /// Datagram endpoint used for at-most-once status broadcast.
    Udp { host: String, port: u16 },
}

impl SocketEndpoint {
    /// Builds a TCP socket endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Builds a UDP socket endpoint.
    #[must_use]
    pub fn udp(host: impl Into<String>, port: u16) -> Self {
        Self::Udp {
            host: host.into(),
            port,
        }
    }

    /// Host name or address of the endpoint.
    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            Self::Tcp { host, .. } | Self::Udp { host, .. } => host,
        }
    }

    /// Port number of the endpoint.
    #[must_use]
    pub fn port(&self) -> u16 {
        match self {
            Self::Tcp { port, .. } | Self::Udp { port, .. } => *port,
        }
    }

    /// Returns `true` when the endpoint uses datagrams.
    #[must_use]
    pub fn is_datagram(&self) -> bool {
        matches!(self, Self::Udp { .. })
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
            Self::Udp { host, port } => write!(formatter, "udp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        let host = url
            .host_str()
            .ok_or_else(|| SocketParseError::MissingHost(input.to_string()))?;
        let port = url
            .port()
            .ok_or_else(|| SocketParseError::MissingPort(input.to_string()))?;
        match url.scheme() {
            "tcp" => Ok(Self::tcp(host, port)),
            "udp" => Ok(Self::udp(host, port)),
            other => Err(SocketParseError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
enum TaggedEndpoint {
    Tcp { host: String, port: u16 },
    Udp { host: String, port: u16 },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EndpointRepr {
    Address(String),
    Tagged(TaggedEndpoint),
}

impl<'de> Deserialize<'de> for SocketEndpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match EndpointRepr::deserialize(deserializer)? {
            EndpointRepr::Address(address) => address.parse().map_err(de::Error::custom),
            EndpointRepr::Tagged(TaggedEndpoint::Tcp { host, port }) => Ok(Self::tcp(host, port)),
            EndpointRepr::Tagged(TaggedEndpoint::Udp { host, port }) => Ok(Self::udp(host, port)),
        }
    }
}

/// Errors encountered while parsing a [`SocketEndpoint`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Scheme was not recognised.
    #[error("unsupported socket scheme '{0}'")]
    UnsupportedScheme(String),
    /// Host name was missing.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// Port was missing from the address.
    #[error("missing port in '{0}'")]
    MissingPort(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
