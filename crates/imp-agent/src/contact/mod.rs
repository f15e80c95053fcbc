//! Process-wide socket contact registry.
//!
//! The registry maps listening ports to bound sockets so that any number of
//! threads can ask to serve a port without binding it twice, and provides the
//! outbound half of the contact layer: connecting to a peer by host and
//! service name.
//!
//! Lookup-or-create of a port entry is a single critical section under the
//! registry mutex. Accepting does not hold that mutex: concurrent callers
//! block in the operating system's `accept`, which hands each pending peer to
//! exactly one of them.

mod connection;
mod errors;
mod resolve;

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use imp_config::Config;
use once_cell::sync::OnceCell;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

pub use self::connection::Connection;
pub use self::errors::ContactError;

pub(crate) const CONTACT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::contact");

static SHARED_REGISTRY: OnceCell<ContactRegistry> = OnceCell::new();

/// Sizing and placement of listening sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Local address every listening socket binds to.
    pub bind_address: IpAddr,
    /// Pending-connection backlog passed to `listen`.
    pub backlog: u32,
    /// Maximum number of distinct ports held open.
    pub capacity: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            backlog: imp_config::DEFAULT_LISTEN_BACKLOG,
            capacity: imp_config::DEFAULT_REGISTRY_CAPACITY,
        }
    }
}

/// Registry of listening ports plus host and service resolution.
#[derive(Debug)]
pub struct ContactRegistry {
    settings: RegistrySettings,
    ports: Mutex<HashMap<u16, ListenHandle>>,
    resolver: Mutex<()>,
}

impl ContactRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            settings,
            ports: Mutex::new(HashMap::new()),
            resolver: Mutex::new(()),
        }
    }

    /// Returns the process-wide registry, creating it with `settings` on
    /// first use. Later calls ignore their argument.
    pub fn shared_with(settings: RegistrySettings) -> &'static Self {
        SHARED_REGISTRY.get_or_init(|| Self::new(settings))
    }

    /// Returns the process-wide registry, creating it with default settings
    /// on first use.
    pub fn shared() -> &'static Self {
        Self::shared_with(RegistrySettings::default())
    }

    /// Builds a registry sized by `config`, binding listeners to the
    /// resolved host of its listen socket.
    ///
    /// # Errors
    ///
    /// Returns a resolution error when the listen host cannot be resolved.
    pub fn from_config(config: &Config) -> Result<Self, ContactError> {
        let mut registry = Self::new(RegistrySettings {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            backlog: config.listen_backlog(),
            capacity: config.registry_capacity(),
        });
        registry.settings.bind_address = registry.resolve_host(config.listen_socket().host())?;
        Ok(registry)
    }

    /// Settings the registry was created with.
    #[must_use]
    pub fn settings(&self) -> RegistrySettings {
        self.settings
    }

    /// Number of ports currently held open.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_ports().len()
    }

    /// Returns `true` when no port has been opened yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the listening handle for `port`, binding it on first request.
    ///
    /// Repeated calls for a port return the handle recorded by the first
    /// call. Port `0` binds a fresh ephemeral port on every call; the handle
    /// is then recorded under the port the operating system assigned.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::PortExhausted`] when the registry is full and
    /// [`ContactError::BindFailed`] when the operating system refuses the
    /// bind or listen.
    pub fn listen_on(&self, port: u16) -> Result<ListenHandle, ContactError> {
        let mut ports = self.lock_ports();
        if let Some(handle) = ports.get(&port) {
            return Ok(handle.clone());
        }
        if ports.len() >= self.settings.capacity {
            return Err(ContactError::PortExhausted {
                port,
                capacity: self.settings.capacity,
            });
        }

        let requested = SocketAddr::new(self.settings.bind_address, port);
        let listener = bind_listener(requested, self.settings.backlog)
            .map_err(|source| ContactError::BindFailed {
                addr: requested,
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ContactError::BindFailed {
                addr: requested,
                source,
            })?;
        let handle = ListenHandle {
            inner: Arc::new(ListenSocket {
                listener,
                local_addr,
            }),
        };
        ports.insert(local_addr.port(), handle.clone());
        info!(
            target: CONTACT_TARGET,
            port = local_addr.port(),
            addr = %local_addr,
            backlog = self.settings.backlog,
            "listening port registered"
        );
        Ok(handle)
    }

    /// Blocks until a peer connects to `handle`'s port.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::Accept`] when the operating system reports an
    /// accept failure.
    pub fn accept_next(&self, handle: &ListenHandle) -> Result<Connection, ContactError> {
        handle.accept()
    }

    /// Opens an outbound TCP connection. No retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns a resolution error when `host` cannot be resolved and
    /// [`ContactError::Connect`] when the peer refuses or is unreachable.
    pub fn connect_to(&self, host: &str, port: u16) -> Result<Connection, ContactError> {
        self.connect(host, port, None)
    }

    /// Opens an outbound TCP connection, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// As [`ContactRegistry::connect_to`], with timeouts reported as
    /// [`ContactError::Connect`].
    pub fn connect_with_timeout(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Connection, ContactError> {
        self.connect(host, port, Some(timeout))
    }

    /// Resolves a host name to an address, preferring IPv4.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::ResolveHost`] or
    /// [`ContactError::ResolveEmpty`] when the lookup fails.
    pub fn resolve_host(&self, host: &str) -> Result<IpAddr, ContactError> {
        resolve::resolve_host(&self.resolver, host)
    }

    /// Resolves a numeric port or a TCP service name to a port number.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::UnknownService`] when the name is neither.
    pub fn resolve_service(&self, service: &str) -> Result<u16, ContactError> {
        resolve::resolve_service(&self.resolver, service)
    }

    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Connection, ContactError> {
        let address = SocketAddr::new(self.resolve_host(host)?, port);
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&address, timeout),
            None => TcpStream::connect(address),
        };
        let stream = attempt.map_err(|source| ContactError::Connect {
            host: host.to_owned(),
            port,
            source,
        })?;
        debug!(
            target: CONTACT_TARGET,
            peer = %address,
            "outbound connection established"
        );
        Ok(Connection::new(stream, address))
    }

    fn lock_ports(&self) -> std::sync::MutexGuard<'_, HashMap<u16, ListenHandle>> {
        self.ports.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ContactRegistry {
    fn default() -> Self {
        Self::new(RegistrySettings::default())
    }
}

#[derive(Debug)]
struct ListenSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
}

/// Shared reference to a listening socket owned by a [`ContactRegistry`].
///
/// Clones refer to the same socket. The socket itself is never exposed, so
/// holders can only accept from it.
#[derive(Debug, Clone)]
pub struct ListenHandle {
    inner: Arc<ListenSocket>,
}

impl ListenHandle {
    /// Port the socket is bound to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.local_addr.port()
    }

    /// Local address the socket is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Returns `true` when both handles refer to the same socket.
    #[must_use]
    pub fn same_socket(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Blocks until a peer connects and returns the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::Accept`] on any failure other than an
    /// interrupted system call, which is retried.
    pub fn accept(&self) -> Result<Connection, ContactError> {
        loop {
            match self.inner.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(
                        target: CONTACT_TARGET,
                        port = self.port(),
                        peer = %peer,
                        "inbound connection accepted"
                    );
                    return Ok(Connection::new(stream, peer));
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(source) => {
                    return Err(ContactError::Accept {
                        port: self.port(),
                        source,
                    });
                }
            }
        }
    }
}

fn bind_listener(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;
    Ok(socket.into())
}
