//! Host and service name lookups.
//!
//! The system resolver is not guaranteed to be reentrant, so every lookup
//! runs while holding the registry's resolver lock.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::{Mutex, PoisonError};

use super::ContactError;

pub(super) fn resolve_host(lock: &Mutex<()>, host: &str) -> Result<IpAddr, ContactError> {
    if let Ok(address) = host.parse::<IpAddr>() {
        return Ok(address);
    }
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    let addrs: Vec<SocketAddr> = (host, 0)
        .to_socket_addrs()
        .map_err(|source| ContactError::ResolveHost {
            host: host.to_owned(),
            source,
        })?
        .collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .map(SocketAddr::ip)
        .ok_or_else(|| ContactError::ResolveEmpty {
            host: host.to_owned(),
        })
}

pub(super) fn resolve_service(lock: &Mutex<()>, service: &str) -> Result<u16, ContactError> {
    if let Ok(port) = service.parse::<u16>() {
        return Ok(port);
    }
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    lookup_service(service).ok_or_else(|| ContactError::UnknownService {
        service: service.to_owned(),
    })
}

#[cfg(unix)]
fn lookup_service(service: &str) -> Option<u16> {
    use std::ffi::CString;

    let name = CString::new(service).ok()?;
    // SAFETY: both arguments are valid NUL-terminated strings and the caller
    // holds the resolver lock, so the static entry is not overwritten while
    // we read it.
    let entry = unsafe { libc::getservbyname(name.as_ptr(), c"tcp".as_ptr()) };
    if entry.is_null() {
        return None;
    }
    // SAFETY: `entry` is non-null and points at the resolver's static record.
    let raw = unsafe { (*entry).s_port };
    // `s_port` holds a 16-bit port in network byte order.
    let network_order = u16::try_from(raw & 0xffff).ok()?;
    Some(u16::from_be(network_order))
}

#[cfg(not(unix))]
fn lookup_service(_service: &str) -> Option<u16> {
    None
}
