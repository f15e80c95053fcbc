//! Parsing of the `AGENT` argument.

use crate::errors::AppError;

/// Host and port (or service name) of the agent to contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AgentAddress {
    pub(crate) host: String,
    pub(crate) service: String,
}

impl AgentAddress {
    /// Parses `host`, `host:port`, `host:service` or `[v6]:port`.
    ///
    /// A missing port selects the well-known agent port. An unbracketed
    /// IPv6 literal is taken as a host without a port.
    pub(crate) fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = |reason| AppError::AgentAddress {
            address: raw.to_owned(),
            reason,
        };
        let (host, service) = if let Some(rest) = raw.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| invalid("unclosed '['"))?;
            let service = match tail {
                "" => None,
                tail => Some(
                    tail.strip_prefix(':')
                        .ok_or_else(|| invalid("expected ':' after ']'"))?,
                ),
            };
            (host, service)
        } else {
            match raw.split_once(':') {
                Some((host, port)) if !port.contains(':') => (host, Some(port)),
                _ => (raw, None),
            }
        };
        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        let service = match service {
            Some("") => return Err(invalid("port is empty")),
            Some(service) => service.to_owned(),
            None => imp_config::DEFAULT_TCP_PORT.to_string(),
        };
        Ok(Self {
            host: host.to_owned(),
            service,
        })
    }
}
