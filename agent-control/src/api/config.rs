//! The API Server's binding configuration (`spec.md` §4.3): loopback-only
//! host/port newtypes, generalizing the
//! `agent_control/http_server/config.rs` `Port`/`Host` pair with the
//! explicit loopback-enforcement invariant this spec adds.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

const DEFAULT_PORT: u16 = 49590;
const DEFAULT_HOST: &str = "127.0.0.1";
pub(super) const DEFAULT_WORKERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Port(pub u16);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Host(pub String);

impl Default for Port {
    fn default() -> Self {
        Port(DEFAULT_PORT)
    }
}

impl From<u16> for Port {
    fn from(value: u16) -> Self {
        Port(value)
    }
}

impl From<Port> for u16 {
    fn from(value: Port) -> Self {
        value.0
    }
}

impl Default for Host {
    fn default() -> Self {
        Host(DEFAULT_HOST.to_string())
    }
}

impl Display for Port {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for Host {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub host: Host,
    #[serde(default)]
    pub port: Port,
    /// When set, `POST /v1/config` and `POST /v1/reload` return 403
    /// without contacting the Supervisor (`spec.md` §4.3).
    #[serde(default)]
    pub read_only: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Host::default(),
            port: Port::default(),
            read_only: false,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("server host {0} is not a loopback address")]
pub struct NotLoopback(pub String);

/// `spec.md` §4.3: "the server refuses to start unless its configured host
/// is a loopback address". Bypassable only via the crate's
/// `disable-loopback-check` feature, for local development against a
/// non-loopback bind.
pub fn ensure_loopback(host: &Host) -> Result<(), NotLoopback> {
    #[cfg(feature = "disable-loopback-check")]
    {
        let _ = host;
        return Ok(());
    }

    #[cfg(not(feature = "disable-loopback-check"))]
    {
        match host.0.parse::<IpAddr>() {
            Ok(addr) if addr.is_loopback() => Ok(()),
            _ => Err(NotLoopback(host.0.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_addresses_are_accepted() {
        assert!(ensure_loopback(&Host("127.0.0.1".to_string())).is_ok());
        assert!(ensure_loopback(&Host("::1".to_string())).is_ok());
    }

    #[cfg(not(feature = "disable-loopback-check"))]
    #[test]
    fn non_loopback_addresses_are_rejected() {
        assert!(ensure_loopback(&Host("0.0.0.0".to_string())).is_err());
        assert!(ensure_loopback(&Host("192.168.1.10".to_string())).is_err());
        assert!(ensure_loopback(&Host("not-an-ip".to_string())).is_err());
    }
}
