//! Network reachability checks.
//!
//! The sync layer asks a `Connectivity` before every synchronized operation.
//! `TcpProbe` opens a TCP connection to the API host; `StaticConnectivity`
//! is a switch for tests and for a user-selected offline mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Default time allowed for the reachability probe.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;

#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Reports whatever it was last set to.
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connectivity for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Probes reachability by connecting to the API host.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
    offline_mode: bool,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            offline_mode: false,
        }
    }

    /// Probe the host and port of `base_url`. Returns `None` when the URL
    /// has no host.
    pub fn for_base_url(base_url: &str, timeout: Duration) -> Option<Self> {
        let url = reqwest::Url::parse(base_url).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(Self::new(format!("{}:{}", host, port), timeout))
    }

    /// When set, the probe reports unreachable without touching the network.
    pub fn with_offline_mode(mut self, offline_mode: bool) -> Self {
        self.offline_mode = offline_mode;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_online(&self) -> bool {
        if self.offline_mode {
            return false;
        }

        match tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, timeout_ms = self.timeout.as_millis() as u64, "Connectivity probe timed out");
                false
            }
        }
    }
}
