use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio::net::TcpStream;

use crate::errors::{WalletError, WalletResult};

/// Tells "the device is offline" apart from "the server said no".
#[async_trait]
pub trait ConnectivityMonitor: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Reachability driven by whoever owns the flag; online until told otherwise.
#[derive(Debug)]
pub struct ConnectivityFlag {
    online: AtomicBool,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConnectivityMonitor for ConnectivityFlag {
    async fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Checks reachability with a plain TCP connect to the backend host.
#[derive(Debug, Clone)]
pub struct TcpReachability {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpReachability {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn from_url(url: &str, timeout: Duration) -> WalletResult<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| WalletError::ValidationError(format!("Invalid URL '{}': {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| WalletError::ValidationError(format!("URL '{}' has no host", url)))?;
        let port = parsed.port_or_known_default().ok_or_else(|| {
            WalletError::ValidationError(format!("URL '{}' has no usable port", url))
        })?;
        Ok(Self::new(host, port, timeout))
    }

    pub fn target(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

#[async_trait]
impl ConnectivityMonitor for TcpReachability {
    async fn is_reachable(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                log::debug!("{}:{} unreachable: {}", self.host, self.port, e);
                false
            }
            Err(_) => {
                log::debug!("{}:{} reachability check timed out", self.host, self.port);
                false
            }
        }
    }
}
