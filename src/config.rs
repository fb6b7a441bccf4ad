//! Configuration for the QRate UDP proxy
//!
//! Centralized configuration with sensible defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ProxyError, Result};
use crate::protocol::{DEFAULT_REPLY_PORT, DEFAULT_REQUEST_PORT};

/// Gateway (UDP side) configuration
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Request Socket
    // -------------------------------------------------------------------------
    /// Address the request socket binds to
    pub bind_addr: IpAddr,

    /// Port the request socket binds to (0 picks an ephemeral port)
    pub request_port: u16,

    /// Receive timeout; also the interval at which the worker checks for shutdown
    pub recv_timeout_ms: u64,

    /// SO_RCVBUF size requested from the OS (0 leaves the OS default)
    pub recv_buffer_size: usize,

    // -------------------------------------------------------------------------
    // Reply Socket
    // -------------------------------------------------------------------------
    /// Destination port for replies; the destination IP is the request sender's
    pub reply_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            request_port: DEFAULT_REQUEST_PORT,
            recv_timeout_ms: 3000,
            recv_buffer_size: 256 * 1024 * 1024, // 256 MB
            reply_port: DEFAULT_REPLY_PORT,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Socket address the request socket binds to
    pub fn request_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.request_port)
    }

    /// Receive timeout as a Duration
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the bind address for the request socket
    pub fn bind_addr(mut self, addr: IpAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the request port
    pub fn request_port(mut self, port: u16) -> Self {
        self.config.request_port = port;
        self
    }

    /// Set the reply destination port
    pub fn reply_port(mut self, port: u16) -> Self {
        self.config.reply_port = port;
        self
    }

    /// Set the receive timeout (in milliseconds)
    pub fn recv_timeout_ms(mut self, ms: u64) -> Self {
        self.config.recv_timeout_ms = ms;
        self
    }

    /// Set the requested receive buffer size (in bytes)
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    pub fn build(self) -> Result<Config> {
        // A zero timeout means "block forever" to the OS and the worker
        // would never observe a stop request.
        if self.config.recv_timeout_ms == 0 {
            return Err(ProxyError::Config(
                "receive timeout must be non-zero".to_string(),
            ));
        }
        if self.config.reply_port == 0 {
            return Err(ProxyError::Config("reply port must be non-zero".to_string()));
        }
        Ok(self.config)
    }
}

/// Backend (Thrift over TLS) connection configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// QRate Thrift API host
    pub host: String,

    /// QRate Thrift API port
    pub port: u16,

    /// Client x509 certificate (PEM)
    pub certfile: PathBuf,

    /// Client private key (PEM, PKCS#8 or RSA)
    pub keyfile: PathBuf,

    /// CA bundle used to authenticate the API server (PEM)
    pub ca_certs: PathBuf,

    /// Name checked against the server certificate; defaults to `host`
    pub server_name: Option<String>,

    /// TCP connect timeout (milliseconds)
    pub connect_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9090,
            certfile: PathBuf::from("ssl/client.crt"),
            keyfile: PathBuf::from("ssl/client.key"),
            ca_certs: PathBuf::from("ssl/pair_ca_bundle.crt"),
            server_name: None,
            connect_timeout_ms: 5000,
        }
    }
}

impl BackendConfig {
    /// Create a new backend config builder
    pub fn builder() -> BackendConfigBuilder {
        BackendConfigBuilder::default()
    }

    /// Name used for TLS server verification
    pub fn tls_server_name(&self) -> &str {
        self.server_name.as_deref().unwrap_or(&self.host)
    }
}

/// Builder for BackendConfig
#[derive(Default)]
pub struct BackendConfigBuilder {
    config: BackendConfig,
}

impl BackendConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn certfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.certfile = path.into();
        self
    }

    pub fn keyfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.keyfile = path.into();
        self
    }

    pub fn ca_certs(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ca_certs = path.into();
        self
    }

    /// Override the name checked against the server certificate
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = Some(name.into());
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn build(self) -> BackendConfig {
        self.config
    }
}
