//! TLS transport for the backend connection
//!
//! Builds a mutually authenticated `rustls` client configuration from PEM
//! files and opens blocking TLS streams with it.

use std::fs::File;
use std::io::{BufReader, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::{Certificate, ClientConfig, ClientConnection, PrivateKey, RootCertStore, ServerName, StreamOwned};
use rustls_pemfile::{certs, pkcs8_private_keys, rsa_private_keys};

use crate::config::BackendConfig;
use crate::error::{ProxyError, Result};
use super::Connector;

/// Blocking TLS stream to the backend
pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Build the client configuration: CA bundle as trust roots, client
/// certificate + key for client authentication
pub fn load_client_config(config: &BackendConfig) -> Result<ClientConfig> {
    let roots = load_root_store(&config.ca_certs)?;
    let chain = load_certificates(&config.certfile)?;
    let key = load_private_key(&config.keyfile)?;

    ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)
        .map_err(|e| ProxyError::Tls(format!("Failed to set client certificate: {e}")))
}

/// Open a TCP connection and wrap it in TLS
///
/// The handshake itself completes lazily on first read/write.
pub fn connect(config: &BackendConfig, tls_config: Arc<ClientConfig>) -> Result<TlsStream> {
    let server_name = ServerName::try_from(config.tls_server_name())
        .map_err(|e| ProxyError::Tls(format!("Invalid server name {:?}: {e}", config.tls_server_name())))?;

    let tcp = connect_tcp(&config.host, config.port, Duration::from_millis(config.connect_timeout_ms))?;
    tcp.set_nodelay(true)?;

    let connection = ClientConnection::new(tls_config, server_name)
        .map_err(|e| ProxyError::Tls(format!("TLS setup failed: {e}")))?;

    Ok(StreamOwned::new(connection, tcp))
}

/// Production [`Connector`]: mutual TLS to the configured API endpoint
///
/// The PEM files are read on the first connect and the resulting client
/// configuration is reused for every reconnect.
pub struct TlsConnector {
    config: BackendConfig,
    tls_config: Option<Arc<ClientConfig>>,
}

impl TlsConnector {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            tls_config: None,
        }
    }

    fn client_config(&mut self) -> Result<Arc<ClientConfig>> {
        if let Some(cfg) = &self.tls_config {
            return Ok(Arc::clone(cfg));
        }
        let cfg = Arc::new(load_client_config(&self.config)?);
        self.tls_config = Some(Arc::clone(&cfg));
        Ok(cfg)
    }
}

impl Connector for TlsConnector {
    type Stream = TlsStream;

    fn connect(&mut self) -> Result<TlsStream> {
        let tls_config = self.client_config()?;
        let mut stream = connect(&self.config, tls_config)?;

        // Certificate problems must surface here, not on the first call
        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(|e| ProxyError::Tls(format!("Handshake failed: {e}")))?;
        }

        tracing::info!(
            "Connected to QRate Thrift API at {}:{}",
            self.config.host,
            self.config.port
        );
        Ok(stream)
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = None;

    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(e) => ProxyError::Io(e),
        None => ProxyError::Config(format!("No address found for {}:{}", host, port)),
    })
}

// =============================================================================
// PEM loading
// =============================================================================

fn load_root_store(path: &Path) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    for cert in load_certificates(path)? {
        store
            .add(&cert)
            .map_err(|e| ProxyError::Tls(format!("Failed to add CA cert from {}: {e}", path.display())))?;
    }
    Ok(store)
}

/// Load every certificate in a PEM file; an empty file is an error
pub fn load_certificates(path: &Path) -> Result<Vec<Certificate>> {
    let mut reader = BufReader::new(File::open(path)?);
    let ders = certs(&mut reader)
        .map_err(|_| ProxyError::Tls(format!("Failed to parse certificates in {}", path.display())))?;

    if ders.is_empty() {
        return Err(ProxyError::Tls(format!("No certificates found in {}", path.display())));
    }
    Ok(ders.into_iter().map(Certificate).collect())
}

/// Load the first PKCS#8 or RSA private key in a PEM file
pub fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let mut pem = Vec::new();
    File::open(path)?.read_to_end(&mut pem)?;

    let pkcs8 = pkcs8_private_keys(&mut pem.as_slice())
        .map_err(|_| ProxyError::Tls(format!("Failed to parse PKCS8 key in {}", path.display())))?;
    if let Some(key) = pkcs8.into_iter().next() {
        return Ok(PrivateKey(key));
    }

    let rsa = rsa_private_keys(&mut pem.as_slice())
        .map_err(|_| ProxyError::Tls(format!("Failed to parse RSA key in {}", path.display())))?;
    if let Some(key) = rsa.into_iter().next() {
        return Ok(PrivateKey(key));
    }

    Err(ProxyError::Tls(format!("No private key found in {}", path.display())))
}
