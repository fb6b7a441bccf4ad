//! Backend Module
//!
//! The key-issuance service the gateway forwards requests to.
//!
//! ## Layers
//! ```text
//! KeyService (trait)         ← what the gateway calls
//!     │
//! QkdClient                  ← QkdApiService RPCs, lazy reconnect
//!     │
//! Connector                  ← opens the stream (TlsConnector in production)
//!     │
//! BinaryProtocol             ← Thrift binary protocol, buffered writes
//!     │
//! rustls StreamOwned         ← mutually authenticated TLS over TCP
//! ```

pub mod thrift;
pub mod tls;
mod qkd;

pub use qkd::{call_get_by_id, call_get_by_length, QkdClient};
pub use tls::TlsConnector;

use std::io::{Read, Write};

use thiserror::Error;

use crate::protocol::KeyId;

/// Key material returned by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Identifier the peer side uses to fetch the same key
    pub key_id: KeyId,

    /// Expiration time as reported by the backend
    pub expiration_time: u64,

    /// Raw key bytes
    pub key_body: Vec<u8>,
}

/// Outcome categories of a failed backend call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The request itself was rejected (bad length, unknown id, ...)
    #[error("Client error {code}: {message}")]
    Client { code: i32, message: String },

    /// Transient failure on the backend side
    #[error("Server error {code}: {message} (retry after {retry_after}s)")]
    Server {
        code: i32,
        message: String,
        retry_after: f64,
    },

    /// Anything else: connection failures, protocol violations
    #[error("{0}")]
    Connection(String),
}

/// Opens the byte stream a [`QkdClient`] speaks Thrift over
///
/// Called once at startup and again after every transport failure.
pub trait Connector {
    type Stream: Read + Write;

    fn connect(&mut self) -> crate::error::Result<Self::Stream>;
}

/// Blocking key-issuance service
///
/// Implementations are driven from a single worker thread and need not be
/// `Sync`.
pub trait KeyService: Send {
    /// Establish the backend session. Called once before the gateway starts.
    fn connect(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Issue a new key of `length` bytes
    fn get_by_length(&mut self, length: u32) -> Result<KeyMaterial, BackendError>;

    /// Fetch a key previously issued to the peer side
    fn get_by_id(&mut self, key_id: &KeyId) -> Result<KeyMaterial, BackendError>;
}

impl<T: KeyService + ?Sized> KeyService for Box<T> {
    fn connect(&mut self) -> Result<(), BackendError> {
        (**self).connect()
    }

    fn get_by_length(&mut self, length: u32) -> Result<KeyMaterial, BackendError> {
        (**self).get_by_length(length)
    }

    fn get_by_id(&mut self, key_id: &KeyId) -> Result<KeyMaterial, BackendError> {
        (**self).get_by_id(key_id)
    }
}
