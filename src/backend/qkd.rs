//! QRate QkdApiService client
//!
//! ## Service
//! ```text
//! KeyData get_by_length(1: i32 length)  throws (1: QkdClientError, 2: QkdServerError)
//! KeyData get_by_id(1: binary key_id)   throws (1: QkdClientError, 2: QkdServerError)
//!
//! KeyData        { 1: binary key_id, 2: i64 expiration_time, 3: binary key_body }
//! QkdClientError { 1: i32 error_code, 2: string message }
//! QkdServerError { 1: i32 error_code, 2: string message, 3: double retry_after }
//! ```

use std::io::{Read, Write};

use crate::config::BackendConfig;
use crate::error::{ProxyError, Result};
use crate::protocol::KeyId;
use super::thrift::{message_type, ttype, BinaryProtocol};
use super::tls::TlsConnector;
use super::{BackendError, Connector, KeyMaterial, KeyService};

const METHOD_GET_BY_LENGTH: &str = "get_by_length";
const METHOD_GET_BY_ID: &str = "get_by_id";

/// Client for the QRate Thrift API
///
/// The connection is opened by [`KeyService::connect`]. If a call fails at
/// the transport level the connection is discarded and the next call
/// reconnects through the same [`Connector`].
pub struct QkdClient<C: Connector = TlsConnector> {
    connector: C,
    protocol: Option<BinaryProtocol<C::Stream>>,
    seq_id: i32,
}

impl QkdClient<TlsConnector> {
    /// Client speaking to the API over mutual TLS
    pub fn new(config: BackendConfig) -> Self {
        Self::with_connector(TlsConnector::new(config))
    }
}

impl<C: Connector> QkdClient<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            protocol: None,
            seq_id: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.protocol.is_some()
    }

    fn open(&mut self) -> Result<()> {
        let stream = self.connector.connect()?;
        self.protocol = Some(BinaryProtocol::new(stream));
        Ok(())
    }

    fn next_seq_id(&mut self) -> i32 {
        self.seq_id = self.seq_id.wrapping_add(1);
        self.seq_id
    }

    /// Run one call, reconnecting first if needed and dropping the
    /// connection when it fails at the transport level
    fn with_protocol<F>(&mut self, call: F) -> std::result::Result<KeyMaterial, BackendError>
    where
        F: FnOnce(&mut BinaryProtocol<C::Stream>, i32) -> std::result::Result<KeyMaterial, BackendError>,
    {
        if self.protocol.is_none() {
            self.open().map_err(|e| BackendError::Connection(e.to_string()))?;
        }
        let seq_id = self.next_seq_id();
        let protocol = self
            .protocol
            .as_mut()
            .ok_or_else(|| BackendError::Connection("Not connected".to_string()))?;

        let result = call(protocol, seq_id);
        if let Err(BackendError::Connection(ref message)) = result {
            tracing::warn!("Dropping backend connection: {}", message);
            self.protocol = None;
        }
        result
    }
}

impl<C> KeyService for QkdClient<C>
where
    C: Connector + Send,
    C::Stream: Send,
{
    fn connect(&mut self) -> std::result::Result<(), BackendError> {
        self.open().map_err(|e| BackendError::Connection(e.to_string()))
    }

    fn get_by_length(&mut self, length: u32) -> std::result::Result<KeyMaterial, BackendError> {
        let length = i32::try_from(length)
            .map_err(|_| BackendError::Connection(format!("Key length {} out of range", length)))?;
        self.with_protocol(|protocol, seq_id| call_get_by_length(protocol, seq_id, length))
    }

    fn get_by_id(&mut self, key_id: &KeyId) -> std::result::Result<KeyMaterial, BackendError> {
        let key_id = *key_id;
        self.with_protocol(|protocol, seq_id| call_get_by_id(protocol, seq_id, &key_id))
    }
}

// =============================================================================
// Calls
// =============================================================================

/// `get_by_length` over an established protocol
pub fn call_get_by_length<S: Read + Write>(
    protocol: &mut BinaryProtocol<S>,
    seq_id: i32,
    length: i32,
) -> std::result::Result<KeyMaterial, BackendError> {
    call(protocol, METHOD_GET_BY_LENGTH, seq_id, |p| {
        p.write_field_begin(ttype::I32, 1);
        p.write_i32(length);
    })
}

/// `get_by_id` over an established protocol
pub fn call_get_by_id<S: Read + Write>(
    protocol: &mut BinaryProtocol<S>,
    seq_id: i32,
    key_id: &KeyId,
) -> std::result::Result<KeyMaterial, BackendError> {
    call(protocol, METHOD_GET_BY_ID, seq_id, |p| {
        p.write_field_begin(ttype::STRING, 1);
        p.write_binary(key_id.as_bytes());
    })
}

fn call<S, F>(
    protocol: &mut BinaryProtocol<S>,
    method: &str,
    seq_id: i32,
    write_args: F,
) -> std::result::Result<KeyMaterial, BackendError>
where
    S: Read + Write,
    F: FnOnce(&mut BinaryProtocol<S>),
{
    exchange(protocol, method, seq_id, write_args)
        .unwrap_or_else(|e| Err(BackendError::Connection(e.to_string())))
}

/// Outer error: transport or protocol failure. Inner: the service's answer.
fn exchange<S, F>(
    protocol: &mut BinaryProtocol<S>,
    method: &str,
    seq_id: i32,
    write_args: F,
) -> Result<std::result::Result<KeyMaterial, BackendError>>
where
    S: Read + Write,
    F: FnOnce(&mut BinaryProtocol<S>),
{
    protocol.write_message_begin(method, message_type::CALL, seq_id);
    write_args(protocol);
    protocol.write_field_stop();
    protocol.flush()?;

    let header = protocol.read_message_begin()?;
    if header.message_type == message_type::EXCEPTION {
        let exception = protocol.read_application_exception()?;
        return Ok(Err(BackendError::Connection(exception.to_string())));
    }
    if header.message_type != message_type::REPLY {
        return Err(ProxyError::Rpc(format!(
            "Unexpected message type {} for {}",
            header.message_type, method
        )));
    }
    if header.name != method {
        return Err(ProxyError::Rpc(format!(
            "Reply for {:?} while waiting for {:?}",
            header.name, method
        )));
    }
    if header.seq_id != seq_id {
        return Err(ProxyError::Rpc(format!(
            "Out of sequence reply: got {}, expected {}",
            header.seq_id, seq_id
        )));
    }

    read_result(protocol, method)
}

fn read_result<S: Read + Write>(
    protocol: &mut BinaryProtocol<S>,
    method: &str,
) -> Result<std::result::Result<KeyMaterial, BackendError>> {
    let mut outcome = None;
    loop {
        let (field_type, id) = protocol.read_field_begin()?;
        match (id, field_type) {
            (_, ttype::STOP) => break,
            (0, ttype::STRUCT) => outcome = Some(Ok(read_key_data(protocol)?)),
            (1, ttype::STRUCT) => outcome = Some(Err(read_client_error(protocol)?)),
            (2, ttype::STRUCT) => outcome = Some(Err(read_server_error(protocol)?)),
            _ => protocol.skip(field_type)?,
        }
    }

    outcome.ok_or_else(|| ProxyError::Rpc(format!("{} failed: unknown result", method)))
}

fn read_key_data<S: Read + Write>(protocol: &mut BinaryProtocol<S>) -> Result<KeyMaterial> {
    let mut key = KeyMaterial {
        key_id: KeyId::default(),
        expiration_time: 0,
        key_body: Vec::new(),
    };
    loop {
        let (field_type, id) = protocol.read_field_begin()?;
        match (id, field_type) {
            (_, ttype::STOP) => break,
            (1, ttype::STRING) => key.key_id = KeyId::from_slice(&protocol.read_binary()?),
            (2, ttype::I64) => {
                let expiration = protocol.read_i64()?;
                key.expiration_time = u64::try_from(expiration).map_err(|_| {
                    ProxyError::Rpc(format!("Negative expiration time: {}", expiration))
                })?;
            }
            (3, ttype::STRING) => key.key_body = protocol.read_binary()?,
            _ => protocol.skip(field_type)?,
        }
    }
    Ok(key)
}

fn read_client_error<S: Read + Write>(protocol: &mut BinaryProtocol<S>) -> Result<BackendError> {
    let mut code = 0;
    let mut message = String::new();
    loop {
        let (field_type, id) = protocol.read_field_begin()?;
        match (id, field_type) {
            (_, ttype::STOP) => break,
            (1, ttype::I32) => code = protocol.read_i32()?,
            (2, ttype::STRING) => message = protocol.read_string()?,
            _ => protocol.skip(field_type)?,
        }
    }
    Ok(BackendError::Client { code, message })
}

fn read_server_error<S: Read + Write>(protocol: &mut BinaryProtocol<S>) -> Result<BackendError> {
    let mut code = 0;
    let mut message = String::new();
    let mut retry_after = 0.0;
    loop {
        let (field_type, id) = protocol.read_field_begin()?;
        match (id, field_type) {
            (_, ttype::STOP) => break,
            (1, ttype::I32) => code = protocol.read_i32()?,
            (2, ttype::STRING) => message = protocol.read_string()?,
            (3, ttype::DOUBLE) => retry_after = protocol.read_double()?,
            _ => protocol.skip(field_type)?,
        }
    }
    Ok(BackendError::Server {
        code,
        message,
        retry_after,
    })
}
