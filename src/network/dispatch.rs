//! Request dispatch
//!
//! Turns one request datagram into one reply datagram, or into a drop.
//! No sockets here: the worker owns I/O, this owns protocol decisions.
//!
//! ## Decision Table
//! ```text
//! short header / wrong system magic / unknown command / short body → drop
//! backend Ok                                                       → success reply
//! backend Client / Server / Connection error                       → error reply
//! handler panic                                                    → -201 error reply
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use thiserror::Error;

use crate::backend::{BackendError, KeyService};
use crate::error::{ProxyError, Result};
use crate::protocol::{
    encode_error_reply, encode_key_by_id_reply, encode_key_by_length_reply, split_request,
    CommandCode, KeyByIdRequestBody, KeyByLengthRequestBody, WireRecord,
    RESULT_CODE_BACKEND_CONNECTION, SYSTEM_MAGIC,
};

/// Why a handler did not produce a success reply
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request body could not be decoded; the datagram is dropped
    #[error(transparent)]
    Malformed(#[from] ProxyError),

    /// The backend call failed; the requester gets an error reply
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A command handler: backend, command magic, request body → reply datagram
pub type Handler<B> = fn(&mut B, u16, &[u8]) -> std::result::Result<Bytes, DispatchError>;

/// Routes request datagrams to command handlers
pub struct Dispatcher<B> {
    backend: B,
    handlers: HashMap<CommandCode, Handler<B>>,
}

impl<B: KeyService> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        let mut handlers: HashMap<CommandCode, Handler<B>> = HashMap::new();
        handlers.insert(CommandCode::GetKeyById, handle_get_key_by_id::<B>);
        handlers.insert(CommandCode::GetKeyByLength, handle_get_key_by_length::<B>);
        Self { backend, handlers }
    }

    /// Process one request datagram
    ///
    /// `Ok` carries the reply to send. `Err` is always a
    /// [`ProxyError::Format`]: the datagram must be dropped without a reply.
    pub fn process(&mut self, datagram: &[u8]) -> Result<Bytes> {
        let (header, body) = split_request(datagram)?;

        if header.system_magic != SYSTEM_MAGIC {
            return Err(ProxyError::Format(format!(
                "Wrong system magic: 0x{:08x}",
                header.system_magic
            )));
        }

        let handler = CommandCode::from_u16(header.command_code)
            .and_then(|code| self.handlers.get(&code).copied())
            .ok_or_else(|| {
                ProxyError::Format(format!("Wrong command code {}", header.command_code))
            })?;

        // A panicking backend must not take the worker down with it
        let backend = &mut self.backend;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handler(backend, header.command_magic, body)
        }));

        match outcome {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(DispatchError::Malformed(e))) => Err(e),
            Ok(Err(DispatchError::Backend(e))) => Ok(error_reply(header.command_magic, &e)),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    "Handler for command {} panicked: {}",
                    header.command_code,
                    message
                );
                Ok(encode_error_reply(
                    header.command_magic,
                    RESULT_CODE_BACKEND_CONNECTION,
                    0.0,
                    message.as_bytes(),
                ))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Translate a backend failure into an error reply
pub fn error_reply(command_magic: u16, error: &BackendError) -> Bytes {
    match error {
        BackendError::Client { code, message } => {
            tracing::warn!("Client error {} from backend: {}", code, message);
            encode_error_reply(command_magic, clamp_code(*code), 0.0, message.as_bytes())
        }
        BackendError::Server {
            code,
            message,
            retry_after,
        } => {
            tracing::warn!(
                "Server error {} from backend: {} Retry after {}",
                code,
                message,
                retry_after
            );
            encode_error_reply(command_magic, clamp_code(*code), *retry_after, message.as_bytes())
        }
        BackendError::Connection(message) => {
            tracing::warn!("Backend failure: {}", message);
            encode_error_reply(
                command_magic,
                RESULT_CODE_BACKEND_CONNECTION,
                0.0,
                message.as_bytes(),
            )
        }
    }
}

/// Backend codes are 32-bit; the wire field is 16-bit
fn clamp_code(code: i32) -> i16 {
    code.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

// =============================================================================
// Handlers
// =============================================================================

fn handle_get_key_by_length<B: KeyService>(
    backend: &mut B,
    command_magic: u16,
    body: &[u8],
) -> std::result::Result<Bytes, DispatchError> {
    let request = KeyByLengthRequestBody::decode(body)?;
    tracing::info!("Request key by length {}", request.key_length);

    let key = backend.get_by_length(request.key_length)?;
    tracing::info!("Got key {} from backend", key.key_id);

    Ok(encode_key_by_length_reply(
        command_magic,
        key.key_id,
        key.expiration_time,
        &key.key_body,
    ))
}

fn handle_get_key_by_id<B: KeyService>(
    backend: &mut B,
    command_magic: u16,
    body: &[u8],
) -> std::result::Result<Bytes, DispatchError> {
    let request = KeyByIdRequestBody::decode(body)?;
    tracing::info!("Request key by id {}", request.key_id);

    let key = backend.get_by_id(&request.key_id)?;
    tracing::info!("Got key {} from backend", request.key_id);

    Ok(encode_key_by_id_reply(command_magic, &key.key_body))
}
