//! Reply definitions
//!
//! A decoded reply datagram as seen by a requester.

use bytes::Bytes;

/// Body of a reply, split on the sign of the result code
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `result_code >= 0`; the command-specific body follows the header
    Success { payload: Bytes },

    /// `result_code < 0`
    Error {
        result_code: i16,
        retry_after: f64,
        message: Bytes,
    },
}

impl Reply {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success { .. })
    }

    /// Error message as lossy UTF-8, if this is an error reply
    pub fn error_message(&self) -> Option<String> {
        match self {
            Reply::Error { message, .. } => Some(String::from_utf8_lossy(message).into_owned()),
            Reply::Success { .. } => None,
        }
    }
}
