//! Command definitions
//!
//! Command codes carried in request headers and result codes carried in
//! reply headers.

/// Result code of a successful reply
pub const RESULT_CODE_SUCCESS: i16 = 0;

/// Result code used when the backend could not be reached or failed unexpectedly
pub const RESULT_CODE_BACKEND_CONNECTION: i16 = -201;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandCode {
    GetKeyById = 0x0001,
    GetKeyByLength = 0x0002,
}

impl CommandCode {
    /// Map a raw header value to a known command
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0x0001 => Some(CommandCode::GetKeyById),
            0x0002 => Some(CommandCode::GetKeyByLength),
            _ => None,
        }
    }

    /// Raw wire value
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}
