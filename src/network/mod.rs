//! Network Module
//!
//! UDP gateway: socket setup, worker loop and dispatch.
//!
//! ## Architecture
//! - One request socket, one reply socket
//! - Single worker thread, one datagram at a time
//! - Commands routed through Dispatcher to the KeyService

mod server;
mod worker;
pub mod dispatch;
pub mod socket;

pub use server::{Gateway, GatewayState};
pub use dispatch::{error_reply, DispatchError, Dispatcher};
