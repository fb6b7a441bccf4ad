//! # QRate UDP Proxy
//!
//! A UDP front end for the QRate quantum key distribution API:
//! - Fixed-format, big-endian command datagrams in
//! - Calls forwarded to the Thrift API over mutually authenticated TLS
//! - Key material or an error description back as a reply datagram
//! - One worker, one datagram at a time, cooperative shutdown
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Requesters (UDP, port 5551)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ request datagram
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Gateway Worker                             │
//! │            (receive → dispatch → reply)                      │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │ reply datagram
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │   Dispatcher    │                │  Reply Socket   │
//!   │ (command table) │                │ (sender IP:5552)│
//!   └────────┬────────┘                └─────────────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │   KeyService    │
//!   │ (Thrift / TLS)  │
//!   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod backend;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ProxyError, Result};
pub use config::{BackendConfig, Config};
pub use backend::{BackendError, Connector, KeyMaterial, KeyService, QkdClient, TlsConnector};
pub use network::{Gateway, GatewayState};
pub use client::{GatewayClient, IssuedKey};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the proxy
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
