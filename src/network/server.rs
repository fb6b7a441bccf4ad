//! UDP Gateway
//!
//! Owns the socket lifecycle and the single worker thread.
//!
//! ## Lifecycle
//! ```text
//! bind() ──► Created ──start()──► Listening ──stop()──► Stopped
//!               │                                          ▲
//!               └───────────────── stop() ─────────────────┘
//! ```

use std::net::SocketAddr;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use crate::backend::KeyService;
use crate::config::Config;
use crate::error::{ProxyError, Result};
use super::socket;
use super::worker::Worker;

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Created,
    Listening,
    Stopped,
}

enum State<B> {
    Created {
        worker: Worker<B>,
        shutdown: Sender<()>,
    },
    Listening {
        handle: JoinHandle<()>,
        shutdown: Sender<()>,
    },
    Stopped,
}

/// UDP front end for a [`KeyService`]
pub struct Gateway<B: KeyService + 'static> {
    local_addr: SocketAddr,
    state: Mutex<State<B>>,
}

impl<B: KeyService + 'static> Gateway<B> {
    /// Bind both sockets and connect the backend
    ///
    /// Any failure here is fatal: the gateway never reaches `Created`.
    pub fn bind(config: Config, mut backend: B) -> Result<Self> {
        let request_socket = socket::bind_receiver(
            config.request_addr(),
            config.recv_timeout(),
            config.recv_buffer_size,
        )?;
        let local_addr = request_socket.local_addr()?;
        tracing::debug!("Listening for requests on {}", local_addr);

        let reply_socket = socket::open_sender(local_addr)?;

        if let Err(e) = backend.connect() {
            tracing::error!("Failed to connect to backend: {}", e);
            return Err(e.into());
        }

        let (shutdown, shutdown_rx) = channel::bounded(1);
        let worker = Worker::new(
            request_socket,
            reply_socket,
            config.reply_port,
            config.recv_timeout(),
            backend,
            shutdown_rx,
        );

        Ok(Self {
            local_addr,
            state: Mutex::new(State::Created { worker, shutdown }),
        })
    }

    /// Address the request socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> GatewayState {
        match *self.state.lock() {
            State::Created { .. } => GatewayState::Created,
            State::Listening { .. } => GatewayState::Listening,
            State::Stopped => GatewayState::Stopped,
        }
    }

    /// Launch the worker thread
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Stopped) {
            State::Created { worker, shutdown } => {
                let handle = thread::Builder::new()
                    .name("gateway-worker".to_string())
                    .spawn(move || worker.run())?;
                *state = State::Listening { handle, shutdown };
                tracing::info!("Gateway listening on {}", self.local_addr);
                Ok(())
            }
            other => {
                let current = match &other {
                    State::Listening { .. } => "listening",
                    _ => "stopped",
                };
                *state = other;
                Err(ProxyError::State(format!("cannot start a {} gateway", current)))
            }
        }
    }

    /// Signal the worker and wait for it to exit
    ///
    /// After this returns no further datagram is processed. Calling it more
    /// than once is harmless.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let State::Listening { handle, shutdown } = std::mem::replace(&mut *state, State::Stopped) {
            // A full channel means a stop is already pending
            let _ = shutdown.try_send(());
            drop(shutdown);

            if handle.join().is_err() {
                tracing::error!("Gateway worker panicked");
            }
            tracing::info!("Gateway on {} stopped", self.local_addr);
        }
    }
}

impl<B: KeyService + 'static> Drop for Gateway<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
