//! Scripted KeyService shared by the network tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use qrate_udp_proxy::protocol::KeyId;
use qrate_udp_proxy::{BackendError, KeyMaterial, KeyService};

/// A call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ByLength(u32),
    ById(KeyId),
}

/// One queued answer
enum Scripted {
    Answer(Result<KeyMaterial, BackendError>),
    Panic(String),
}

/// Replays queued outcomes in order and reports every call on a channel
#[derive(Clone)]
pub struct MockBackend {
    outcomes: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Sender<Call>,
    connect_error: Option<BackendError>,
}

impl MockBackend {
    pub fn new() -> (Self, Receiver<Call>) {
        let (calls, calls_rx) = channel::unbounded();
        let backend = Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            calls,
            connect_error: None,
        };
        (backend, calls_rx)
    }

    /// A backend whose connect() fails
    pub fn unreachable(message: &str) -> Self {
        let (mut backend, _) = Self::new();
        backend.connect_error = Some(BackendError::Connection(message.to_string()));
        backend
    }

    pub fn push(&self, outcome: Result<KeyMaterial, BackendError>) {
        self.outcomes.lock().push_back(Scripted::Answer(outcome));
    }

    /// Make the next call panic with `message`
    pub fn push_panic(&self, message: &str) {
        self.outcomes
            .lock()
            .push_back(Scripted::Panic(message.to_string()));
    }

    fn next(&self, call: Call) -> Result<KeyMaterial, BackendError> {
        let _ = self.calls.send(call);
        let scripted = self.outcomes.lock().pop_front();
        match scripted {
            Some(Scripted::Answer(outcome)) => outcome,
            Some(Scripted::Panic(message)) => panic!("{}", message),
            None => Err(BackendError::Connection("no scripted outcome".to_string())),
        }
    }
}

impl KeyService for MockBackend {
    fn connect(&mut self) -> Result<(), BackendError> {
        match &self.connect_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn get_by_length(&mut self, length: u32) -> Result<KeyMaterial, BackendError> {
        self.next(Call::ByLength(length))
    }

    fn get_by_id(&mut self, key_id: &KeyId) -> Result<KeyMaterial, BackendError> {
        self.next(Call::ById(*key_id))
    }
}

/// Key material as the backend would return it
pub fn key(id_byte: u8, expiration_time: u64, body: Vec<u8>) -> KeyMaterial {
    KeyMaterial {
        key_id: KeyId([id_byte; 16]),
        expiration_time,
        key_body: body,
    }
}
