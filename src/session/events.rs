//! Typed session events and a small fan-out bus.

use crate::core::pdu::Pdu;
use crate::error::ProtocolError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Everything a session reports to its observers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Plaintext connection established
    Connect,
    /// TLS connection established (handshake completed)
    SecureConnect,
    /// A PDU was decoded, delivered before response correlation
    Pdu(Pdu),
    /// A PDU was written to the transport
    Sent(Pdu),
    /// Pending handlers discarded because the transport closed or was rebound
    Abandoned { sequence_numbers: Vec<u32> },
    /// Transport closed
    Close,
    /// Transport or decode error
    Error(Arc<ProtocolError>),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Connect => "connect",
            SessionEvent::SecureConnect => "secureConnect",
            SessionEvent::Pdu(_) => "pdu",
            SessionEvent::Sent(_) => "send",
            SessionEvent::Abandoned { .. } => "abandoned",
            SessionEvent::Close => "close",
            SessionEvent::Error(_) => "error",
        }
    }
}

/// Unbounded fan-out to any number of subscribers; dropped receivers are pruned on emit.
#[derive(Debug)]
pub struct EventBus<E> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<E>>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiverStream<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        UnboundedReceiverStream::new(rx)
    }

    pub fn emit(&self, event: E) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
