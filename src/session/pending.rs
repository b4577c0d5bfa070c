//! Pending-response table: sequence number to one-shot completion.

use crate::core::pdu::Pdu;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::oneshot;

/// One-shot PDU callback (response handler or send completion).
pub type PduHandler = Box<dyn FnOnce(Pdu) + Send + 'static>;

/// Completion handle for one outstanding request.
pub enum Pending {
    /// Invoked synchronously from the extraction loop
    Callback(PduHandler),
    /// Resolves a `Session::request` future
    Waiter(oneshot::Sender<Pdu>),
}

impl Pending {
    /// Hand the response over. Returns false if a waiter was already gone.
    pub fn complete(self, pdu: Pdu) -> bool {
        match self {
            Pending::Callback(handler) => {
                handler(pdu);
                true
            }
            Pending::Waiter(tx) => tx.send(pdu).is_ok(),
        }
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pending::Callback(_) => f.write_str("Pending::Callback"),
            Pending::Waiter(_) => f.write_str("Pending::Waiter"),
        }
    }
}

/// At most one entry per sequence number; a second insert replaces the first.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<u32, Pending>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry that was replaced, if any
    pub fn insert(&mut self, sequence_number: u32, pending: Pending) -> Option<Pending> {
        self.entries.insert(sequence_number, pending)
    }

    /// Undo an [`insert`](Self::insert): drop the current entry and put back
    /// the one it replaced.
    pub fn restore(&mut self, sequence_number: u32, replaced: Option<Pending>) {
        match replaced {
            Some(previous) => {
                self.entries.insert(sequence_number, previous);
            }
            None => {
                self.entries.remove(&sequence_number);
            }
        }
    }

    pub fn take(&mut self, sequence_number: u32) -> Option<Pending> {
        self.entries.remove(&sequence_number)
    }

    pub fn contains(&self, sequence_number: u32) -> bool {
        self.entries.contains_key(&sequence_number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard every entry and return their sequence numbers, sorted.
    ///
    /// Dropping a waiter resolves its future with `RequestAbandoned`;
    /// callbacks are never invoked.
    pub fn drain(&mut self) -> Vec<u32> {
        let mut sequence_numbers: Vec<u32> = self.entries.drain().map(|(seq, _)| seq).collect();
        sequence_numbers.sort_unstable();
        sequence_numbers
    }
}
