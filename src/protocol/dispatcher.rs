use crate::core::pdu::Pdu;
use crate::error::{constants, ProtocolError, Result};
use crate::session::Session;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Synchronous PDU handler, invoked from the session's extraction loop.
pub type HandlerFn = dyn Fn(&Session, &Pdu) + Send + Sync + 'static;

/// Per-command PDU dispatcher.
///
/// Handlers registered with [`Dispatcher::register_any`] see every PDU;
/// handlers registered for a command name see only that command. Handlers
/// are cloned out of the table before they run, so a handler may register
/// more handlers or call back into the session without deadlocking.
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<Cow<'static, str>, Vec<Arc<HandlerFn>>>>>,
    any: Arc<RwLock<Vec<Arc<HandlerFn>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            any: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn register<F>(&self, command: &str, handler: F) -> Result<()>
    where
        F: Fn(&Session, &Pdu) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;

        handlers
            .entry(Cow::Owned(command.to_string()))
            .or_default()
            .push(Arc::new(handler));
        Ok(())
    }

    pub fn register_any<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&Session, &Pdu) + Send + Sync + 'static,
    {
        let mut any = self.any.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string())
        })?;
        any.push(Arc::new(handler));
        Ok(())
    }

    /// Number of handlers that would see a PDU for `command`
    pub fn handler_count(&self, command: &str) -> usize {
        let any = self.any.read().unwrap_or_else(PoisonError::into_inner).len();
        let specific = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(command)
            .map_or(0, Vec::len);
        any + specific
    }

    /// Run the generic handlers, then the handlers for `pdu.command`.
    pub fn dispatch(&self, session: &Session, pdu: &Pdu) {
        let any: Vec<Arc<HandlerFn>> = self
            .any
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in any {
            handler(session, pdu);
        }

        let specific: Vec<Arc<HandlerFn>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pdu.command.as_str())
            .cloned()
            .unwrap_or_default();
        for handler in specific {
            handler(session, pdu);
        }
    }
}
