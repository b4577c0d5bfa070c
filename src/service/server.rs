//! # Session Server
//!
//! Accepts inbound connections, plaintext or TLS, and turns each into a
//! [`Session`] tracked in a live registry until its transport closes.
//!
//! TLS is decided once, when the server is built: with a certificate and key
//! every accepted connection goes through the TLS handshake and the default
//! listen port is 3550, otherwise 2775.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{default_port, ServerConfig, SessionConfig};
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::Registry;
use crate::session::{EventBus, Role, Session, SessionId};
use crate::transport::tls::TlsServerConfig;
use crate::transport::BoxedStream;
use crate::utils::metrics::{global_metrics, Timer};

/// Synchronous listener run for every accepted session before its transport is bound
pub type SessionListener = dyn Fn(&Session) + Send + Sync;

/// Server construction parameters
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Interface used when `listen` gets no address or only a port
    pub host: String,
    /// Certificate and key; `Some` makes this a TLS server
    pub tls: Option<TlsServerConfig>,
    /// Settings applied to every accepted session
    pub session: SessionConfig,
    /// Live sessions allowed at once; further connections are dropped
    pub max_connections: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            tls: None,
            session: SessionConfig::default(),
            max_connections: ServerConfig::default().max_connections,
        }
    }
}

impl ServerOptions {
    pub fn from_config(server: &ServerConfig, session: &SessionConfig) -> Self {
        let tls = match (&server.tls_cert_path, &server.tls_key_path) {
            (Some(cert), Some(key)) => Some(TlsServerConfig::new(cert, key)),
            _ => None,
        };
        Self {
            host: server.host.clone(),
            tls,
            session: session.clone(),
            max_connections: server.max_connections,
        }
    }

    pub fn with_tls(mut self, tls: TlsServerConfig) -> Self {
        self.tls = Some(tls);
        self
    }
}

/// Server lifecycle notifications
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A listener was bound
    Listening(SocketAddr),
    /// A connection was accepted; its transport is bound right after this event
    Session(Session),
    /// `shutdown` was called
    Closed,
}

struct Inner {
    options: ServerOptions,
    registry: Registry,
    acceptor: Option<TlsAcceptor>,
    sessions: Mutex<Vec<Session>>,
    /// Live sessions plus connections still in the TLS handshake
    slots: AtomicUsize,
    listeners: RwLock<Vec<Arc<SessionListener>>>,
    events: EventBus<ServerEvent>,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown: watch::Sender<bool>,
}

impl Inner {
    fn lock_sessions(&self) -> MutexGuard<'_, Vec<Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim a connection slot, false when `max_connections` are taken
    fn reserve_slot(&self) -> bool {
        let max = self.options.max_connections;
        self.slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < max).then_some(taken + 1)
            })
            .is_ok()
    }

    fn release_slot(&self) {
        let _ = self
            .slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                taken.checked_sub(1)
            });
    }

    fn remove(&self, id: SessionId) {
        let mut sessions = self.lock_sessions();
        if let Some(index) = sessions.iter().position(|session| session.id() == id) {
            sessions.swap_remove(index);
            self.release_slot();
            debug!(session = %id, remaining = sessions.len(), "Session removed from registry");
        }
    }
}

/// Inbound session server. Clones share the same listener set and registry.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

impl Server {
    /// Build a server; the TLS acceptor is loaded here so bad credentials fail early.
    pub fn new(options: ServerOptions, registry: Registry) -> Result<Self> {
        let acceptor = options.tls.as_ref().map(TlsServerConfig::acceptor).transpose()?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(Inner {
                options,
                registry,
                acceptor,
                sessions: Mutex::new(Vec::new()),
                slots: AtomicUsize::new(0),
                listeners: RwLock::new(Vec::new()),
                events: EventBus::new(),
                local_addr: Mutex::new(None),
                shutdown,
            }),
        })
    }

    /// [`new`](Self::new) plus a session listener
    pub fn with_listener<F>(options: ServerOptions, registry: Registry, listener: F) -> Result<Self>
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let server = Self::new(options, registry)?;
        server.on_session(listener)?;
        Ok(server)
    }

    /// Run `listener` for every new session, before its transport is bound
    pub fn on_session<F>(&self, listener: F) -> Result<()>
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .write()
            .map_err(|_| ProtocolError::Custom("Failed to acquire server listener lock".into()))?
            .push(Arc::new(listener));
        Ok(())
    }

    pub fn is_tls(&self) -> bool {
        self.inner.acceptor.is_some()
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// 3550 for TLS servers, 2775 otherwise
    pub fn default_port(&self) -> u16 {
        default_port(self.is_tls())
    }

    /// Address `listen` binds for `addr`: `None` is the configured host on the
    /// default port, a bare port uses the configured host, anything else is used as-is.
    pub fn resolve_listen_addr(&self, addr: Option<&str>) -> String {
        let host = &self.inner.options.host;
        match addr {
            None => format!("{host}:{}", self.default_port()),
            Some(port) if port.parse::<u16>().is_ok() => format!("{host}:{port}"),
            Some(addr) => addr.to_string(),
        }
    }

    /// Bind a listener and start accepting in a background task.
    ///
    /// May be called more than once to listen on several addresses.
    #[instrument(skip(self), fields(tls = self.is_tls()))]
    pub async fn listen(&self, addr: Option<&str>) -> Result<SocketAddr> {
        let shut_down = *self.inner.shutdown.borrow();
        if shut_down {
            return Err(ProtocolError::Custom("server has been shut down".into()));
        }
        let addr = self.resolve_listen_addr(addr);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        *self
            .inner
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(local_addr);
        info!(address = %local_addr, "Server listening");
        self.inner.events.emit(ServerEvent::Listening(local_addr));

        tokio::spawn(accept_loop(
            self.clone(),
            listener,
            self.inner.shutdown.subscribe(),
        ));
        Ok(local_addr)
    }

    /// Address of the most recently bound listener
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .inner
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> UnboundedReceiverStream<ServerEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the live sessions
    pub fn sessions(&self) -> Vec<Session> {
        self.inner.lock_sessions().clone()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock_sessions().len()
    }

    /// Connection slots taken: live sessions plus TLS handshakes in progress
    pub fn reserved_slots(&self) -> usize {
        self.inner.slots.load(Ordering::Acquire)
    }

    /// Stop every accept loop and close all live sessions
    pub fn shutdown(&self) {
        if self.inner.shutdown.send_replace(true) {
            return;
        }
        let sessions = self.sessions();
        info!(sessions = sessions.len(), "Server shutting down");
        for session in &sessions {
            session.close(None);
        }
        self.inner.events.emit(ServerEvent::Closed);
        global_metrics().log_metrics();
    }

    fn accept(&self, stream: TcpStream, peer: SocketAddr) {
        if !self.inner.reserve_slot() {
            warn!(%peer, max = self.inner.options.max_connections, "Connection limit reached, dropping connection");
            return;
        }
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
        }

        match &self.inner.acceptor {
            Some(acceptor) => {
                let acceptor = acceptor.clone();
                let server = self.clone();
                tokio::spawn(async move {
                    let handshake = Timer::start("tls_accept");
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            drop(handshake);
                            server.register(Box::new(tls_stream), true, peer);
                        }
                        Err(e) => {
                            server.inner.release_slot();
                            error!(%peer, error = %e, "TLS handshake failed");
                        }
                    }
                });
            }
            None => self.register(Box::new(stream), false, peer),
        }
    }

    fn register(&self, stream: BoxedStream, secure: bool, peer: SocketAddr) {
        let session = Session::new(
            Role::Server,
            self.inner.registry.clone(),
            &self.inner.options.session,
        );
        let id = session.id();
        self.inner.lock_sessions().push(session.clone());

        let registry: Weak<Inner> = Arc::downgrade(&self.inner);
        session.on_close(Box::new(move || {
            if let Some(inner) = registry.upgrade() {
                inner.remove(id);
            }
        }));

        let listeners = match self.inner.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for listener in &listeners {
            listener(&session);
        }
        self.inner.events.emit(ServerEvent::Session(session.clone()));

        info!(%peer, session = %id, secure, "Session accepted");
        session.bind_boxed(stream, secure);
    }
}

async fn accept_loop(server: Server, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Accept loop stopped");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => server.accept(stream, peer),
                Err(e) => {
                    error!(error = %e, "Error accepting connection");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn plain_server(host: &str) -> Server {
        let options = ServerOptions {
            host: host.into(),
            ..ServerOptions::default()
        };
        Server::new(options, Registry::smpp()).unwrap()
    }

    #[test]
    fn test_plaintext_default_port() {
        let server = plain_server("0.0.0.0");
        assert!(!server.is_tls());
        assert_eq!(server.default_port(), 2775);
        assert_eq!(server.resolve_listen_addr(None), "0.0.0.0:2775");
    }

    #[test]
    fn test_listen_address_overrides() {
        let server = plain_server("127.0.0.1");
        assert_eq!(server.resolve_listen_addr(Some("2776")), "127.0.0.1:2776");
        assert_eq!(server.resolve_listen_addr(Some("10.0.0.1:9000")), "10.0.0.1:9000");
    }

    #[test]
    fn test_bad_tls_material_fails_at_construction() {
        let options = ServerOptions::default()
            .with_tls(TlsServerConfig::new("/nonexistent/cert.pem", "/nonexistent/key.pem"));
        assert!(Server::new(options, Registry::smpp()).is_err());
    }

    #[test]
    fn test_options_from_config_enable_tls() {
        let config = ServerConfig {
            tls_cert_path: Some("cert.pem".into()),
            tls_key_path: Some("key.pem".into()),
            ..ServerConfig::default()
        };
        let options = ServerOptions::from_config(&config, &SessionConfig::default());
        assert!(options.tls.is_some());
        assert_eq!(options.max_connections, config.max_connections);
    }

    #[tokio::test]
    async fn test_listen_after_shutdown_is_refused() {
        let server = plain_server("127.0.0.1");
        server.shutdown();
        assert!(server.listen(Some("0")).await.is_err());
    }
}
