//! # Session Engine
//!
//! One [`Session`] per connection: sequence allocation, response correlation,
//! in-order PDU extraction, pause/resume flow control and event emission.
//!
//! ## Architecture
//! ```text
//!   transport ──► reader task ──► buffer ──► extraction loop ──► events / dispatcher / pending
//!   send() ─────► encode ──► writer task ──► transport ──► Sent event, on_sent callback
//! ```
//!
//! - The reader task only appends bytes; decoding happens in the extraction
//!   loop, which is guarded by a `busy` flag so there is never more than one
//!   pass over the buffer. A handler that re-enters (for example by calling
//!   [`Session::resume`]) returns immediately and the running pass picks up
//!   whatever is left.
//! - Handlers run without any session lock held, so they may send, pause,
//!   resume or close the session they were called from.
//! - Responses are matched by sequence number, never by arrival order.
//! - Pending handlers of a closed session are discarded, not invoked;
//!   [`SessionEvent::Abandoned`] lists their sequence numbers and
//!   [`Session::request`] futures resolve with `RequestAbandoned`.

pub mod events;
pub mod pending;
pub mod sequence;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::SessionConfig;
use crate::core::codec::{PduCodec, SmppCodec};
use crate::core::pdu::{Fields, Pdu};
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::registry::{PduBuilder, Registry};
use crate::service::connector::ConnectOptions;
use crate::transport::{self, AsyncStream, BoxedStream};
use crate::utils::metrics::{global_metrics, Metrics, MetricsSnapshot};

pub use events::{EventBus, SessionEvent};
pub use pending::{Pending, PduHandler, PendingTable};
pub use sequence::{SequenceCounter, MAX_SEQUENCE};

/// Invoked once when the transport has fully closed.
pub type CloseHandler = Box<dyn FnOnce() + Send + 'static>;

/// Invoked once on the next `Connect` / `SecureConnect` event.
pub type ConnectHandler = Box<dyn FnOnce(&Session) + Send + 'static>;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Outbound session created by the connector
    Client,
    /// Inbound session accepted by a server
    Server,
}

enum WriteOp {
    Pdu {
        bytes: Bytes,
        pdu: Pdu,
        on_sent: Option<PduHandler>,
    },
    Shutdown,
}

#[derive(Default)]
struct State {
    sequence: SequenceCounter,
    paused: bool,
    busy: bool,
    /// Set by a decode error; extraction stays off until the next bind
    halted: bool,
    buffer: BytesMut,
    pending: PendingTable,
    writer: Option<mpsc::UnboundedSender<WriteOp>>,
    reader: Option<AbortHandle>,
    generation: u64,
    open: bool,
    closed: bool,
    secure: bool,
    close_handlers: Vec<CloseHandler>,
    connect_handlers: Vec<ConnectHandler>,
}

struct Shared {
    id: SessionId,
    role: Role,
    registry: Registry,
    codec: Arc<dyn PduCodec>,
    dispatcher: Dispatcher,
    events: EventBus<SessionEvent>,
    metrics: Metrics,
    options: Option<ConnectOptions>,
    read_buffer_size: usize,
    state: Mutex<State>,
    closed: watch::Sender<bool>,
}

/// Handle to one protocol session. Clones share the same session.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("role", &self.shared.role)
            .finish_non_exhaustive()
    }
}

/// Resets `busy` if the extraction loop unwinds out of a handler.
///
/// A pass started on a transport that has since been replaced leaves `busy`
/// alone: it belongs to the new transport.
struct ExtractionGuard<'a> {
    session: &'a Session,
    generation: u64,
    armed: bool,
}

impl Drop for ExtractionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.session.lock_state();
            if state.generation == self.generation {
                state.busy = false;
            }
        }
    }
}

impl Session {
    /// Unbound session using the bundled codec. Call [`bind`](Self::bind) to attach a transport.
    pub fn new(role: Role, registry: Registry, config: &SessionConfig) -> Self {
        let codec = SmppCodec::new(registry.clone()).with_max_pdu_size(config.max_pdu_size);
        Self::with_codec(role, registry, config, Arc::new(codec))
    }

    /// Unbound session decoding with a caller-supplied codec
    pub fn with_codec(
        role: Role,
        registry: Registry,
        config: &SessionConfig,
        codec: Arc<dyn PduCodec>,
    ) -> Self {
        Self::build(role, registry, config, codec, None)
    }

    /// Outbound session that dials `options` on [`connect`](Self::connect)
    pub fn outbound(options: ConnectOptions, registry: Registry, config: &SessionConfig) -> Self {
        let codec = SmppCodec::new(registry.clone()).with_max_pdu_size(config.max_pdu_size);
        Self::build(Role::Client, registry, config, Arc::new(codec), Some(options))
    }

    fn build(
        role: Role,
        registry: Registry,
        config: &SessionConfig,
        codec: Arc<dyn PduCodec>,
        options: Option<ConnectOptions>,
    ) -> Self {
        let (closed, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                id: SessionId::next(),
                role,
                registry,
                codec,
                dispatcher: Dispatcher::new(),
                events: EventBus::new(),
                metrics: Metrics::new(),
                options,
                read_buffer_size: config.read_buffer_size.max(1),
                state: Mutex::new(State::default()),
                closed,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        // No handler ever runs under this lock, the state stays consistent across a poison
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, update: impl Fn(&Metrics)) {
        update(&self.shared.metrics);
        update(global_metrics());
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn role(&self) -> Role {
        self.shared.role
    }

    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    pub fn options(&self) -> Option<&ConnectOptions> {
        self.shared.options.as_ref()
    }

    /// Whether the current transport is TLS
    pub fn is_secure(&self) -> bool {
        self.lock_state().secure
    }

    /// Whether a transport is bound and not yet fully closed
    pub fn is_open(&self) -> bool {
        self.lock_state().open
    }

    /// Whether [`send`](Self::send) would accept a PDU right now
    pub fn is_writable(&self) -> bool {
        self.lock_state()
            .writer
            .as_ref()
            .is_some_and(|writer| !writer.is_closed())
    }

    pub fn is_paused(&self) -> bool {
        self.lock_state().paused
    }

    /// Whether a decode error stopped extraction on the current transport
    pub fn is_halted(&self) -> bool {
        self.lock_state().halted
    }

    /// Bytes received but not yet decoded
    pub fn buffered_len(&self) -> usize {
        self.lock_state().buffer.len()
    }

    /// Requests still waiting for a response
    pub fn pending_len(&self) -> usize {
        self.lock_state().pending.len()
    }

    /// Last sequence number allocated by this session, 0 if none since the last bind
    pub fn last_sequence(&self) -> u32 {
        self.lock_state().sequence.current()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Stream of every event emitted from now on
    pub fn subscribe(&self) -> UnboundedReceiverStream<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Handler for every PDU, run before command handlers and correlation
    pub fn on_pdu<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&Session, &Pdu) + Send + Sync + 'static,
    {
        self.shared.dispatcher.register_any(handler)
    }

    /// Handler for PDUs whose command is `command`
    pub fn on<F>(&self, command: &str, handler: F) -> Result<()>
    where
        F: Fn(&Session, &Pdu) + Send + Sync + 'static,
    {
        self.shared.dispatcher.register(command, handler)
    }

    /// Run `handler` once the transport has fully closed (immediately if it already has)
    pub fn on_close(&self, handler: CloseHandler) {
        let mut state = self.lock_state();
        if state.closed {
            drop(state);
            handler();
        } else {
            state.close_handlers.push(handler);
        }
    }

    /// Run `handler` once on the next connection-established event
    pub fn on_connect(&self, handler: ConnectHandler) {
        self.lock_state().connect_handlers.push(handler);
    }

    /// Bind a transport, replacing any previous one.
    ///
    /// Resets the sequence counter, the paused/busy/halted flags, the receive
    /// buffer and the pending table. Pending handlers of the previous
    /// transport are discarded. Must be called from within a tokio runtime.
    pub fn bind<S: AsyncStream>(&self, stream: S, secure: bool) {
        self.bind_boxed(Box::new(stream), secure);
    }

    pub fn bind_boxed(&self, stream: BoxedStream, secure: bool) {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();

        let (generation, abandoned, was_open) = {
            let mut state = self.lock_state();
            if let Some(reader) = state.reader.take() {
                reader.abort();
            }
            let abandoned = state.pending.drain();
            state.sequence.reset();
            state.paused = false;
            state.busy = false;
            state.halted = false;
            state.buffer.clear();
            // Dropping the previous sender lets its writer drain and shut down
            state.writer = Some(tx);
            state.generation += 1;
            state.closed = false;
            state.secure = secure;
            let was_open = std::mem::replace(&mut state.open, true);
            (state.generation, abandoned, was_open)
        };

        if was_open {
            self.record(Metrics::connection_closed);
        }
        self.record(Metrics::connection_established);
        self.abandon(abandoned);
        self.shared.closed.send_replace(false);
        debug!(session = %self.id(), role = ?self.role(), secure, generation, "Transport bound");

        tokio::spawn(write_loop(self.clone(), generation, write_half, rx));
        let reader = tokio::spawn(read_loop(self.clone(), generation, read_half));

        let mut state = self.lock_state();
        if state.generation == generation && state.open {
            state.reader = Some(reader.abort_handle());
        }
    }

    /// Dial the stored connection options and bind the new transport.
    ///
    /// Calling this on a connected session reconnects it; the old transport
    /// is dropped and its pending handlers are discarded.
    #[instrument(skip(self), fields(session = %self.id()))]
    pub async fn connect(&self) -> Result<()> {
        let options = self.shared.options.clone().ok_or_else(|| {
            ProtocolError::Custom("session was not created with connection options".into())
        })?;

        let stream = transport::dial(
            &options.host,
            options.port,
            options.tls.as_ref(),
            options.connect_timeout,
        )
        .await
        .map_err(|e| {
            warn!(host = %options.host, port = options.port, error = %e, "Connect failed");
            e
        })?;

        let secure = options.tls.is_some();
        self.bind_boxed(stream, secure);
        info!(host = %options.host, port = options.port, secure, "Session connected");
        self.emit_connected(secure);
        Ok(())
    }

    fn emit_connected(&self, secure: bool) {
        let handlers = std::mem::take(&mut self.lock_state().connect_handlers);
        self.shared.events.emit(if secure {
            SessionEvent::SecureConnect
        } else {
            SessionEvent::Connect
        });
        for handler in handlers {
            handler(self);
        }
    }

    /// Suspend PDU extraction. Bytes keep buffering; nothing is dropped, even
    /// if the peer closes before [`resume`](Self::resume).
    pub fn pause(&self) {
        self.lock_state().paused = true;
    }

    /// Resume extraction and deliver every complete buffered PDU before returning.
    ///
    /// Also drains bytes that arrived before the transport closed.
    pub fn resume(&self) {
        self.lock_state().paused = false;
        self.extract_pdus();
    }

    /// Request transport shutdown after the queued writes.
    ///
    /// `on_closed` fires once the transport has fully closed.
    pub fn close(&self, on_closed: Option<CloseHandler>) {
        if let Some(handler) = on_closed {
            self.on_close(handler);
        }
        let writer = self.lock_state().writer.take();
        if let Some(writer) = writer {
            debug!(session = %self.id(), "Close requested");
            let _ = writer.send(WriteOp::Shutdown);
        }
    }

    /// Wait until the transport has fully closed
    pub async fn wait_closed(&self) {
        let mut closed = self.shared.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Send a PDU.
    ///
    /// Requests without a sequence number get the next one; a caller-supplied
    /// sequence number is used verbatim. `on_response` is registered before the
    /// write is queued. For a response PDU, `on_response` doubles as the send
    /// callback when `on_sent` is `None`. `on_sent` and the `Sent` event fire
    /// after the transport accepted the bytes.
    ///
    /// Returns the PDU's sequence number, or `NotWritable` without touching
    /// any state.
    pub fn send(
        &self,
        pdu: Pdu,
        on_response: Option<PduHandler>,
        on_sent: Option<PduHandler>,
    ) -> Result<u32> {
        let (pending, on_sent) = if pdu.is_response() {
            (None, on_sent.or(on_response))
        } else {
            (on_response.map(Pending::Callback), on_sent)
        };
        self.send_inner(pdu, pending, on_sent)
    }

    /// Send a request and wait for its response
    pub async fn request(&self, pdu: Pdu) -> Result<Pdu> {
        if pdu.is_response() {
            return Err(ProtocolError::Custom(format!(
                "{} is a response and has no response to wait for",
                pdu.command
            )));
        }
        let (tx, rx) = oneshot::channel();
        let sequence_number = self.send_inner(pdu, Some(Pending::Waiter(tx)), None)?;
        rx.await
            .map_err(|_| ProtocolError::RequestAbandoned(sequence_number))
    }

    /// Build `command` from `fields` and send it
    pub fn command(
        &self,
        command: &str,
        fields: Fields,
        on_response: Option<PduHandler>,
        on_sent: Option<PduHandler>,
    ) -> Result<u32> {
        let pdu = self.shared.registry.build(command, &fields)?;
        self.send(pdu, on_response, on_sent)
    }

    /// Build `command` from `fields`, send it and wait for the response
    pub async fn command_request(&self, command: &str, fields: Fields) -> Result<Pdu> {
        let pdu = self.shared.registry.build(command, &fields)?;
        self.request(pdu).await
    }

    /// Send the `*_resp` answering `request`, with its sequence number
    pub fn respond(&self, request: &Pdu, fields: Fields) -> Result<u32> {
        let pdu = self.shared.registry.response_to(request, &fields)?;
        self.send(pdu, None, None)
    }

    /// Shortcut bound to one registered command; unknown commands fail here
    pub fn shortcut(&self, command: &str) -> Result<Shortcut> {
        Ok(Shortcut {
            session: self.clone(),
            command: command.to_string(),
            builder: self.shared.registry.builder(command)?,
        })
    }

    fn send_inner(
        &self,
        mut pdu: Pdu,
        pending: Option<Pending>,
        on_sent: Option<PduHandler>,
    ) -> Result<u32> {
        let mut state = self.lock_state();
        let writer = match &state.writer {
            Some(writer) if !writer.is_closed() => writer.clone(),
            _ => {
                drop(state);
                self.record(Metrics::send_rejected);
                debug!(session = %self.id(), command = %pdu.command, "Send refused, transport not writable");
                return Err(ProtocolError::NotWritable);
            }
        };

        let allocate = !pdu.is_response() && pdu.sequence_number == 0;
        if allocate {
            pdu.sequence_number = state.sequence.peek_next();
        }
        let mut bytes = BytesMut::with_capacity(pdu.encoded_len());
        self.shared.codec.encode(&pdu, &mut bytes)?;

        let sequence_before = state.sequence.clone();
        if allocate {
            state.sequence.next();
        }
        let sequence_number = pdu.sequence_number;
        let (registered, replaced) = match pending {
            Some(pending) if !pdu.is_response() => {
                let replaced = state.pending.insert(sequence_number, pending);
                if replaced.is_some() {
                    warn!(session = %self.id(), sequence_number, "Replaced a pending handler still in flight");
                }
                (true, replaced)
            }
            _ => (false, None),
        };

        trace!(session = %self.id(), command = %pdu.command, sequence_number, "PDU queued");
        let op = WriteOp::Pdu {
            bytes: bytes.freeze(),
            pdu,
            on_sent,
        };
        if writer.send(op).is_err() {
            if registered {
                state.pending.restore(sequence_number, replaced);
            }
            state.sequence = sequence_before;
            drop(state);
            self.record(Metrics::send_rejected);
            return Err(ProtocolError::NotWritable);
        }
        Ok(sequence_number)
    }

    fn ingest(&self, generation: u64, data: &[u8]) {
        {
            let mut state = self.lock_state();
            // A halted stream is desynchronized, keeping its bytes would only grow memory
            if state.generation != generation || state.halted {
                return;
            }
            state.buffer.extend_from_slice(data);
        }
        self.record(|m| m.bytes_read(data.len() as u64));
        self.extract_pdus();
    }

    /// Decode and deliver buffered PDUs until paused or out of complete PDUs.
    ///
    /// A nested or concurrent call while a pass is running returns immediately.
    /// Runs on a closed session too, so bytes buffered while paused are not lost.
    fn extract_pdus(&self) {
        let generation = {
            let mut state = self.lock_state();
            if state.busy || state.halted {
                return;
            }
            state.busy = true;
            state.generation
        };
        let mut guard = ExtractionGuard {
            session: self,
            generation,
            armed: true,
        };

        loop {
            let decoded = {
                let mut state = self.lock_state();
                // Rebound from a handler: the new transport owns the buffer and `busy`
                if state.generation != generation {
                    guard.armed = false;
                    return;
                }
                let decoded = if state.paused {
                    Ok(None)
                } else {
                    self.shared.codec.decode_one(&mut state.buffer)
                };
                // Stopping and clearing `busy` happen under one lock so a concurrent resume is never lost
                match decoded {
                    Ok(Some(pdu)) => pdu,
                    Ok(None) => {
                        state.busy = false;
                        guard.armed = false;
                        return;
                    }
                    Err(error) => {
                        state.busy = false;
                        state.halted = true;
                        state.buffer.clear();
                        guard.armed = false;
                        drop(state);
                        self.record(Metrics::decode_error);
                        warn!(session = %self.id(), error = %error, "Decode failed, extraction halted");
                        self.shared.events.emit(SessionEvent::Error(Arc::new(error)));
                        return;
                    }
                }
            };
            self.deliver(decoded);
        }
    }

    fn deliver(&self, pdu: Pdu) {
        debug!(
            session = %self.id(),
            command = %pdu.command,
            sequence_number = pdu.sequence_number,
            "PDU received"
        );
        self.record(Metrics::pdu_received);
        self.shared.events.emit(SessionEvent::Pdu(pdu.clone()));
        self.shared.dispatcher.dispatch(self, &pdu);

        if !pdu.is_response() {
            return;
        }
        let sequence_number = pdu.sequence_number;
        let pending = self.lock_state().pending.take(sequence_number);
        match pending {
            Some(pending) => {
                if !pending.complete(pdu) {
                    debug!(session = %self.id(), sequence_number, "Response waiter gone before delivery");
                }
            }
            None => {
                self.record(Metrics::unmatched_response);
                warn!(session = %self.id(), sequence_number, "Unmatched response dropped");
            }
        }
    }

    fn abandon(&self, sequence_numbers: Vec<u32>) {
        if sequence_numbers.is_empty() {
            return;
        }
        warn!(
            session = %self.id(),
            count = sequence_numbers.len(),
            "Discarding pending response handlers"
        );
        self.record(|m| m.requests_abandoned(sequence_numbers.len() as u64));
        self.shared
            .events
            .emit(SessionEvent::Abandoned { sequence_numbers });
    }

    fn transport_error(&self, error: std::io::Error) {
        warn!(session = %self.id(), error = %error, "Transport error");
        self.record(Metrics::transport_error);
        self.shared
            .events
            .emit(SessionEvent::Error(Arc::new(ProtocolError::Io(error))));
    }

    fn writer_finished(&self, generation: u64) {
        let mut state = self.lock_state();
        if state.generation == generation {
            state.writer = None;
        }
    }

    fn transport_closed(&self, generation: u64) {
        let (handlers, abandoned) = {
            let mut state = self.lock_state();
            if state.generation != generation || !state.open {
                return;
            }
            state.open = false;
            state.closed = true;
            state.writer = None;
            if let Some(reader) = state.reader.take() {
                reader.abort();
            }
            (
                std::mem::take(&mut state.close_handlers),
                state.pending.drain(),
            )
        };

        self.record(Metrics::connection_closed);
        info!(session = %self.id(), "Session closed");
        self.abandon(abandoned);
        self.shared.events.emit(SessionEvent::Close);
        self.shared.closed.send_replace(true);
        for handler in handlers {
            handler();
        }
    }
}

async fn read_loop(session: Session, generation: u64, mut reader: ReadHalf<BoxedStream>) {
    let chunk_size = session.shared.read_buffer_size;
    let mut chunk = BytesMut::with_capacity(chunk_size);
    loop {
        chunk.reserve(chunk_size);
        match reader.read_buf(&mut chunk).await {
            Ok(0) => {
                debug!(session = %session.id(), "Peer closed the connection");
                break;
            }
            Ok(_) => {
                let data = chunk.split();
                session.ingest(generation, &data);
            }
            Err(e) => {
                session.transport_error(e);
                break;
            }
        }
    }
    session.transport_closed(generation);
}

async fn write_loop(
    session: Session,
    generation: u64,
    mut writer: WriteHalf<BoxedStream>,
    mut ops: mpsc::UnboundedReceiver<WriteOp>,
) {
    while let Some(op) = ops.recv().await {
        let (bytes, pdu, on_sent) = match op {
            WriteOp::Pdu {
                bytes,
                pdu,
                on_sent,
            } => (bytes, pdu, on_sent),
            WriteOp::Shutdown => break,
        };

        let written = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            session.transport_error(e);
            session.transport_closed(generation);
            return;
        }

        session.record(|m| m.pdu_sent(bytes.len() as u64));
        debug!(
            session = %session.id(),
            command = %pdu.command,
            sequence_number = pdu.sequence_number,
            "PDU sent"
        );
        session.shared.events.emit(SessionEvent::Sent(pdu.clone()));
        if let Some(on_sent) = on_sent {
            on_sent(pdu);
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!(session = %session.id(), error = %e, "Transport shutdown failed");
    }
    session.writer_finished(generation);
}

/// A registered command bound to a session: build from fields and send.
#[derive(Clone)]
pub struct Shortcut {
    session: Session,
    command: String,
    builder: PduBuilder,
}

impl fmt::Debug for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shortcut")
            .field("command", &self.command)
            .field("session", &self.session.id())
            .finish()
    }
}

impl Shortcut {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn build(&self, fields: &Fields) -> Result<Pdu> {
        (self.builder)(fields)
    }

    pub fn send(
        &self,
        fields: Fields,
        on_response: Option<PduHandler>,
        on_sent: Option<PduHandler>,
    ) -> Result<u32> {
        let pdu = self.build(&fields)?;
        self.session.send(pdu, on_response, on_sent)
    }

    pub async fn request(&self, fields: Fields) -> Result<Pdu> {
        let pdu = self.build(&fields)?;
        self.session.request(pdu).await
    }
}
