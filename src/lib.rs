//! # smpp-session
//!
//! Session engine for SMPP-style binary PDU protocols over TCP or TLS.
//!
//! ## Components
//! - **Session**: sequence allocation, response correlation, ordered PDU
//!   extraction with pause/resume, typed events
//! - **Server**: connection acceptance and a registry of live sessions
//! - **Connector**: `smpp://` / `ssmpp://` targets to connected sessions
//! - **Registry**: runtime-extensible command and TLV tables
//! - **Codec**: `PduCodec` boundary and a bundled SMPP-style header + TLV codec
//!
//! ## Example
//! ```no_run
//! use smpp_session::{connect_url, Fields, Registry};
//!
//! # async fn run() -> smpp_session::Result<()> {
//! let session = connect_url("smpp://127.0.0.1:2775", Registry::smpp(), None).await?;
//! let response = session
//!     .command_request(
//!         "submit_sm",
//!         Fields::new()
//!             .with("message_payload", "hello")
//!             .with("user_message_reference", 7u16),
//!     )
//!     .await?;
//! println!("accepted: {}", response.command_status == 0);
//! session.close(None);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod session;
pub mod transport;
pub mod utils;

pub use crate::config::{default_port, SmppConfig, DEFAULT_PORT, DEFAULT_TLS_PORT};
pub use crate::core::codec::{PduCodec, SmppCodec};
pub use crate::core::pdu::{FieldValue, Fields, Param, Pdu};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::registry::{CommandDescriptor, Registry, TlvDescriptor, TlvKind};
pub use crate::service::{
    connect, connect_url, ConnectOptions, ConnectTarget, Server, ServerEvent, ServerOptions,
};
pub use crate::session::{Role, Session, SessionEvent, Shortcut};
