//! # Service Layer
//!
//! Entry points that produce sessions.
//!
//! ## Components
//! - **Server**: accepts plaintext or TLS connections and tracks live sessions
//! - **Connector**: parses `smpp://` / `ssmpp://` targets and dials outbound sessions

pub mod connector;
pub mod server;

pub use connector::{connect, connect_url, connect_with_config, ConnectOptions, ConnectTarget};
pub use server::{Server, ServerEvent, ServerOptions};
