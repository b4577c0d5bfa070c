//! # Transport Layer
//!
//! Byte streams a session can be bound to: plain TCP or TLS over TCP, or any
//! other `AsyncRead + AsyncWrite` (in-memory duplex pipes in tests).

pub mod tls;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::error::{ProtocolError, Result};
use tls::TlsClientConfig;

/// Duplex byte stream owned by a session.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// Open a TCP connection to `host:port`, wrapped in TLS when `tls` is given.
#[instrument(skip(tls), fields(tls = tls.is_some()))]
pub async fn dial(
    host: &str,
    port: u16,
    tls: Option<&TlsClientConfig>,
    connect_timeout: Duration,
) -> Result<BoxedStream> {
    let connect = async {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        debug!("TCP connection established");

        match tls {
            Some(config) => {
                let connector = config.connector()?;
                let tls_stream = connector
                    .connect(config.server_name()?, stream)
                    .await
                    .map_err(|e| ProtocolError::TlsError(format!("TLS connection failed: {e}")))?;
                debug!("TLS handshake completed");
                Ok::<BoxedStream, ProtocolError>(Box::new(tls_stream))
            }
            None => Ok(Box::new(stream) as BoxedStream),
        }
    };

    tokio::time::timeout(connect_timeout, connect)
        .await
        .map_err(|_| {
            ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connecting to {host}:{port} timed out"),
            ))
        })?
}
