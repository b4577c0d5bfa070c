//! # TLS Transport Layer
//!
//! Certificate loading and rustls configuration for encrypted sessions.
//!
//! ## Responsibilities
//! - Build the server-side acceptor from a PEM certificate chain and PKCS#8 key
//! - Build the client-side connector (native roots, a custom CA, or insecure)

use std::fs::File;
use std::io::{self, BufReader, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use rustls::ServerName;
use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore, ServerConfig};
use rustls_pemfile::{certs, pkcs8_private_keys};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tracing::warn;

use crate::error::{ProtocolError, Result};

/// TLS server configuration
#[derive(Debug, Clone)]
pub struct TlsServerConfig {
    cert_path: String,
    key_path: String,
}

impl TlsServerConfig {
    /// Create a new TLS server configuration
    pub fn new<P: AsRef<Path>>(cert_path: P, key_path: P) -> Self {
        Self {
            cert_path: cert_path.as_ref().to_string_lossy().to_string(),
            key_path: key_path.as_ref().to_string_lossy().to_string(),
        }
    }

    /// Generate a self-signed certificate for development/testing purposes
    pub fn generate_self_signed<P: AsRef<Path>>(cert_path: P, key_path: P) -> io::Result<Self> {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".into()])
                .map_err(|e| io::Error::other(format!("Certificate generation error: {e}")))?;

        let mut cert_file = File::create(&cert_path)?;
        cert_file.write_all(cert.pem().as_bytes())?;

        let mut key_file = File::create(&key_path)?;
        key_file.write_all(key_pair.serialize_pem().as_bytes())?;

        Ok(Self::new(cert_path, key_path))
    }

    /// Load the rustls server configuration from the PEM files
    pub fn load_server_config(&self) -> Result<ServerConfig> {
        let cert_chain = load_certs(&self.cert_path)?;
        let private_key = load_private_key(&self.key_path)?;

        ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)
            .map_err(|e| ProtocolError::TlsError(format!("TLS error: {e}")))
    }

    /// Acceptor used by the server for every inbound connection
    pub fn acceptor(&self) -> Result<TlsAcceptor> {
        Ok(TlsAcceptor::from(Arc::new(self.load_server_config()?)))
    }
}

/// TLS Client Configuration
#[derive(Debug, Clone)]
pub struct TlsClientConfig {
    server_name: String,
    insecure: bool,
    /// Optional CA bundle replacing the native roots
    ca_path: Option<String>,
}

impl TlsClientConfig {
    /// Create a new TLS client configuration
    pub fn new<S: Into<String>>(server_name: S) -> Self {
        Self {
            server_name: server_name.into(),
            insecure: false,
            ca_path: None,
        }
    }

    /// Verify the server against the CA certificates in `ca_path` instead of the native roots
    pub fn with_ca<S: Into<String>>(mut self, ca_path: S) -> Self {
        self.ca_path = Some(ca_path.into());
        self
    }

    /// Allow insecure connections (skip certificate verification)
    ///
    /// Only for development and testing.
    pub fn insecure(mut self) -> Self {
        warn!("INSECURE MODE ENABLED: Certificate verification is disabled. This should only be used for development/testing.");
        self.insecure = true;
        self
    }

    pub fn server_name_str(&self) -> &str {
        &self.server_name
    }

    /// Load the rustls client configuration
    pub fn load_client_config(&self) -> Result<ClientConfig> {
        let builder = ClientConfig::builder().with_safe_defaults();
        if self.insecure {
            return Ok(builder
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                .with_no_client_auth());
        }

        let mut root_store = RootCertStore::empty();
        match &self.ca_path {
            Some(ca_path) => {
                for cert in load_certs(ca_path)? {
                    root_store.add(&cert).map_err(|e| {
                        ProtocolError::TlsError(format!("Failed to add CA cert: {e}"))
                    })?;
                }
            }
            None => {
                let native_certs = rustls_native_certs::load_native_certs().map_err(|e| {
                    ProtocolError::TlsError(format!("Failed to load native certs: {e}"))
                })?;
                for cert in native_certs {
                    root_store.add(&Certificate(cert.0)).map_err(|e| {
                        ProtocolError::TlsError(format!("Failed to add cert to root store: {e}"))
                    })?;
                }
            }
        }
        Ok(builder
            .with_root_certificates(root_store)
            .with_no_client_auth())
    }

    /// Get the server name as a rustls::ServerName
    pub fn server_name(&self) -> Result<ServerName> {
        ServerName::try_from(self.server_name.as_str())
            .map_err(|_| ProtocolError::TlsError("Invalid server name".into()))
    }

    /// Connector used for outbound TLS sessions
    pub fn connector(&self) -> Result<TlsConnector> {
        Ok(TlsConnector::from(Arc::new(self.load_client_config()?)))
    }
}

struct AcceptAnyServerCert;

impl rustls::client::ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

fn load_certs(path: &str) -> Result<Vec<Certificate>> {
    let file = File::open(path)
        .map_err(|e| ProtocolError::TlsError(format!("Failed to open cert file {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    let chain = certs(&mut reader)
        .map_err(|_| ProtocolError::TlsError(format!("Failed to parse certificate {path}")))?;
    if chain.is_empty() {
        return Err(ProtocolError::TlsError(format!("No certificates found in {path}")));
    }
    Ok(chain.into_iter().map(Certificate).collect())
}

fn load_private_key(path: &str) -> Result<PrivateKey> {
    let file = File::open(path)
        .map_err(|e| ProtocolError::TlsError(format!("Failed to open key file {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    reader
        .seek(std::io::SeekFrom::Start(0))
        .map_err(ProtocolError::Io)?;

    let mut keys = pkcs8_private_keys(&mut reader)
        .map_err(|_| ProtocolError::TlsError("Failed to parse PKCS8 private key".into()))?;

    if keys.is_empty() {
        return Err(ProtocolError::TlsError(
            "No supported private key format found".into(),
        ));
    }
    Ok(PrivateKey(keys.swap_remove(0)))
}
