//! # Core Protocol Components
//!
//! The PDU model and the codec boundary.
//!
//! ## Components
//! - **Pdu**: decoded protocol data unit, field values and parameters
//! - **Codec**: `PduCodec` trait consumed by the session, `SmppCodec` implementation
//!
//! ## Security
//! - Maximum PDU size: 64 KiB by default (prevents memory exhaustion)
//! - Length validated before any buffering of the body

pub mod codec;
pub mod pdu;
