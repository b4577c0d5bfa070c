//! # Protocol Extension Points
//!
//! The command/parameter registry and the per-command PDU dispatcher.
//!
//! ## Components
//! - **Registry**: shared command and TLV tables, PDU builders for shortcuts
//! - **Dispatcher**: synchronous handlers keyed by command name

pub mod dispatcher;
pub mod registry;

#[cfg(test)]
mod tests;
