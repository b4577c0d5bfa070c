//! Decoded protocol data units and the field values used to build them.
//!
//! A [`Pdu`] is what the session engine sequences, correlates and delivers.
//! The engine only relies on three of its attributes: the command name, the
//! sequence number and [`Pdu::is_response`]. Everything else is carried for
//! the caller.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

/// Length of the fixed PDU header: length, command id, status, sequence.
pub const HEADER_LEN: usize = 16;

/// Bit set in `command_id` for every response PDU.
pub const RESPONSE_BIT: u32 = 0x8000_0000;

/// Reserved field name that sets `command_status` instead of a body parameter.
pub const FIELD_COMMAND_STATUS: &str = "command_status";

/// Reserved field name that sets `sequence_number` instead of a body parameter.
pub const FIELD_SEQUENCE_NUMBER: &str = "sequence_number";

/// Common `command_status` values.
pub mod status {
    pub const ESME_ROK: u32 = 0x0000_0000;
    pub const ESME_RINVMSGLEN: u32 = 0x0000_0001;
    pub const ESME_RINVCMDLEN: u32 = 0x0000_0002;
    pub const ESME_RINVCMDID: u32 = 0x0000_0003;
    pub const ESME_RINVBNDSTS: u32 = 0x0000_0004;
    pub const ESME_RALYBND: u32 = 0x0000_0005;
    pub const ESME_RSYSERR: u32 = 0x0000_0008;
    pub const ESME_RBINDFAIL: u32 = 0x0000_000D;
    pub const ESME_RINVPASWD: u32 = 0x0000_000E;
    pub const ESME_RINVSYSID: u32 = 0x0000_000F;
    pub const ESME_RMSGQFUL: u32 = 0x0000_0014;
    pub const ESME_RTHROTTLED: u32 = 0x0000_0058;
    pub const ESME_RINVOPTPARSTREAM: u32 = 0x0000_00C0;
    pub const ESME_ROPTPARNOTALLWD: u32 = 0x0000_00C1;
    pub const ESME_RINVPARLEN: u32 = 0x0000_00C2;
    pub const ESME_RMISSINGOPTPARAM: u32 = 0x0000_00C3;
    pub const ESME_RUNKNOWNERR: u32 = 0x0000_00FF;
}

/// A value supplied for a named field when building a PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(u32),
    Str(String),
    Bytes(Bytes),
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::Int(v as u32)
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::Int(v as u32)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Bytes(Bytes::from(v))
    }
}

impl From<&[u8]> for FieldValue {
    fn from(v: &[u8]) -> Self {
        FieldValue::Bytes(Bytes::copy_from_slice(v))
    }
}

impl From<Bytes> for FieldValue {
    fn from(v: Bytes) -> Self {
        FieldValue::Bytes(v)
    }
}

/// Named field configuration handed to a command shortcut.
///
/// Names are resolved against the registry's parameter table when the PDU is
/// built; `command_status` and `sequence_number` are header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    values: BTreeMap<String, FieldValue>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// One tag-length-value body parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub tag: u16,
    /// Registry name of the tag, `None` when the tag was not registered at decode time
    pub name: Option<String>,
    pub value: Bytes,
}

/// A decoded (or ready to encode) protocol data unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub command: String,
    pub command_id: u32,
    pub command_status: u32,
    /// Correlation key; 0 means "not assigned yet" on outbound requests
    pub sequence_number: u32,
    pub params: Vec<Param>,
}

impl Pdu {
    pub fn new(command: impl Into<String>, command_id: u32) -> Self {
        Self {
            command: command.into(),
            command_id,
            command_status: status::ESME_ROK,
            sequence_number: 0,
            params: Vec::new(),
        }
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.command_id & RESPONSE_BIT != 0
    }

    pub fn with_sequence_number(mut self, sequence_number: u32) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    pub fn with_status(mut self, command_status: u32) -> Self {
        self.command_status = command_status;
        self
    }

    pub fn push_param(&mut self, tag: u16, name: Option<String>, value: Bytes) {
        self.params.push(Param { tag, name, value });
    }

    /// First parameter with the given registry name
    pub fn param(&self, name: &str) -> Option<&Bytes> {
        self.params
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
            .map(|p| &p.value)
    }

    pub fn param_by_tag(&self, tag: u16) -> Option<&Bytes> {
        self.params.iter().find(|p| p.tag == tag).map(|p| &p.value)
    }

    /// Parameter as text, without a trailing NUL
    pub fn param_str(&self, name: &str) -> Option<&str> {
        let raw: &[u8] = self.param(name)?;
        let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
        std::str::from_utf8(raw).ok()
    }

    /// Parameter as a big-endian integer of 1, 2 or 4 bytes
    pub fn param_int(&self, name: &str) -> Option<u32> {
        let raw = self.param(name)?;
        match raw.len() {
            1 => Some(raw[0] as u32),
            2 => Some(u16::from_be_bytes([raw[0], raw[1]]) as u32),
            4 => Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])),
            _ => None,
        }
    }

    /// Size of this PDU on the wire
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN
            + self
                .params
                .iter()
                .map(|p| 4 + p.value.len())
                .sum::<usize>()
    }
}

impl fmt::Display for Pdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(seq={}, status={:#x}, params={})",
            self.command,
            self.sequence_number,
            self.command_status,
            self.params.len()
        )
    }
}
