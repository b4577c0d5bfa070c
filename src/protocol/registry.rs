//! # Command / TLV Registry
//!
//! Open, append-only tables mapping command names to opcodes and parameter
//! names to tags. A [`Registry`] is a cheap clone of a shared handle: every
//! session and server built from the same handle sees a registration the
//! moment it happens, while tests can build isolated registries with
//! [`Registry::empty`] or a fresh [`Registry::smpp`].
//!
//! The registry also produces the per-command builders used by the session
//! shortcuts, see [`Registry::builder`].

use crate::core::pdu::{
    FieldValue, Fields, Pdu, FIELD_COMMAND_STATUS, FIELD_SEQUENCE_NUMBER, RESPONSE_BIT,
};
use crate::error::{constants, ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Suffix that names the response of a request command.
pub const RESPONSE_SUFFIX: &str = "_resp";

/// Describes one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub id: u32,
    /// Whether the peer answers this command with a `*_resp` PDU
    pub has_response: bool,
    /// Parameter names accepted by the builder; empty accepts any registered parameter
    pub params: Vec<String>,
}

impl CommandDescriptor {
    /// A request (or response) that follows the request/response pairing
    pub fn new(id: u32) -> Self {
        Self {
            id,
            has_response: id & RESPONSE_BIT == 0,
            params: Vec::new(),
        }
    }

    /// A one-way command such as `outbind` or `alert_notification`
    pub fn notification(id: u32) -> Self {
        Self {
            id,
            has_response: false,
            params: Vec::new(),
        }
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.id & RESPONSE_BIT != 0
    }
}

/// Value layout of a tag-length-value parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvKind {
    Int8,
    Int16,
    Int32,
    /// NUL terminated text
    CString,
    Octets,
}

impl TlvKind {
    /// Encode a field value into the bytes of a parameter of this kind.
    pub fn encode_value(self, field: &str, value: &FieldValue) -> Result<Bytes> {
        let type_error = |reason: String| ProtocolError::FieldType {
            field: field.to_string(),
            reason,
        };

        match (self, value) {
            (TlvKind::Int8, FieldValue::Int(v)) => u8::try_from(*v)
                .map(|b| Bytes::copy_from_slice(&[b]))
                .map_err(|_| type_error(format!("{v} does not fit in 1 byte"))),
            (TlvKind::Int16, FieldValue::Int(v)) => u16::try_from(*v)
                .map(|b| Bytes::copy_from_slice(&b.to_be_bytes()))
                .map_err(|_| type_error(format!("{v} does not fit in 2 bytes"))),
            (TlvKind::Int32, FieldValue::Int(v)) => Ok(Bytes::copy_from_slice(&v.to_be_bytes())),
            (TlvKind::CString, FieldValue::Str(s)) => {
                if s.as_bytes().contains(&0) {
                    return Err(type_error("text contains a NUL byte".into()));
                }
                let mut buf = BytesMut::with_capacity(s.len() + 1);
                buf.put_slice(s.as_bytes());
                buf.put_u8(0);
                Ok(buf.freeze())
            }
            (TlvKind::Octets, FieldValue::Str(s)) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            (TlvKind::CString | TlvKind::Octets, FieldValue::Bytes(b)) => Ok(b.clone()),
            (kind, other) => Err(type_error(format!("{other:?} is not a {kind:?} value"))),
        }
    }
}

/// Describes one optional parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvDescriptor {
    pub tag: u16,
    pub kind: TlvKind,
}

impl TlvDescriptor {
    pub fn new(tag: u16, kind: TlvKind) -> Self {
        Self { tag, kind }
    }
}

/// Builds a PDU for one command from named fields.
pub type PduBuilder = Arc<dyn Fn(&Fields) -> Result<Pdu> + Send + Sync + 'static>;

#[derive(Debug, Default)]
struct Tables {
    commands: HashMap<String, CommandDescriptor>,
    commands_by_id: HashMap<u32, String>,
    tlvs: HashMap<String, TlvDescriptor>,
    tlvs_by_tag: HashMap<u16, String>,
}

impl Tables {
    fn insert_command(&mut self, name: String, descriptor: CommandDescriptor) {
        if let Some(previous) = self.commands.get(&name) {
            self.commands_by_id.remove(&previous.id);
        }
        self.commands_by_id.insert(descriptor.id, name.clone());
        self.commands.insert(name, descriptor);
    }

    fn insert_tlv(&mut self, name: String, descriptor: TlvDescriptor) {
        if let Some(previous) = self.tlvs.get(&name) {
            self.tlvs_by_tag.remove(&previous.tag);
        }
        self.tlvs_by_tag.insert(descriptor.tag, name.clone());
        self.tlvs.insert(name, descriptor);
    }
}

/// Shared, mutable command and parameter tables.
#[derive(Clone, Debug)]
pub struct Registry {
    tables: Arc<RwLock<Tables>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::smpp()
    }
}

impl Registry {
    /// A registry with no commands or parameters
    pub fn empty() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// A fresh registry loaded with SMPP-style command ids and common parameter tags
    pub fn smpp() -> Self {
        let mut tables = Tables::default();
        for &(name, id, has_response) in SMPP_COMMANDS {
            let descriptor = if has_response {
                CommandDescriptor::new(id)
            } else {
                CommandDescriptor::notification(id)
            };
            tables.insert_command(name.to_string(), descriptor);
            if has_response {
                tables.insert_command(
                    format!("{name}{RESPONSE_SUFFIX}"),
                    CommandDescriptor::new(id | RESPONSE_BIT),
                );
            }
        }
        tables.insert_command("generic_nack".into(), CommandDescriptor::new(RESPONSE_BIT));
        for &(name, tag, kind) in SMPP_TLVS {
            tables.insert_tlv(name.to_string(), TlvDescriptor::new(tag, kind));
        }

        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        // Tables are only replaced entry by entry, a poisoned guard still holds consistent maps
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register (or replace) a command.
    ///
    /// Registering a request that expects a response also registers its
    /// `*_resp` counterpart unless one is already present.
    pub fn register_command(&self, name: &str, descriptor: CommandDescriptor) -> Result<()> {
        let mut tables = self.tables.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_REGISTRY_WRITE_LOCK.to_string())
        })?;

        let paired = (descriptor.has_response && !descriptor.is_response())
            .then(|| (format!("{name}{RESPONSE_SUFFIX}"), descriptor.id | RESPONSE_BIT));

        tables.insert_command(name.to_string(), descriptor);
        if let Some((resp_name, resp_id)) = paired {
            if !tables.commands.contains_key(&resp_name) {
                tables.insert_command(resp_name, CommandDescriptor::new(resp_id));
            }
        }

        debug!(command = name, "Command registered");
        Ok(())
    }

    /// Register (or replace) an optional parameter.
    pub fn register_tlv(&self, name: &str, descriptor: TlvDescriptor) -> Result<()> {
        let mut tables = self.tables.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_REGISTRY_WRITE_LOCK.to_string())
        })?;
        tables.insert_tlv(name.to_string(), descriptor);
        debug!(tlv = name, tag = descriptor.tag, "TLV registered");
        Ok(())
    }

    pub fn command(&self, name: &str) -> Option<CommandDescriptor> {
        self.read().commands.get(name).cloned()
    }

    pub fn command_name(&self, id: u32) -> Option<String> {
        self.read().commands_by_id.get(&id).cloned()
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.read().commands.contains_key(name)
    }

    /// All registered command names, sorted
    pub fn commands(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().commands.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn tlv(&self, name: &str) -> Option<TlvDescriptor> {
        self.read().tlvs.get(name).copied()
    }

    pub fn tlv_name(&self, tag: u16) -> Option<String> {
        self.read().tlvs_by_tag.get(&tag).cloned()
    }

    /// Build a PDU for `command` from named fields.
    pub fn build(&self, command: &str, fields: &Fields) -> Result<Pdu> {
        let tables = self.read();
        let descriptor = tables
            .commands
            .get(command)
            .ok_or_else(|| ProtocolError::UnknownCommand(command.to_string()))?;

        let mut pdu = Pdu::new(command, descriptor.id);
        for (name, value) in fields.iter() {
            match name {
                FIELD_COMMAND_STATUS => pdu.command_status = header_int(name, value)?,
                FIELD_SEQUENCE_NUMBER => pdu.sequence_number = header_int(name, value)?,
                _ => {
                    let unknown = || ProtocolError::UnknownField {
                        command: command.to_string(),
                        field: name.to_string(),
                    };
                    if !descriptor.params.is_empty() && !descriptor.params.iter().any(|p| p == name)
                    {
                        return Err(unknown());
                    }
                    let tlv = tables.tlvs.get(name).ok_or_else(unknown)?;
                    let encoded = tlv.kind.encode_value(name, value)?;
                    pdu.push_param(tlv.tag, Some(name.to_string()), encoded);
                }
            }
        }
        Ok(pdu)
    }

    /// Builder closure for one command; fails fast when the command is unknown.
    ///
    /// The closure resolves the command again on every call, so a command that
    /// is re-registered later is built with its new descriptor.
    pub fn builder(&self, command: &str) -> Result<PduBuilder> {
        if !self.has_command(command) {
            return Err(ProtocolError::UnknownCommand(command.to_string()));
        }
        let registry = self.clone();
        let command = command.to_string();
        Ok(Arc::new(move |fields: &Fields| registry.build(&command, fields)))
    }

    /// Build the `*_resp` PDU answering `request`, carrying its sequence number.
    pub fn response_to(&self, request: &Pdu, fields: &Fields) -> Result<Pdu> {
        let name = format!("{}{RESPONSE_SUFFIX}", request.command);
        let mut pdu = self.build(&name, fields)?;
        pdu.sequence_number = request.sequence_number;
        Ok(pdu)
    }
}

fn header_int(name: &str, value: &FieldValue) -> Result<u32> {
    match value {
        FieldValue::Int(v) => Ok(*v),
        other => Err(ProtocolError::FieldType {
            field: name.to_string(),
            reason: format!("{other:?} is not an integer"),
        }),
    }
}

/// SMPP-style command table (ids from SMPP v5.0): name, id, answered by a `*_resp`.
const SMPP_COMMANDS: &[(&str, u32, bool)] = &[
    ("bind_receiver", 0x0000_0001, true),
    ("bind_transmitter", 0x0000_0002, true),
    ("query_sm", 0x0000_0003, true),
    ("submit_sm", 0x0000_0004, true),
    ("deliver_sm", 0x0000_0005, true),
    ("unbind", 0x0000_0006, true),
    ("replace_sm", 0x0000_0007, true),
    ("cancel_sm", 0x0000_0008, true),
    ("bind_transceiver", 0x0000_0009, true),
    ("outbind", 0x0000_000B, false),
    ("enquire_link", 0x0000_0015, true),
    ("submit_multi", 0x0000_0021, true),
    ("alert_notification", 0x0000_0102, false),
    ("data_sm", 0x0000_0103, true),
    ("broadcast_sm", 0x0000_0111, true),
    ("query_broadcast_sm", 0x0000_0112, true),
    ("cancel_broadcast_sm", 0x0000_0113, true),
];

/// Common optional parameter tags, numbered as in SMPP v5.0.
const SMPP_TLVS: &[(&str, u16, TlvKind)] = &[
    ("dest_addr_subunit", 0x0005, TlvKind::Int8),
    ("dest_network_type", 0x0006, TlvKind::Int8),
    ("dest_bearer_type", 0x0007, TlvKind::Int8),
    ("dest_telematics_id", 0x0008, TlvKind::Int16),
    ("source_addr_subunit", 0x000D, TlvKind::Int8),
    ("source_network_type", 0x000E, TlvKind::Int8),
    ("source_bearer_type", 0x000F, TlvKind::Int8),
    ("source_telematics_id", 0x0010, TlvKind::Int8),
    ("qos_time_to_live", 0x0017, TlvKind::Int32),
    ("payload_type", 0x0019, TlvKind::Int8),
    ("additional_status_info_text", 0x001D, TlvKind::CString),
    ("receipted_message_id", 0x001E, TlvKind::CString),
    ("ms_msg_wait_facilities", 0x0030, TlvKind::Int8),
    ("privacy_indicator", 0x0201, TlvKind::Int8),
    ("source_subaddress", 0x0202, TlvKind::Octets),
    ("dest_subaddress", 0x0203, TlvKind::Octets),
    ("user_message_reference", 0x0204, TlvKind::Int16),
    ("user_response_code", 0x0205, TlvKind::Int8),
    ("source_port", 0x020A, TlvKind::Int16),
    ("destination_port", 0x020B, TlvKind::Int16),
    ("sar_msg_ref_num", 0x020C, TlvKind::Int16),
    ("language_indicator", 0x020D, TlvKind::Int8),
    ("sar_total_segments", 0x020E, TlvKind::Int8),
    ("sar_segment_seqnum", 0x020F, TlvKind::Int8),
    ("sc_interface_version", 0x0210, TlvKind::Int8),
    ("callback_num_pres_ind", 0x0302, TlvKind::Int8),
    ("callback_num_atag", 0x0303, TlvKind::Octets),
    ("number_of_messages", 0x0304, TlvKind::Int8),
    ("callback_num", 0x0381, TlvKind::Octets),
    ("dpf_result", 0x0420, TlvKind::Int8),
    ("set_dpf", 0x0421, TlvKind::Int8),
    ("ms_availability_status", 0x0422, TlvKind::Int8),
    ("network_error_code", 0x0423, TlvKind::Octets),
    ("message_payload", 0x0424, TlvKind::Octets),
    ("delivery_failure_reason", 0x0425, TlvKind::Int8),
    ("more_messages_to_send", 0x0426, TlvKind::Int8),
    ("message_state", 0x0427, TlvKind::Int8),
    ("ussd_service_op", 0x0501, TlvKind::Octets),
    ("display_time", 0x1201, TlvKind::Int8),
    ("sms_signal", 0x1203, TlvKind::Int16),
    ("ms_validity", 0x1204, TlvKind::Octets),
    ("alert_on_message_delivery", 0x130C, TlvKind::Octets),
    ("its_reply_type", 0x1380, TlvKind::Int8),
    ("its_session_info", 0x1383, TlvKind::Octets),
];
