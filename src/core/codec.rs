//! Codec boundary between the session engine and the wire.
//!
//! The engine only needs [`PduCodec`]: decode one PDU from the buffered bytes
//! (or report that more data is needed) and encode a PDU. [`SmppCodec`] is the
//! bundled implementation; it also implements the `tokio_util` codec traits
//! so a peer can drive a plain `Framed` stream.
//!
//! ## Wire Format
//! ```text
//! [command_length(4)] [command_id(4)] [command_status(4)] [sequence_number(4)]
//! [tag(2) length(2) value(length)]*
//! ```
//! All integers are big-endian; `command_length` covers the whole PDU.
//!
//! This is an SMPP-style framing, not full SMPP: the body is read as TLVs
//! only, so mandatory body fields such as `system_id` on `bind_*` have no
//! representation. Applications needing them supply their own [`PduCodec`].

use crate::config::MAX_PDU_SIZE;
use crate::core::pdu::{Pdu, HEADER_LEN};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::registry::Registry;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Turns buffered bytes into PDUs and back.
pub trait PduCodec: Send + Sync {
    /// Decode one PDU from the front of `src`.
    ///
    /// Returns `Ok(None)` when `src` does not hold a complete PDU yet; nothing
    /// is consumed in that case.
    fn decode_one(&self, src: &mut BytesMut) -> Result<Option<Pdu>>;

    /// Append the wire form of `pdu` to `dst`.
    fn encode(&self, pdu: &Pdu, dst: &mut BytesMut) -> Result<()>;
}

/// Header framing plus tag-length-value body, names resolved via the registry.
#[derive(Debug, Clone)]
pub struct SmppCodec {
    registry: Registry,
    max_pdu_size: usize,
}

impl SmppCodec {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            max_pdu_size: MAX_PDU_SIZE,
        }
    }

    pub fn with_max_pdu_size(mut self, max_pdu_size: usize) -> Self {
        self.max_pdu_size = max_pdu_size;
        self
    }

    pub fn max_pdu_size(&self) -> usize {
        self.max_pdu_size
    }
}

impl PduCodec for SmppCodec {
    fn decode_one(&self, src: &mut BytesMut) -> Result<Option<Pdu>> {
        if src.len() < 4 {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if (length as usize) < HEADER_LEN {
            return Err(ProtocolError::InvalidHeader(length));
        }
        if length as usize > self.max_pdu_size {
            return Err(ProtocolError::OversizedPdu(length as usize));
        }
        if src.len() < length as usize {
            src.reserve(length as usize - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(length as usize).freeze();
        frame.advance(4);
        let command_id = frame.get_u32();
        let command_status = frame.get_u32();
        let sequence_number = frame.get_u32();

        let command = self
            .registry
            .command_name(command_id)
            .ok_or(ProtocolError::UnknownCommandId(command_id))?;

        let mut pdu = Pdu::new(command, command_id)
            .with_status(command_status)
            .with_sequence_number(sequence_number);

        while frame.has_remaining() {
            if frame.remaining() < 4 {
                return Err(ProtocolError::MalformedParam {
                    tag: 0,
                    reason: format!("{} trailing bytes after last parameter", frame.remaining()),
                });
            }
            let tag = frame.get_u16();
            let len = frame.get_u16() as usize;
            if frame.remaining() < len {
                return Err(ProtocolError::MalformedParam {
                    tag,
                    reason: constants::ERR_TRUNCATED_PARAM.to_string(),
                });
            }
            let value = frame.split_to(len);
            pdu.push_param(tag, self.registry.tlv_name(tag), value);
        }

        Ok(Some(pdu))
    }

    fn encode(&self, pdu: &Pdu, dst: &mut BytesMut) -> Result<()> {
        let length = pdu.encoded_len();
        if length > self.max_pdu_size {
            return Err(ProtocolError::OversizedPdu(length));
        }

        for param in &pdu.params {
            if param.value.len() > u16::MAX as usize {
                return Err(ProtocolError::FieldType {
                    field: param
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("{:#06x}", param.tag)),
                    reason: format!("{} bytes exceed the 65535 byte limit", param.value.len()),
                });
            }
        }

        dst.reserve(length);
        dst.put_u32(length as u32);
        dst.put_u32(pdu.command_id);
        dst.put_u32(pdu.command_status);
        dst.put_u32(pdu.sequence_number);
        for param in &pdu.params {
            dst.put_u16(param.tag);
            dst.put_u16(param.value.len() as u16);
            dst.put_slice(&param.value);
        }
        Ok(())
    }
}

impl Decoder for SmppCodec {
    type Item = Pdu;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Pdu>> {
        self.decode_one(src)
    }
}

impl Encoder<Pdu> for SmppCodec {
    type Error = ProtocolError;

    fn encode(&mut self, pdu: Pdu, dst: &mut BytesMut) -> Result<()> {
        <Self as PduCodec>::encode(self, &pdu, dst)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::core::pdu::Fields;

    fn codec() -> SmppCodec {
        SmppCodec::new(Registry::smpp())
    }

    #[test]
    fn test_partial_header_needs_more_data() {
        let mut buf = BytesMut::from(&[0u8, 0, 0][..]);
        assert!(codec().decode_one(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_partial_body_is_not_consumed() {
        let registry = Registry::smpp();
        let pdu = registry
            .build("submit_sm", &Fields::new().with("message_payload", "hello"))
            .unwrap()
            .with_sequence_number(7);
        let mut full = BytesMut::new();
        PduCodec::encode(&codec(), &pdu, &mut full).unwrap();

        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        assert!(codec().decode_one(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), full.len() - 1);

        partial.extend_from_slice(&full[full.len() - 1..]);
        let decoded = codec().decode_one(&mut partial).unwrap().unwrap();
        assert_eq!(decoded, pdu);
        assert!(partial.is_empty());
    }

    #[test]
    fn test_length_below_header_is_rejected() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 8, 0, 0, 0, 0][..]);
        assert!(matches!(
            codec().decode_one(&mut buf),
            Err(ProtocolError::InvalidHeader(8))
        ));
    }

    #[test]
    fn test_oversized_length_is_rejected_before_buffering() {
        let mut buf = BytesMut::new();
        buf.put_u32(1_000_000);
        let codec = codec().with_max_pdu_size(4096);
        assert!(matches!(
            codec.decode_one(&mut buf),
            Err(ProtocolError::OversizedPdu(1_000_000))
        ));
    }

    #[test]
    fn test_unknown_command_id_is_a_decode_error() {
        let mut buf = BytesMut::new();
        buf.put_u32(16);
        buf.put_u32(0x0000_7777);
        buf.put_u32(0);
        buf.put_u32(1);
        assert!(matches!(
            codec().decode_one(&mut buf),
            Err(ProtocolError::UnknownCommandId(0x7777))
        ));
    }

    #[test]
    fn test_truncated_param_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(16 + 4 + 1);
        buf.put_u32(0x0000_0015);
        buf.put_u32(0);
        buf.put_u32(1);
        buf.put_u16(0x0424);
        buf.put_u16(10);
        buf.put_u8(0xAA);
        assert!(matches!(
            codec().decode_one(&mut buf),
            Err(ProtocolError::MalformedParam { tag: 0x0424, .. })
        ));
    }

    #[test]
    fn test_unregistered_tag_decodes_without_name() {
        let mut buf = BytesMut::new();
        buf.put_u32(16 + 4 + 2);
        buf.put_u32(0x0000_0015);
        buf.put_u32(0);
        buf.put_u32(3);
        buf.put_u16(0x3FFF);
        buf.put_u16(2);
        buf.put_u16(0xBEEF);

        let pdu = codec().decode_one(&mut buf).unwrap().unwrap();
        assert_eq!(pdu.command, "enquire_link");
        assert_eq!(pdu.params[0].name, None);
        assert_eq!(pdu.param_by_tag(0x3FFF).unwrap().as_ref(), &[0xBE, 0xEF]);
    }
}
