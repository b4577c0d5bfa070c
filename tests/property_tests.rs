//! Property-based tests using proptest
//!
//! These tests check the sequencing and framing laws across randomly
//! generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use proptest::prelude::*;
use smpp_session::session::{SequenceCounter, MAX_SEQUENCE};
use smpp_session::{Fields, PduCodec, Registry, SmppCodec};

// Property: allocation never yields 0, never exceeds the 31-bit range, and wraps to 1
proptest! {
    #[test]
    fn prop_sequence_wraps_within_range(start in 0u32..=MAX_SEQUENCE, steps in 1usize..64) {
        let mut counter = SequenceCounter::starting_at(start);
        let mut previous = counter.current();

        for _ in 0..steps {
            let peeked = counter.peek_next();
            let next = counter.next();
            prop_assert_eq!(peeked, next);
            prop_assert!(next >= 1 && next <= MAX_SEQUENCE);
            if previous == MAX_SEQUENCE {
                prop_assert_eq!(next, 1);
            } else {
                prop_assert_eq!(next, previous + 1);
            }
            previous = next;
        }
    }
}

// Property: peeking never changes the counter
proptest! {
    #[test]
    fn prop_peek_is_pure(start in 0u32..=MAX_SEQUENCE) {
        let counter = SequenceCounter::starting_at(start);
        let _ = counter.peek_next();
        prop_assert_eq!(counter.current(), start);
    }
}

// Property: however a byte stream is chunked, the same PDUs come out in order
proptest! {
    #[test]
    fn prop_chunking_does_not_change_decoded_pdus(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8),
        chunk in 1usize..40,
    ) {
        let registry = Registry::smpp();
        let codec = SmppCodec::new(registry.clone());

        let mut expected = Vec::new();
        let mut wire = BytesMut::new();
        for (index, payload) in payloads.iter().enumerate() {
            let pdu = registry
                .build("data_sm", &Fields::new().with("message_payload", payload.clone()))
                .unwrap()
                .with_sequence_number(index as u32 + 1);
            codec.encode(&pdu, &mut wire).unwrap();
            expected.push(pdu);
        }

        let mut buffer = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buffer.extend_from_slice(piece);
            while let Some(pdu) = codec.decode_one(&mut buffer).unwrap() {
                decoded.push(pdu);
            }
        }

        prop_assert!(buffer.is_empty());
        prop_assert_eq!(decoded, expected);
    }
}

// Property: arbitrary input never panics the decoder and never loses bytes on "need more"
proptest! {
    #[test]
    fn prop_decoder_total_on_garbage(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let codec = SmppCodec::new(Registry::smpp());
        let mut buffer = BytesMut::from(&data[..]);
        let before = buffer.len();

        if let Ok(None) = codec.decode_one(&mut buffer) {
            prop_assert_eq!(buffer.len(), before);
        }
    }
}
