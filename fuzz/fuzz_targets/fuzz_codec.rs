#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use smpp_session::{PduCodec, Registry, SmppCodec};

fuzz_target!(|data: &[u8]| {
    // Decode until the codec asks for more data or rejects the stream
    let codec = SmppCodec::new(Registry::smpp());
    let mut buffer = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode_one(&mut buffer) {}
});
