//! BLOB payload coding.
//!
//! Binary payloads travel base64-encoded on the wire. When the declared
//! format string ends in `.z` the payload is additionally zlib-compressed
//! before encoding; decoding reverses both stages.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::ProtocolResult;

/// Whether a format string declares zlib compression.
pub fn is_compressed_format(format: &str) -> bool {
    format.ends_with(".z")
}

/// The display form of a format string, with any `.z` compression suffix
/// removed.
pub fn plain_format(format: &str) -> &str {
    format.strip_suffix(".z").unwrap_or(format)
}

/// Encode a binary payload for the wire: zlib when `format` ends in `.z`,
/// then base64.
pub fn encode(data: &[u8], format: &str) -> ProtocolResult<String> {
    if is_compressed_format(format) {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        Ok(BASE64.encode(encoder.finish()?))
    } else {
        Ok(BASE64.encode(data))
    }
}

/// Decode a wire payload back to plain bytes: base64 always, zlib when
/// `format` ends in `.z`.
pub fn decode(value: &str, format: &str) -> ProtocolResult<Vec<u8>> {
    let raw = BASE64.decode(value)?;
    if is_compressed_format(format) {
        let mut out = Vec::new();
        ZlibDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
        Ok(out)
    } else {
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use proptest::prelude::*;

    #[test]
    fn test_plain_format_strips_compression_suffix() {
        assert_eq!(plain_format("image.fits.z"), "image.fits");
        assert_eq!(plain_format(".fits"), ".fits");
        assert_eq!(plain_format(".z"), "");
    }

    #[test]
    fn test_uncompressed_is_plain_base64() {
        let encoded = encode(b"hello", ".text").unwrap();
        assert_eq!(encoded, "aGVsbG8=");
        assert_eq!(decode(&encoded, ".text").unwrap(), b"hello");
    }

    #[test]
    fn test_compressed_round_trip() {
        let payload = vec![7u8; 4096];
        let encoded = encode(&payload, ".fits.z").unwrap();
        // A run of identical bytes must actually shrink under zlib.
        assert!(encoded.len() < payload.len());
        assert_eq!(decode(&encoded, ".fits.z").unwrap(), payload);
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(decode("!!! not base64 !!!", ".text").is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip_compressed(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let encoded = encode(&data, ".bin.z").unwrap();
            prop_assert_eq!(decode(&encoded, ".bin.z").unwrap(), data);
        }

        #[test]
        fn prop_round_trip_plain(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let encoded = encode(&data, ".bin").unwrap();
            // No compression stage: the payload must survive plain base64 alone.
            prop_assert_eq!(BASE64.decode(&encoded).unwrap(), data);
        }
    }
}
