//! Value Codec Module
//!
//! Serializes structured values to the stored wire format `"{0|1}|{payload}"`:
//! `0` carries the JSON text as-is, `1` carries base64 of the zlib-compressed
//! JSON text.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::CodecError;

/// Default size in bytes at which payloads get compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

const RAW_TAG: &str = "0|";
const COMPRESSED_TAG: &str = "1|";

// == Value Codec ==
/// Self-describing encoder/decoder for cached values.
#[derive(Debug, Clone, Copy)]
pub struct ValueCodec {
    compression_threshold: usize,
}

impl ValueCodec {
    pub fn new(compression_threshold: usize) -> Self {
        Self {
            compression_threshold,
        }
    }

    pub fn compression_threshold(&self) -> usize {
        self.compression_threshold
    }

    // == Encode ==
    /// Encodes a JSON value, compressing it when the text reaches the threshold.
    ///
    /// Object keys are emitted in sorted order, so equal values always encode
    /// to identical bytes.
    pub fn encode(&self, value: &Value) -> Result<String, CodecError> {
        let json = to_canonical_json(value)?;
        if json.len() < self.compression_threshold {
            return Ok(format!("{RAW_TAG}{json}"));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(json.as_bytes())?;
        let compressed = encoder.finish()?;
        Ok(format!("{COMPRESSED_TAG}{}", STANDARD.encode(compressed)))
    }

    /// Encodes any serializable value.
    pub fn encode_serializable<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, CodecError> {
        self.encode(&serde_json::to_value(value)?)
    }

    // == Decode ==
    /// Decodes a stored payload.
    ///
    /// Accepts the tagged form, raw bytes of it, a bare legacy JSON document,
    /// or a JSON string wrapping the tagged form. Returns `None` for anything
    /// malformed.
    pub fn decode(&self, data: impl AsRef<[u8]>) -> Option<Value> {
        match self.try_decode(data.as_ref()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Discarding undecodable cache payload");
                None
            }
        }
    }

    /// Fallible variant of [`ValueCodec::decode`].
    pub fn try_decode(&self, data: &[u8]) -> Result<Value, CodecError> {
        let text = std::str::from_utf8(data).map_err(|_| CodecError::Utf8)?;
        let text = text.trim();

        if let Some(payload) = text.strip_prefix(RAW_TAG) {
            return Ok(serde_json::from_str(payload)?);
        }
        if let Some(payload) = text.strip_prefix(COMPRESSED_TAG) {
            return decompress(payload);
        }
        if let Some((tag, _)) = text.split_once('|') {
            if tag.len() == 1 && tag.chars().all(|c| c.is_ascii_digit()) {
                return Err(CodecError::Discriminator(tag.to_string()));
            }
        }

        // Legacy untagged JSON, possibly a string that wraps a tagged payload.
        let legacy: Value = serde_json::from_str(text)?;
        match legacy {
            Value::String(inner) if is_tagged(&inner) => self.try_decode(inner.as_bytes()),
            other => Ok(other),
        }
    }
}

impl Default for ValueCodec {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_THRESHOLD)
    }
}

/// Serializes a value to JSON text with sorted object keys.
pub fn to_canonical_json(value: &Value) -> Result<String, CodecError> {
    // serde_json::Map is BTreeMap-backed, so keys come out sorted.
    Ok(serde_json::to_string(value)?)
}

fn is_tagged(text: &str) -> bool {
    text.starts_with(RAW_TAG) || text.starts_with(COMPRESSED_TAG)
}

fn decompress(payload: &str) -> Result<Value, CodecError> {
    let compressed = STANDARD.decode(payload)?;
    let mut json = String::new();
    ZlibDecoder::new(compressed.as_slice()).read_to_string(&mut json)?;
    Ok(serde_json::from_str(&json)?)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_small_value_is_raw() {
        let codec = ValueCodec::default();
        let encoded = codec.encode(&json!({"b": 1, "a": [true, null]})).unwrap();
        assert_eq!(encoded, r#"0|{"a":[true,null],"b":1}"#);
    }

    #[test]
    fn test_large_value_is_compressed() {
        let codec = ValueCodec::default();
        let value = json!({"body": "x".repeat(4096)});
        let encoded = codec.encode(&value).unwrap();

        assert!(encoded.starts_with("1|"));
        assert!(encoded.len() < 4096);
        assert_eq!(codec.decode(&encoded), Some(value));
    }

    #[test]
    fn test_threshold_boundary_compresses() {
        // `"` + 1022 chars + `"` = exactly 1024 bytes of JSON
        let codec = ValueCodec::default();
        let at = json!("y".repeat(1022));
        let below = json!("y".repeat(1021));

        assert!(codec.encode(&at).unwrap().starts_with("1|"));
        assert!(codec.encode(&below).unwrap().starts_with("0|"));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let codec = ValueCodec::new(16);
        let a = json!({"z": 1, "m": {"y": 2, "x": 3}, "list": [3, 2, 1]});
        let b = json!({"list": [3, 2, 1], "m": {"x": 3, "y": 2}, "z": 1});
        assert_eq!(codec.encode(&a).unwrap(), codec.encode(&b).unwrap());
    }

    #[test]
    fn test_decode_raw_bytes() {
        let codec = ValueCodec::default();
        assert_eq!(codec.decode(b"0|[1,2,3]".as_slice()), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_decode_legacy_json() {
        let codec = ValueCodec::default();
        assert_eq!(codec.decode(r#"{"v": 1}"#), Some(json!({"v": 1})));
        assert_eq!(codec.decode(r#""plain""#), Some(json!("plain")));
        assert_eq!(codec.decode("42"), Some(json!(42)));
    }

    #[test]
    fn test_decode_double_encoded_string() {
        let codec = ValueCodec::default();
        let inner = codec.encode(&json!({"x": 2})).unwrap();
        let wrapped = serde_json::to_string(&inner).unwrap();
        assert_eq!(codec.decode(wrapped), Some(json!({"x": 2})));
    }

    #[test]
    fn test_decode_malformed_returns_none() {
        let codec = ValueCodec::default();
        assert_eq!(codec.decode("1|not-base64!!"), None);
        assert_eq!(codec.decode("1|aGVsbG8="), None); // valid base64, not zlib
        assert_eq!(codec.decode("0|{broken"), None);
        assert_eq!(codec.decode("7|{}"), None);
        assert_eq!(codec.decode("not json at all"), None);
        assert_eq!(codec.decode(&[0xffu8, 0xfe, 0x00][..]), None);
    }

    #[test]
    fn test_encode_serializable_struct() {
        #[derive(Serialize)]
        struct Post {
            id: u32,
            title: &'static str,
        }

        let codec = ValueCodec::default();
        let encoded = codec.encode_serializable(&Post { id: 7, title: "hi" }).unwrap();
        assert_eq!(codec.decode(encoded), Some(json!({"id": 7, "title": "hi"})));
    }
}
