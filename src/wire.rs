//! Envelope wire format
//!
//! Format:
//!   metadata_len[4, u32 BE] || metadata[metadata_len] || nonce[12] || aead_ct[16+]
//!
//! metadata = compact UTF-8 JSON, fields in this order:
//!   {"type": str, "name": str, "iv": [u8; 12], "timeLock": i64|null, "deadline": i64|null}
//!
//! `iv` is a copy of the nonce kept for compatibility with existing
//! containers. Decryption always uses the dedicated nonce field.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodingError};
use crate::policy::AccessWindow;

// ---------------------------------------------------------------------------
// Component sizes
// ---------------------------------------------------------------------------

/// Big-endian u32 metadata length prefix
pub const LENGTH_PREFIX_BYTES: usize = 4;

pub const NONCE_BYTES: usize = 12;
pub const AEAD_TAG_BYTES: usize = 16;
pub const AES_KEY_BYTES: usize = 32;

/// Smallest possible envelope: prefix + empty metadata + nonce + tag.
/// Real envelopes are always larger since metadata is a JSON object.
pub const MIN_ENVELOPE_BYTES: usize = LENGTH_PREFIX_BYTES + NONCE_BYTES + AEAD_TAG_BYTES; // 32

// A cut inside the ciphertext body cannot be seen here: the format has no
// ciphertext length. Such an envelope decodes and then fails the GCM tag
// check in `open`, so no plaintext is released either way.

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Plaintext header describing the sealed file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    /// MIME type reported by the host. May be empty.
    #[serde(rename = "type")]
    pub mime_type: String,

    #[serde(rename = "name")]
    pub original_name: String,

    /// Non-authoritative copy of the nonce.
    #[serde(rename = "iv", default)]
    pub nonce_copy: Option<[u8; NONCE_BYTES]>,

    /// Unlock instant, epoch milliseconds.
    #[serde(rename = "timeLock", default)]
    pub unlock_at: Option<i64>,

    /// Deadline, epoch milliseconds.
    #[serde(rename = "deadline", default)]
    pub expire_at: Option<i64>,
}

impl Metadata {
    pub fn new(
        mime_type: impl Into<String>,
        original_name: impl Into<String>,
        nonce: &[u8; NONCE_BYTES],
        window: &AccessWindow,
    ) -> Self {
        Self {
            mime_type: mime_type.into(),
            original_name: original_name.into(),
            nonce_copy: Some(*nonce),
            unlock_at: window.unlock_at().map(|t| t.timestamp_millis()),
            expire_at: window.expire_at().map(|t| t.timestamp_millis()),
        }
    }

    /// The access window recorded in this header.
    pub fn access_window(&self) -> Result<AccessWindow, DecodeError> {
        AccessWindow::from_millis(self.unlock_at, self.expire_at)
            .ok_or_else(|| DecodeError::MalformedMetadata("timestamp out of range".into()))
    }
}

/// Borrowed view of a parsed envelope.
#[derive(Debug, Clone)]
pub struct EnvelopeParts<'a> {
    pub metadata_len: u32,
    pub metadata: Metadata,
    /// Exact metadata bytes as they appear on the wire.
    pub metadata_bytes: &'a [u8],
    pub nonce: &'a [u8; NONCE_BYTES],
    pub aead_ciphertext: &'a [u8],
}

impl EnvelopeParts<'_> {
    /// True when the metadata carries a nonce copy that disagrees with the
    /// dedicated nonce field.
    pub fn nonce_copy_mismatch(&self) -> bool {
        matches!(self.metadata.nonce_copy, Some(ref copy) if copy != self.nonce)
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

pub fn decode_envelope(data: &[u8]) -> Result<EnvelopeParts<'_>, DecodeError> {
    if data.len() < MIN_ENVELOPE_BYTES {
        return Err(DecodeError::TruncatedEnvelope);
    }

    let (prefix, rest) = split_at_checked(data, LENGTH_PREFIX_BYTES)?;
    let metadata_len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);

    let meta_len = usize::try_from(metadata_len).map_err(|_| DecodeError::TruncatedEnvelope)?;
    let (metadata_bytes, rest) = split_at_checked(rest, meta_len)?;
    let (nonce, aead_ciphertext) = split_at_checked(rest, NONCE_BYTES)?;

    if aead_ciphertext.len() < AEAD_TAG_BYTES {
        return Err(DecodeError::TruncatedEnvelope);
    }

    let nonce: &[u8; NONCE_BYTES] = nonce
        .try_into()
        .map_err(|_| DecodeError::TruncatedEnvelope)?;

    let metadata = decode_metadata(metadata_bytes)?;

    Ok(EnvelopeParts {
        metadata_len,
        metadata,
        metadata_bytes,
        nonce,
        aead_ciphertext,
    })
}

/// Parse and schema-check metadata bytes.
///
/// Bytes that are not JSON at all count as truncation (a cut-off header is
/// the usual cause). JSON that does not match the schema is malformed.
pub fn decode_metadata(bytes: &[u8]) -> Result<Metadata, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|_| DecodeError::TruncatedEnvelope)?;

    if !value.is_object() {
        return Err(DecodeError::MalformedMetadata("metadata is not an object".into()));
    }

    let metadata: Metadata = serde_json::from_value(value)
        .map_err(|e| DecodeError::MalformedMetadata(e.to_string()))?;

    metadata.access_window()?;
    Ok(metadata)
}

fn split_at_checked(data: &[u8], mid: usize) -> Result<(&[u8], &[u8]), DecodeError> {
    if data.len() < mid {
        return Err(DecodeError::TruncatedEnvelope);
    }
    Ok(data.split_at(mid))
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Canonical metadata bytes. Deterministic for a given [`Metadata`].
pub fn encode_metadata(metadata: &Metadata) -> Result<Vec<u8>, EncodingError> {
    let bytes = serde_json::to_vec(metadata).map_err(|_| EncodingError)?;
    if u32::try_from(bytes.len()).is_err() {
        return Err(EncodingError);
    }
    Ok(bytes)
}

/// Lay out pre-encoded metadata, nonce and ciphertext.
pub fn assemble_envelope(
    metadata_bytes: &[u8],
    nonce: &[u8; NONCE_BYTES],
    aead_ct: &[u8],
) -> Result<Vec<u8>, EncodingError> {
    let metadata_len = u32::try_from(metadata_bytes.len()).map_err(|_| EncodingError)?;
    if aead_ct.len() < AEAD_TAG_BYTES {
        return Err(EncodingError);
    }

    let mut out = Vec::with_capacity(
        LENGTH_PREFIX_BYTES + metadata_bytes.len() + NONCE_BYTES + aead_ct.len(),
    );

    out.extend_from_slice(&metadata_len.to_be_bytes());
    out.extend_from_slice(metadata_bytes);
    out.extend_from_slice(nonce);
    out.extend_from_slice(aead_ct);

    Ok(out)
}

pub fn encode_envelope(
    metadata: &Metadata,
    nonce: &[u8; NONCE_BYTES],
    aead_ct: &[u8],
) -> Result<Vec<u8>, EncodingError> {
    let metadata_bytes = encode_metadata(metadata)?;
    assemble_envelope(&metadata_bytes, nonce, aead_ct)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> Metadata {
        Metadata {
            mime_type: "text/plain".into(),
            original_name: "a.txt".into(),
            nonce_copy: Some([7u8; NONCE_BYTES]),
            unlock_at: None,
            expire_at: Some(1_700_000_000_000),
        }
    }

    fn envelope_with_metadata(json: &[u8]) -> Vec<u8> {
        assemble_envelope(json, &[0u8; NONCE_BYTES], &[0u8; AEAD_TAG_BYTES]).unwrap()
    }

    #[test]
    fn canonical_json_layout() {
        let bytes = encode_metadata(&sample_metadata()).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"type":"text/plain","name":"a.txt","iv":[7,7,7,7,7,7,7,7,7,7,7,7],"timeLock":null,"deadline":1700000000000}"#
        );
    }

    #[test]
    fn encoded_length_is_exact() {
        let meta = sample_metadata();
        let meta_len = encode_metadata(&meta).unwrap().len();
        let ct = [0x55u8; 40];
        let env = encode_envelope(&meta, &[1u8; NONCE_BYTES], &ct).unwrap();
        assert_eq!(env.len(), 4 + meta_len + 12 + ct.len());
        assert_eq!(u32::from_be_bytes([env[0], env[1], env[2], env[3]]) as usize, meta_len);
    }

    #[test]
    fn decode_returns_views_into_input() {
        let meta = sample_metadata();
        let env = encode_envelope(&meta, &[1u8; NONCE_BYTES], &[9u8; 20]).unwrap();
        let parts = decode_envelope(&env).unwrap();
        assert_eq!(parts.metadata, meta);
        assert_eq!(parts.nonce, &[1u8; NONCE_BYTES]);
        assert_eq!(parts.aead_ciphertext, &[9u8; 20]);
        assert_eq!(parts.metadata_bytes, &env[4..4 + parts.metadata_len as usize]);
        assert!(parts.nonce_copy_mismatch());
    }

    #[test]
    fn short_inputs_are_truncated() {
        assert_eq!(decode_envelope(b"").unwrap_err(), DecodeError::TruncatedEnvelope);
        assert_eq!(decode_envelope(&[0, 0, 0]).unwrap_err(), DecodeError::TruncatedEnvelope);
    }

    #[test]
    fn below_minimum_size_is_truncated() {
        for len in 0..MIN_ENVELOPE_BYTES {
            let data = vec![0u8; len];
            assert_eq!(decode_envelope(&data).unwrap_err(), DecodeError::TruncatedEnvelope);
        }
    }

    #[test]
    fn oversized_length_prefix_is_truncated() {
        let mut env = envelope_with_metadata(br#"{"type":"","name":"x"}"#);
        env[..4].copy_from_slice(&u32::MAX.to_be_bytes());
        assert_eq!(decode_envelope(&env).unwrap_err(), DecodeError::TruncatedEnvelope);
    }

    #[test]
    fn missing_tag_is_truncated() {
        let json = br#"{"type":"","name":"x"}"#;
        let mut env = Vec::new();
        env.extend_from_slice(&(json.len() as u32).to_be_bytes());
        env.extend_from_slice(json);
        env.extend_from_slice(&[0u8; NONCE_BYTES]);
        env.extend_from_slice(&[0u8; AEAD_TAG_BYTES - 1]);
        assert_eq!(decode_envelope(&env).unwrap_err(), DecodeError::TruncatedEnvelope);
    }

    #[test]
    fn non_json_metadata_is_truncated() {
        let env = envelope_with_metadata(br#"{"type":"text/pl"#);
        assert_eq!(decode_envelope(&env).unwrap_err(), DecodeError::TruncatedEnvelope);
        let env = envelope_with_metadata(&[0xff, 0xfe, 0xfd]);
        assert_eq!(decode_envelope(&env).unwrap_err(), DecodeError::TruncatedEnvelope);
    }

    #[test]
    fn schema_violations_are_malformed() {
        let cases: &[&[u8]] = &[
            br#"[1,2,3]"#,
            br#"{"name":"a.txt"}"#,
            br#"{"type":"text/plain"}"#,
            br#"{"type":null,"name":"a.txt"}"#,
            br#"{"type":"text/plain","name":"a.txt","iv":[1,2,3]}"#,
            br#"{"type":"text/plain","name":"a.txt","timeLock":"soon"}"#,
            br#"{"type":"text/plain","name":"a.txt","owner":"eve"}"#,
        ];
        for json in cases {
            let env = envelope_with_metadata(json);
            match decode_envelope(&env) {
                Err(DecodeError::MalformedMetadata(_)) => {}
                other => panic!("{}: {:?}", String::from_utf8_lossy(json), other),
            }
        }
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let env = envelope_with_metadata(br#"{"type":"","name":"notes"}"#);
        let parts = decode_envelope(&env).unwrap();
        assert_eq!(parts.metadata.nonce_copy, None);
        assert_eq!(parts.metadata.unlock_at, None);
        assert_eq!(parts.metadata.expire_at, None);
        assert!(!parts.nonce_copy_mismatch());
    }

    #[test]
    fn out_of_range_timestamp_is_malformed() {
        let json = format!(r#"{{"type":"","name":"x","deadline":{}}}"#, i64::MAX);
        let env = envelope_with_metadata(json.as_bytes());
        assert!(matches!(
            decode_envelope(&env),
            Err(DecodeError::MalformedMetadata(_))
        ));
    }

    #[test]
    fn short_ciphertext_rejected_on_encode() {
        let meta = sample_metadata();
        assert_eq!(
            encode_envelope(&meta, &[0u8; NONCE_BYTES], &[0u8; 15]),
            Err(EncodingError)
        );
    }
}
