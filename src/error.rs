//! Unified error types for CryptGuard containers.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Generic AEAD failure. Wrong key, tampered ciphertext, tampered nonce and
/// mismatched associated data are indistinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wrong key or corrupted file")]
pub struct DecryptionError;

/// Failure on the encrypt path (cipher setup, oversized metadata).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("encoding error")]
pub struct EncodingError;

/// The OS random source could not be read. Never recovered by falling back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("secure random source unavailable")]
pub struct EntropyError;

/// Key string is not exactly 64 hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid key format: expected 64 hex characters")]
pub struct KeyFormatError;

/// Structural problems found while parsing an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated envelope")]
    TruncatedEnvelope,

    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),
}

/// Errors returned by [`CryptGuard::seal`](crate::CryptGuard::seal).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SealError {
    #[error("deadline ({expire_at}) must be after the unlock time ({unlock_at})")]
    InvalidWindow {
        unlock_at: DateTime<Utc>,
        expire_at: DateTime<Utc>,
    },

    #[error(transparent)]
    Entropy(#[from] EntropyError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Errors returned by [`CryptGuard::open`](crate::CryptGuard::open).
///
/// Policy refusals (locked, expired) are not errors; they are reported as
/// [`OpenOutcome::Refused`](crate::OpenOutcome::Refused).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    InvalidKeyFormat(#[from] KeyFormatError),

    #[error("wrong key or corrupted file")]
    AuthenticationFailure,
}

/// Collapse every AEAD failure into the one generic variant.
impl From<DecryptionError> for OpenError {
    fn from(_: DecryptionError) -> Self {
        OpenError::AuthenticationFailure
    }
}

impl OpenError {
    /// True when the failure is structural and retrying with the same bytes
    /// cannot succeed regardless of key.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failure_is_generic() {
        let err: OpenError = DecryptionError.into();
        assert_eq!(err, OpenError::AuthenticationFailure);
        assert_eq!(err.to_string(), "wrong key or corrupted file");
        assert_eq!(DecryptionError.to_string(), err.to_string());
    }

    #[test]
    fn entropy_failure_surfaces_on_seal() {
        assert_eq!(SealError::from(EntropyError), SealError::Entropy(EntropyError));
        assert_eq!(
            SealError::from(EntropyError).to_string(),
            "secure random source unavailable"
        );
    }

    #[test]
    fn decode_errors_are_corruption() {
        let err: OpenError = DecodeError::TruncatedEnvelope.into();
        assert!(err.is_corruption());
        assert!(!OpenError::AuthenticationFailure.is_corruption());
        assert!(!OpenError::InvalidKeyFormat(KeyFormatError).is_corruption());
    }

    #[test]
    fn malformed_metadata_carries_reason() {
        let err = DecodeError::MalformedMetadata("missing field `name`".into());
        assert!(err.to_string().contains("missing field `name`"));
    }
}
