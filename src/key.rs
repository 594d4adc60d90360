//! Symmetric container keys.
//!
//! A key is 32 bytes from the OS random source. It leaves the process only
//! as a 64-character lowercase hex string, handed to the recipient
//! out-of-band from the envelope.

use core::fmt;
use core::str::FromStr;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{EntropyError, KeyFormatError};
use crate::wire::AES_KEY_BYTES;

/// Length of the serialized key string.
pub const KEY_HEX_CHARS: usize = AES_KEY_BYTES * 2;

/// AES-256 key for one container.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; AES_KEY_BYTES],
}

impl SymmetricKey {
    /// Draw a fresh key from the OS CSPRNG.
    pub fn generate() -> Result<Self, EntropyError> {
        let mut bytes = [0u8; AES_KEY_BYTES];
        getrandom::getrandom(&mut bytes).map_err(|_| EntropyError)?;
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: [u8; AES_KEY_BYTES]) -> Self {
        Self { bytes }
    }

    /// Serialize: always 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a key string. Surrounding whitespace is ignored; anything else
    /// that is not exactly 64 hex digits is rejected.
    pub fn from_hex(s: &str) -> Result<Self, KeyFormatError> {
        let s = s.trim();
        if s.len() != KEY_HEX_CHARS {
            return Err(KeyFormatError);
        }
        let mut bytes = Zeroizing::new([0u8; AES_KEY_BYTES]);
        hex::decode_to_slice(s, bytes.as_mut()).map_err(|_| KeyFormatError)?;
        Ok(Self { bytes: *bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; AES_KEY_BYTES] {
        &self.bytes
    }
}

impl FromStr for SymmetricKey {
    type Err = KeyFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}
