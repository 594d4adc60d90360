//! AEAD: AES-256-GCM

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use getrandom::getrandom;

use crate::error::{DecryptionError, EncodingError, EntropyError};
use crate::wire::{AES_KEY_BYTES, NONCE_BYTES};

/// Generate a random 12-byte nonce. Used during encryption only.
pub fn nonce() -> Result<[u8; NONCE_BYTES], EntropyError> {
    let mut n = [0u8; NONCE_BYTES];
    getrandom(&mut n).map_err(|_| EntropyError)?;
    Ok(n)
}

/// AEAD seal (encrypt path). Output is ciphertext || tag[16].
pub fn aead_seal(
    key: &[u8; AES_KEY_BYTES],
    nonce: &[u8; NONCE_BYTES],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncodingError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncodingError)?;
    let n = Nonce::from_slice(nonce);
    let payload = Payload { msg: plaintext, aad };
    cipher.encrypt(n, payload).map_err(|_| EncodingError)
}

/// AEAD open (decrypt path). Every failure is the same DecryptionError.
pub fn aead_open(
    key: &[u8; AES_KEY_BYTES],
    nonce: &[u8; NONCE_BYTES],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| DecryptionError)?;
    let n = Nonce::from_slice(nonce);
    let payload = Payload { msg: ciphertext, aad };
    cipher.decrypt(n, payload).map_err(|_| DecryptionError)
}
