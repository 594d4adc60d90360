//! # CryptGuard Envelope
//!
//! Self-describing encrypted file containers with optional time-lock and
//! deadline.
//!
//! ## Quick Start
//!
//! ```rust
//! use cryptguard_envelope::{CryptGuard, OpenOutcome, SealRequest};
//!
//! let guard = CryptGuard::new();
//! let sealed = guard
//!     .seal(&SealRequest::new(b"hello", "a.txt", "text/plain"))
//!     .unwrap();
//!
//! // The key travels separately from the envelope.
//! let key = sealed.key.to_hex();
//!
//! match guard.open(&sealed.envelope, &key).unwrap() {
//!     OpenOutcome::Opened(file) => assert_eq!(file.plaintext, b"hello"),
//!     OpenOutcome::Refused(why) => panic!("{}", why),
//! }
//! ```
//!
//! ## Security Properties
//!
//! - **AES-256-GCM**: fresh random key and nonce per container
//! - **Uniform errors**: wrong key and tampering produce the same error
//! - **Policy before crypto**: a locked or expired container is refused
//!   before its ciphertext is touched, and a lock never reveals its instant
//! - **Optional header binding**: [`MetadataBinding::Authenticated`] makes
//!   the plaintext header tamper-evident
//!
//! ## What's NOT Provided
//!
//! - Key distribution or storage
//! - Streaming encryption
//! - Multi-recipient encryption, escrow, revocation

#![deny(unsafe_code)]

// ---------------------------------------------------------------------------
// Internal modules
// ---------------------------------------------------------------------------

mod aead;

// Wire module is public for the CLI inspect command and fuzzing
pub mod wire;

pub mod clock;
pub mod config;
pub mod notify;
pub mod policy;

mod container;
mod error;
mod key;

// ---------------------------------------------------------------------------
// Public interface
// ---------------------------------------------------------------------------

pub use container::{
    inspect, CryptGuard, EnvelopeInfo, MetadataBinding, OpenOutcome, OpenedContainer,
    SealRequest, SealedContainer, SEALED_FILE_SUFFIX,
};
pub use error::{
    DecodeError, DecryptionError, EncodingError, EntropyError, KeyFormatError, OpenError,
    SealError,
};
pub use key::{SymmetricKey, KEY_HEX_CHARS};
pub use notify::{AccessEvent, AccessNotice, Notifier};
pub use policy::{AccessState, AccessWindow, Refusal, TimeRemaining};
