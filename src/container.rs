//! Container pipeline: `seal` and `open` over the codec, AEAD and policy.

use core::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::aead;
use crate::clock::{Clock, SystemClock};
use crate::error::{DecodeError, OpenError, SealError};
use crate::key::SymmetricKey;
use crate::notify::{AccessEvent, AccessNotice, NoopNotifier, Notifier};
use crate::policy::{AccessState, AccessWindow, Refusal};
use crate::wire::{self, Metadata, AEAD_TAG_BYTES};

/// Suffix appended to the original file name for sealed output.
pub const SEALED_FILE_SUFFIX: &str = ".encrypted";

// ---------------------------------------------------------------------------
// Metadata binding
// ---------------------------------------------------------------------------

/// Whether the plaintext header is authenticated by the AEAD tag.
///
/// Not recorded in the envelope: sealer and opener must agree on it, the
/// same way they agree on the key. A mismatch fails authentication.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MetadataBinding {
    /// Empty associated data. Compatible with existing containers, but the
    /// header (name, MIME type, window) can be rewritten undetected.
    #[default]
    Unbound,
    /// The exact metadata bytes are the associated data.
    Authenticated,
}

impl MetadataBinding {
    fn associated_data<'a>(&self, metadata_bytes: &'a [u8]) -> &'a [u8] {
        match self {
            Self::Unbound => &[],
            Self::Authenticated => metadata_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// Everything `seal` needs. The host supplies bytes and names.
#[derive(Clone, Debug)]
pub struct SealRequest<'a> {
    pub plaintext: &'a [u8],
    pub original_name: &'a str,
    pub mime_type: &'a str,
    pub window: AccessWindow,
}

impl<'a> SealRequest<'a> {
    pub fn new(plaintext: &'a [u8], original_name: &'a str, mime_type: &'a str) -> Self {
        Self {
            plaintext,
            original_name,
            mime_type,
            window: AccessWindow::unrestricted(),
        }
    }

    pub fn with_window(mut self, window: AccessWindow) -> Self {
        self.window = window;
        self
    }

    pub fn unlock_at(mut self, at: DateTime<Utc>) -> Self {
        self.window = AccessWindow::new(Some(at), self.window.expire_at());
        self
    }

    pub fn expire_at(mut self, at: DateTime<Utc>) -> Self {
        self.window = AccessWindow::new(self.window.unlock_at(), Some(at));
        self
    }
}

/// Output of `seal`: the envelope and the key that opens it.
pub struct SealedContainer {
    pub envelope: Vec<u8>,
    pub key: SymmetricKey,
    original_name: String,
}

impl SealedContainer {
    /// `"{original_name}.encrypted"`
    pub fn suggested_file_name(&self) -> String {
        format!("{}{}", self.original_name, SEALED_FILE_SUFFIX)
    }
}

impl fmt::Debug for SealedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedContainer")
            .field("envelope_len", &self.envelope.len())
            .field("key", &self.key)
            .field("original_name", &self.original_name)
            .finish()
    }
}

/// Decrypted file with the metadata needed to restore it.
#[derive(Clone, PartialEq, Eq)]
pub struct OpenedContainer {
    pub plaintext: Vec<u8>,
    pub original_name: String,
    pub mime_type: String,
    /// `NoRestriction` or `Available`; carries time left before the deadline.
    pub access: AccessState,
}

impl fmt::Debug for OpenedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedContainer")
            .field("plaintext_len", &self.plaintext.len())
            .field("original_name", &self.original_name)
            .field("mime_type", &self.mime_type)
            .field("access", &self.access)
            .finish()
    }
}

/// Result of a well-formed `open` attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened(OpenedContainer),
    /// Policy blocked decryption; the ciphertext was not touched.
    Refused(Refusal),
}

impl OpenOutcome {
    pub fn is_opened(&self) -> bool {
        matches!(self, Self::Opened(_))
    }

    pub fn refusal(&self) -> Option<Refusal> {
        match self {
            Self::Refused(r) => Some(*r),
            Self::Opened(_) => None,
        }
    }

    pub fn into_opened(self) -> Option<OpenedContainer> {
        match self {
            Self::Opened(c) => Some(c),
            Self::Refused(_) => None,
        }
    }
}

/// What can be learned from an envelope without its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeInfo {
    pub original_name: String,
    pub mime_type: String,
    pub envelope_len: usize,
    pub metadata_len: usize,
    pub plaintext_len: usize,
    /// Whether a time-lock is set. The instant itself is not reported.
    pub time_locked: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub nonce_copy_mismatch: bool,
}

/// Inspect an envelope's header without decrypting.
pub fn inspect(envelope: &[u8]) -> Result<EnvelopeInfo, DecodeError> {
    let parts = wire::decode_envelope(envelope)?;
    let window = parts.metadata.access_window()?;
    let nonce_copy_mismatch = parts.nonce_copy_mismatch();

    Ok(EnvelopeInfo {
        original_name: parts.metadata.original_name,
        mime_type: parts.metadata.mime_type,
        envelope_len: envelope.len(),
        metadata_len: parts.metadata_bytes.len(),
        plaintext_len: parts.aead_ciphertext.len() - AEAD_TAG_BYTES,
        time_locked: window.unlock_at().is_some(),
        expires_at: window.expire_at(),
        nonce_copy_mismatch,
    })
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Seals files into time-windowed envelopes and opens them again.
///
/// Holds configuration only; calls share no mutable state and can run
/// concurrently from any number of threads.
#[derive(Clone)]
pub struct CryptGuard {
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    binding: MetadataBinding,
}

impl Default for CryptGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CryptGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptGuard")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl CryptGuard {
    /// System clock, unbound metadata, notifications discarded.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            notifier: Arc::new(NoopNotifier),
            binding: MetadataBinding::Unbound,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_binding(mut self, binding: MetadataBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn binding(&self) -> MetadataBinding {
        self.binding
    }

    /// Encrypt a file into a new envelope under a fresh key and nonce.
    ///
    /// The window is validated before any key material is generated.
    pub fn seal(&self, request: &SealRequest<'_>) -> Result<SealedContainer, SealError> {
        request.window.validate()?;

        let key = SymmetricKey::generate()?;
        let nonce = aead::nonce()?;

        let metadata = Metadata::new(
            request.mime_type,
            request.original_name,
            &nonce,
            &request.window,
        );
        let metadata_bytes = wire::encode_metadata(&metadata)?;

        let ciphertext = aead::aead_seal(
            key.as_bytes(),
            &nonce,
            request.plaintext,
            self.binding.associated_data(&metadata_bytes),
        )?;
        let envelope = wire::assemble_envelope(&metadata_bytes, &nonce, &ciphertext)?;

        tracing::debug!(
            plaintext_len = request.plaintext.len(),
            envelope_len = envelope.len(),
            time_locked = request.window.unlock_at().is_some(),
            has_deadline = request.window.expire_at().is_some(),
            binding = ?self.binding,
            "sealed container"
        );

        Ok(SealedContainer {
            envelope,
            key,
            original_name: request.original_name.to_owned(),
        })
    }

    /// Decode, apply the access window, then decrypt.
    ///
    /// A locked or expired container returns [`OpenOutcome::Refused`] before
    /// the key string is even parsed.
    pub fn open(&self, envelope: &[u8], key: &str) -> Result<OpenOutcome, OpenError> {
        let parts = wire::decode_envelope(envelope)?;

        if parts.nonce_copy_mismatch() {
            tracing::warn!("metadata nonce copy differs from envelope nonce, using envelope nonce");
        }

        let access = parts.metadata.access_window()?.evaluate(self.clock.now_utc());
        if let Some(refusal) = access.refusal() {
            tracing::debug!(retryable = refusal.is_retryable(), "open refused by access window");
            return Ok(OpenOutcome::Refused(refusal));
        }

        let key = SymmetricKey::from_hex(key)?;
        let plaintext = aead::aead_open(
            key.as_bytes(),
            parts.nonce,
            parts.aead_ciphertext,
            self.binding.associated_data(parts.metadata_bytes),
        )
        .map_err(|e| {
            tracing::debug!("container authentication failed");
            OpenError::from(e)
        })?;

        tracing::debug!(plaintext_len = plaintext.len(), "opened container");

        let Metadata {
            mime_type,
            original_name,
            ..
        } = parts.metadata;

        Ok(OpenOutcome::Opened(OpenedContainer {
            plaintext,
            original_name,
            mime_type,
            access,
        }))
    }

    /// [`open`](Self::open), then tell the owner who opened it.
    ///
    /// The event is emitted only on a successful decrypt.
    pub fn open_with_notice(
        &self,
        envelope: &[u8],
        key: &str,
        notice: &AccessNotice,
    ) -> Result<OpenOutcome, OpenError> {
        let outcome = self.open(envelope, key)?;
        if let OpenOutcome::Opened(ref opened) = outcome {
            self.notifier.notify(AccessEvent::new(
                notice,
                &opened.original_name,
                self.clock.now_utc(),
            ));
        }
        Ok(outcome)
    }
}
