//! Property tests: round-trip, truncation handling, tamper detection.

use chrono::DateTime;
use proptest::prelude::*;

use cryptguard_envelope::wire::decode_envelope;
use cryptguard_envelope::{
    AccessWindow, CryptGuard, DecodeError, OpenError, OpenOutcome, SealRequest, SymmetricKey,
};

// 2020-01-01 .. 2100-01-01 in epoch millis
const MIN_MS: i64 = 1_577_836_800_000;
const MAX_MS: i64 = 4_102_444_800_000;

fn guard() -> CryptGuard {
    // every window generated below is open at this instant
    let now = DateTime::from_timestamp_millis(MIN_MS).unwrap();
    CryptGuard::new().with_clock(std::sync::Arc::new(
        cryptguard_envelope::clock::ManualClock::new(now),
    ))
}

fn open_window() -> impl Strategy<Value = AccessWindow> {
    // unlock at or before MIN_MS, deadline (if any) after it
    (
        prop::option::of(0i64..=MIN_MS),
        prop::option::of(MIN_MS + 1..MAX_MS),
    )
        .prop_map(|(u, e)| AccessWindow::from_millis(u, e).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn seal_open_roundtrip(
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        name in "\\PC{0,40}",
        mime in "[a-z]{0,10}(/[a-z0-9.+-]{1,20})?",
        window in open_window(),
    ) {
        let guard = guard();
        let sealed = guard
            .seal(&SealRequest::new(&plaintext, &name, &mime).with_window(window))
            .unwrap();
        match guard.open(&sealed.envelope, &sealed.key.to_hex()).unwrap() {
            OpenOutcome::Opened(c) => {
                prop_assert_eq!(c.plaintext, plaintext);
                prop_assert_eq!(c.original_name, name);
                prop_assert_eq!(c.mime_type, mime);
            }
            OpenOutcome::Refused(r) => prop_assert!(false, "refused: {}", r),
        }
    }

    #[test]
    fn every_prefix_is_rejected(
        plaintext in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let guard = guard();
        let sealed = guard
            .seal(&SealRequest::new(&plaintext, "f", "text/plain"))
            .unwrap();
        let key = sealed.key.to_hex();
        let tag_boundary = sealed.envelope.len() - plaintext.len();

        for len in 0..sealed.envelope.len() {
            let prefix = &sealed.envelope[..len];
            if len < tag_boundary {
                prop_assert_eq!(
                    decode_envelope(prefix).unwrap_err(),
                    DecodeError::TruncatedEnvelope
                );
            } else {
                // body cut: structurally valid, caught by the tag
                prop_assert!(decode_envelope(prefix).is_ok());
                prop_assert_eq!(
                    guard.open(prefix, &key),
                    Err(OpenError::AuthenticationFailure)
                );
            }
        }
    }

    #[test]
    fn empty_plaintext_prefixes_are_all_truncated(cut in any::<prop::sample::Index>()) {
        let sealed = guard()
            .seal(&SealRequest::new(b"", "f", "text/plain"))
            .unwrap();
        let len = cut.index(sealed.envelope.len());
        prop_assert_eq!(
            decode_envelope(&sealed.envelope[..len]).unwrap_err(),
            DecodeError::TruncatedEnvelope
        );
    }

    #[test]
    fn decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_envelope(&data);
    }

    #[test]
    fn single_bit_flip_in_ciphertext_is_detected(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        pick in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let guard = guard();
        let sealed = guard
            .seal(&SealRequest::new(&plaintext, "f", ""))
            .unwrap();
        let parts = decode_envelope(&sealed.envelope).unwrap();
        let ct_start = sealed.envelope.len() - parts.aead_ciphertext.len();
        let offset = ct_start + pick.index(parts.aead_ciphertext.len());

        let mut tampered = sealed.envelope.clone();
        tampered[offset] ^= 1 << bit;
        prop_assert_eq!(
            guard.open(&tampered, &sealed.key.to_hex()),
            Err(OpenError::AuthenticationFailure)
        );
    }

    #[test]
    fn key_hex_roundtrip(bytes in any::<[u8; 32]>()) {
        let key = SymmetricKey::from_bytes(bytes);
        let s = key.to_hex();
        prop_assert_eq!(s.len(), 64);
        prop_assert!(s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        prop_assert_eq!(SymmetricKey::from_hex(&s).unwrap(), key);
    }
}
