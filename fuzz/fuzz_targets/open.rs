#![no_main]

use cryptguard_envelope::{CryptGuard, MetadataBinding, SealRequest};
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

static KEY: Lazy<String> = Lazy::new(|| {
    let sealed = CryptGuard::new()
        .seal(&SealRequest::new(b"seed", "seed.txt", "text/plain"))
        .unwrap();
    sealed.key.to_hex()
});

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let binding = if data[0] & 1 == 0 {
        MetadataBinding::Unbound
    } else {
        MetadataBinding::Authenticated
    };
    let guard = CryptGuard::new().with_binding(binding);

    let _ = guard.open(&data[1..], &KEY);

    // also try the input's tail as a key string
    let split = (data[0] as usize) % data.len();
    if let Ok(key) = std::str::from_utf8(&data[split..]) {
        let _ = guard.open(&data[1..split.max(1)], key);
    }
});
