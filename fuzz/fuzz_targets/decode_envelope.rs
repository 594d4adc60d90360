#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(parts) = cryptguard_envelope::wire::decode_envelope(data) {
        let _ = parts.metadata.access_window();
    }
    let _ = cryptguard_envelope::inspect(data);
});
