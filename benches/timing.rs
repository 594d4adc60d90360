use std::hint::black_box;
use std::time::Instant;

use cryptguard_envelope::{CryptGuard, MetadataBinding, SealRequest, SymmetricKey};

fn time_it<F: FnMut()>(label: &str, iters: usize, mut f: F) {
    // warmup
    for _ in 0..(iters / 10).max(10) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    let per_iter = elapsed / (iters as u32);
    println!("{:<16} total={:?}  per_iter={:?}", label, elapsed, per_iter);
}

fn main() {
    let guard = CryptGuard::new();
    let bound = CryptGuard::new().with_binding(MetadataBinding::Authenticated);

    let plaintext = vec![0x42u8; 1024];
    let request = SealRequest::new(&plaintext, "bench.bin", "application/octet-stream");

    let sealed = guard.seal(&request).unwrap();
    let key = sealed.key.to_hex();
    let wrong_key = SymmetricKey::generate().unwrap().to_hex();
    let sealed_bound = bound.seal(&request).unwrap();
    let key_bound = sealed_bound.key.to_hex();

    // Create a tampered envelope
    let mut tampered = sealed.envelope.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;

    let iters = 5_000;

    time_it("seal", iters, || {
        black_box(guard.seal(black_box(&request)).unwrap());
    });

    time_it("open", iters, || {
        let r = guard.open(black_box(&sealed.envelope), black_box(&key)).unwrap();
        black_box(r);
    });

    time_it("open_bound", iters, || {
        let r = bound.open(black_box(&sealed_bound.envelope), black_box(&key_bound)).unwrap();
        black_box(r);
    });

    time_it("wrong_key", iters, || {
        let r = guard.open(black_box(&sealed.envelope), black_box(&wrong_key));
        black_box(r.err());
    });

    time_it("tampered", iters, || {
        let r = guard.open(black_box(&tampered), black_box(&key));
        black_box(r.err());
    });

    time_it("short", iters, || {
        let r = guard.open(black_box(b"short"), black_box(&key));
        black_box(r.err());
    });

    println!("\nDone.");
}
