use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use stagecraft::core::cipher::{AesGcm, Cipher, DerivedKey};
use stagecraft::LocalStore;
use tempfile::TempDir;

/// Generate a payload of given size.
fn generate_payload(size: usize) -> Vec<u8> {
    vec![b'x'; size]
}

/// Passphrase key derivation (PBKDF2, fixed iteration count).
fn bench_derive_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_key");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("pbkdf2_sha256", |b| {
        b.iter(|| black_box(DerivedKey::from_passphrase(black_box("correct horse"))));
    });

    group.finish();
}

/// Seal/open roundtrip with varying payload sizes.
fn bench_seal_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("seal_open");
    group.sample_size(50);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let cipher = AesGcm;
    let key = DerivedKey::from_passphrase("bench");
    let sizes = [32, 256, 1024, 4096, 16384];

    for size in sizes {
        let payload = generate_payload(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(
            BenchmarkId::new("roundtrip", format!("{}B", size)),
            &payload,
            |b, payload| {
                b.iter(|| {
                    let encrypted = cipher.encrypt(black_box(payload), &key).unwrap();
                    let decrypted = cipher.decrypt(black_box(&encrypted), &key).unwrap();
                    black_box(decrypted);
                });
            },
        );
    }

    group.finish();
}

/// Full store write: read, decrypt, mutate, encrypt, atomic rename.
fn bench_store_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_set");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));

    for count in [10, 100] {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().join(".secrets"), tmp.path().join("cache"));
        store.set_cached_key("bench").unwrap();
        for i in 0..count {
            store.set(&format!("secret-{}", i), "value").unwrap();
        }

        group.bench_function(BenchmarkId::new("secrets", count), |b| {
            b.iter(|| store.set(black_box("secret-0"), black_box("updated")).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_derive_key, bench_seal_open, bench_store_set);
criterion_main!(benches);
