//! Record decoder benchmark suite
//!
//! Run with: `cargo bench -p sysrelay-protocol --bench decode`
//!
//! # What we measure
//!
//! - RFC 3164 decoding across payload sizes
//! - RFC 5424 decoding with and without structured data
//! - Rejection of malformed input

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use sysrelay_protocol::decode_with_year;

// =============================================================================
// Test Data
// =============================================================================

/// RFC 3164 message of roughly `size` bytes
fn create_rfc3164_message(size: usize) -> Vec<u8> {
    let mut msg = b"<34>Oct 11 22:14:15 mymachine su: ".to_vec();
    let filler = b"'su root' failed for lonvick ";
    while msg.len() < size {
        let to_add = (size - msg.len()).min(filler.len());
        msg.extend_from_slice(&filler[..to_add]);
    }
    msg
}

const RFC5424_PLAIN: &[u8] =
    b"<165>1 2003-08-24T05:14:15-07:00 192.0.2.1 myproc 8710 - - %% It's time to make the do-nuts.";

const RFC5424_STRUCTURED: &[u8] = b"<165>1 2003-10-11T22:14:15Z mymachine.example.com evntslog - ID47 \
[exampleSDID@32473 iut=\"3\" eventSource=\"Application\" eventID=\"1011\"] \
\xEF\xBB\xBFAn application event log entry...";

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_rfc3164(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_rfc3164");

    for size in [64, 256, 1024] {
        let msg = create_rfc3164_message(size);
        group.throughput(Throughput::Bytes(msg.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &msg, |b, msg| {
            b.iter(|| black_box(decode_with_year(black_box(msg), 2024)));
        });
    }

    group.finish();
}

fn bench_rfc5424(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_rfc5424");

    group.bench_function("plain", |b| {
        b.iter(|| black_box(decode_with_year(black_box(RFC5424_PLAIN), 2024)));
    });
    group.bench_function("structured_data", |b| {
        b.iter(|| black_box(decode_with_year(black_box(RFC5424_STRUCTURED), 2024)));
    });

    group.finish();
}

fn bench_malformed(c: &mut Criterion) {
    c.bench_function("decode_malformed", |b| {
        b.iter(|| black_box(decode_with_year(black_box(b"no priority here"), 2024)));
    });
}

criterion_group!(benches, bench_rfc3164, bench_rfc5424, bench_malformed);
criterion_main!(benches);
