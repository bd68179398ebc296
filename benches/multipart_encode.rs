//! Request body encoder benchmarks
//!
//! Measures how fast the multipart and url-encoded encoders produce bytes
//! for in-memory fields and file uploads.
//!
//! Run with: cargo bench --bench multipart_encode

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Write;
use vcurl::body::{BodySource, MultipartForm, UrlEncodedForm};

const CHUNK: usize = 16 * 1024;

/// Pull every byte out of `source`, returning the total
fn drain(source: &mut dyn BodySource) -> u64 {
    let mut buf = vec![0u8; CHUNK];
    let mut total = 0u64;
    loop {
        let result = source.read(&mut buf).unwrap();
        total += result.bytes as u64;
        if result.finished {
            return total;
        }
    }
}

fn bench_multipart_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("multipart_text");

    for fields in [1usize, 16, 128] {
        let mut form = MultipartForm::new();
        for i in 0..fields {
            form.append_text(format!("field{}", i), "value ".repeat(32), None);
        }
        group.throughput(Throughput::Bytes(form.content_length()));
        group.bench_with_input(BenchmarkId::from_parameter(fields), &form, |b, form| {
            b.iter(|| black_box(drain(&mut form.source())));
        });
    }

    group.finish();
}

fn bench_multipart_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("multipart_file");

    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'x'; size]).unwrap();
        file.flush().unwrap();

        let mut form = MultipartForm::new();
        form.append_text("description", "benchmark upload", None);
        form.append_file(
            "upload",
            file.path(),
            None,
            Some("application/octet-stream".to_string()),
        )
        .unwrap();

        group.throughput(Throughput::Bytes(form.content_length()));
        group.bench_with_input(BenchmarkId::from_parameter(size), &form, |b, form| {
            b.iter(|| black_box(drain(&mut form.source())));
        });
    }

    group.finish();
}

fn bench_urlencoded(c: &mut Criterion) {
    let mut group = c.benchmark_group("urlencoded");
    let value = "a b&c=d/é".repeat(1024);
    group.throughput(Throughput::Bytes(value.len() as u64));

    group.bench_function("append", |b| {
        b.iter(|| {
            let mut form = UrlEncodedForm::new();
            form.append("data", black_box(&value));
            black_box(form.content_length())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_multipart_text, bench_multipart_file, bench_urlencoded);
criterion_main!(benches);
