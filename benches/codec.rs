#![allow(unused)]
extern crate sagekit;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use sagekit::slb::{FieldAttrs, RecordBuilder, SlbContainer, SlbRecord};
use std::hint::black_box;

#[derive(Debug, Default, Clone, PartialEq)]
struct Line {
    speaker: String,
    text: String,
    voice: u32,
}

impl SlbRecord for Line {
    const TYPE_NAME: &'static str = "Line";

    fn describe(fields: &mut RecordBuilder<Self>) {
        fields
            .field("speaker", FieldAttrs::new().inline(16), |l| &l.speaker, |l, v| l.speaker = v)
            .field("text", FieldAttrs::new().offset(), |l| &l.text, |l, v| l.text = v)
            .field("voice", FieldAttrs::new(), |l| &l.voice, |l, v| l.voice = v);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Script {
    lines: Vec<Line>,
    marks: Vec<u16>,
}

impl SlbRecord for Script {
    const TYPE_NAME: &'static str = "Script";

    fn describe(fields: &mut RecordBuilder<Self>) {
        fields
            .records("lines", FieldAttrs::new().duplicate_count(), |s| &s.lines, |s, v| s.lines = v)
            .field("marks", FieldAttrs::new().count_u16(), |s| &s.marks, |s, v| s.marks = v);
    }
}

fn script(lines: usize) -> Script {
    Script {
        lines: (0..lines)
            .map(|index| Line {
                speaker: format!("actor_{}", index % 7),
                text: format!("line number {index} of the benchmark script"),
                voice: index as u32,
            })
            .collect(),
        marks: (0..lines as u16).step_by(10).collect(),
    }
}

/// Benchmark writing and reading a dialogue table with 2000 lines
///
/// Covers the deferred offset patching on write and the positioned reads of every
/// out-of-line string on read.
fn bench_table_codec(c: &mut Criterion) {
    let container = SlbContainer::new(*b"SCR\0");
    let value = script(2000);
    let bytes = container.to_bytes(&value).unwrap();

    println!(
        "Benchmarking table: {} bytes ({:.2} KB)",
        bytes.len(),
        bytes.len() as f64 / 1024.0
    );

    let mut group = c.benchmark_group("slb_write");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("to_bytes", |b| {
        b.iter(|| black_box(container.to_bytes(black_box(&value)).unwrap()));
    });
    group.finish();

    let mut group = c.benchmark_group("slb_read");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("from_bytes", |b| {
        b.iter(|| black_box(container.from_bytes::<Script>(black_box(&bytes)).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_table_codec);
criterion_main!(benches);
