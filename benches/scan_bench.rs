//! Scan throughput benchmarks

use std::collections::HashMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memsize::bitmap::{AddressSet, DEFAULT_CHUNK_BITS, MIN_CHUNK_BITS};
use memsize::{reflect_struct, Address, Quiesced, ScanConfig, Scanner};

struct Record {
    key: u64,
    name: String,
    tags: Vec<String>,
    parent: Option<Arc<Record>>,
}

reflect_struct!(Record {
    key,
    name,
    tags,
    parent
});

fn records(count: u64) -> HashMap<u64, Arc<Record>> {
    let root = Arc::new(Record {
        key: 0,
        name: "root".to_string(),
        tags: Vec::new(),
        parent: None,
    });
    (1..=count)
        .map(|key| {
            let record = Record {
                key,
                name: format!("record-{key}"),
                tags: (0..key % 3).map(|t| format!("t{t}")).collect(),
                parent: Some(Arc::clone(&root)),
            };
            (key, Arc::new(record))
        })
        .collect()
}

fn benchmark_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_records");
    for count in [100u64, 1_000, 10_000] {
        let graph = records(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &graph, |b, graph| {
            b.iter(|| black_box(memsize::scan(graph, &["records"]).total));
        });
    }
    group.finish();

    let graph = records(1_000);
    for chunk_bits in [MIN_CHUNK_BITS, DEFAULT_CHUNK_BITS] {
        let config = ScanConfig::default().with_chunk_bits(chunk_bits);
        let scanner = Scanner::new(config, Arc::new(Quiesced)).expect("valid config");
        c.bench_function(&format!("scan_records_chunk_bits={chunk_bits}"), |b| {
            b.iter(|| black_box(scanner.scan(&graph, &["records"]).total));
        });
    }
}

fn benchmark_address_set(c: &mut Criterion) {
    c.bench_function("address_set_mark_count", |b| {
        b.iter(|| {
            let mut set = AddressSet::new();
            for i in 0..4096usize {
                let at = Address::from_ptr((0x10_0000 + i * 48) as *const u8);
                if set.count_range(at, 32) == 0 {
                    set.mark_range(at, 32);
                }
            }
            black_box(set.size())
        });
    });
}

criterion_group!(benches, benchmark_scan, benchmark_address_set);
criterion_main!(benches);
