use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use ledger_recon::detect::Detector;
use ledger_recon::field::FieldMap;
use ledger_recon::grid::Grid;
use ledger_recon::layout::Row;
use ledger_recon::matcher::{MatchOptions, Matcher};
use ledger_recon::profile::Profile;

fn generate_rows(rows: usize, price_offset: u64) -> Vec<Row> {
    (0..rows)
        .map(|i| {
            FieldMap([
                format!("Customer {}", i % 500),
                ["ABC Finance", "XYZ Leasing", "Cash"][i % 3].to_string(),
                format!("X{}", i % 40),
                format!("MR0HA{i:09}"),
                format!("{}", 40_000 + (i as u64 % 97) * 100 + price_offset * (i as u64 % 2)),
                format!("F{}", i % 7),
                if i % 2 == 0 { "Y" } else { "N" }.to_string(),
            ])
        })
        .collect()
}

fn generate_grid(rows: usize) -> Grid {
    let mut cells = vec![
        vec!["Monthly sales ledger".to_string()],
        [
            "No.", "Customer Name", "Finance", "Model Code", "VIN", "Sale Price", "COM F/N", "COM",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
    ];
    for row in generate_rows(rows, 0) {
        let mut line = vec![String::new()];
        line.extend(row.values().iter().cloned());
        cells.push(line);
    }
    Grid::new(cells)
}

fn bench_matching(c: &mut Criterion) {
    let reference = generate_rows(20_000, 0);
    let primary = generate_rows(20_000, 100);
    let customer_key = MatchOptions {
        key_field: ledger_recon::field::Field::Customer,
        ..MatchOptions::default()
    };

    let mut group = c.benchmark_group("match_rows");
    group.sample_size(20);

    group.bench_function("index_build", |b| {
        b.iter_batched(
            || reference.clone(),
            |rows| black_box(Matcher::new(rows, MatchOptions::default())),
            BatchSize::LargeInput,
        );
    });

    let by_identifier = Matcher::new(reference.clone(), MatchOptions::default());
    group.bench_function("identifier_key", |b| {
        b.iter(|| black_box(by_identifier.match_all(&primary)));
    });

    // Shared customer names fan out into many candidates per row.
    let by_customer = Matcher::new(reference.clone(), customer_key);
    group.bench_function("customer_key_with_fallbacks", |b| {
        b.iter(|| black_box(by_customer.match_all(&primary[..2_000])));
    });

    group.finish();
}

fn bench_detection(c: &mut Criterion) {
    let profile = Profile::default();
    let detector = Detector::new(&profile);
    let grid = generate_grid(5_000);
    c.bench_function("detect_layout", |b| {
        b.iter(|| black_box(detector.detect(&grid, &[2, 3, 5, 6, 8, 14, 15])));
    });
}

criterion_group!(benches, bench_matching, bench_detection);
criterion_main!(benches);
