//! Benchmark of row and column block reads across layouts.
//!
//! Compares zero-copy reads (matching kind, contiguous storage) with
//! converting reads and with reads spanning row-merged components.
//!
//! Run with: cargo bench --bench block_access

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use numtab::{
    to_bytes, CodecConfig, HomogenTable, NumericBuffer, NumericTable, RowMergedTable, SoaTable,
};

const N_ROWS: usize = 100_000;
const N_COLS: usize = 16;

fn homogen() -> HomogenTable {
    let values: Vec<f64> = (0..N_ROWS * N_COLS).map(|i| i as f64 * 0.5).collect();
    HomogenTable::from_vec(values, N_ROWS, N_COLS).unwrap()
}

fn soa() -> SoaTable {
    let columns = (0..N_COLS)
        .map(|c| NumericBuffer::from((0..N_ROWS).map(|r| (r * c) as f32).collect::<Vec<_>>()))
        .collect();
    SoaTable::from_columns(columns).unwrap()
}

fn row_merged(parts: usize) -> RowMergedTable {
    let rows = N_ROWS / parts;
    let tables = (0..parts)
        .map(|p| {
            let values: Vec<f64> = (0..rows * N_COLS).map(|i| (p + i) as f64).collect();
            HomogenTable::from_vec(values, rows, N_COLS).unwrap().into()
        })
        .collect();
    RowMergedTable::from_tables(tables).unwrap()
}

fn bench_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("rows");
    group.throughput(Throughput::Elements((N_ROWS * N_COLS) as u64));

    let table = homogen();
    group.bench_function("homogen/f64", |b| {
        b.iter(|| {
            let block = table.get_block_of_rows::<f64>(0, N_ROWS).unwrap();
            black_box(block.as_slice()[N_COLS]);
            block.release().unwrap();
        })
    });
    group.bench_function("homogen/f32", |b| {
        b.iter(|| {
            let block = table.get_block_of_rows::<f32>(0, N_ROWS).unwrap();
            black_box(block.as_slice()[N_COLS]);
            block.release().unwrap();
        })
    });

    let table = soa();
    group.bench_function("soa/f32", |b| {
        b.iter(|| {
            let block = table.get_block_of_rows::<f32>(0, N_ROWS).unwrap();
            black_box(block.as_slice()[N_COLS]);
            block.release().unwrap();
        })
    });

    for parts in [1, 4, 64] {
        let table = row_merged(parts);
        group.bench_with_input(BenchmarkId::new("row_merged", parts), &table, |b, table| {
            b.iter(|| black_box(table.read_rows::<f64>(0, table.n_rows()).unwrap()))
        });
    }
    group.finish();
}

fn bench_columns(c: &mut Criterion) {
    let mut group = c.benchmark_group("columns");
    group.throughput(Throughput::Elements(N_ROWS as u64));

    let table = homogen();
    group.bench_function("homogen/strided", |b| {
        b.iter(|| black_box(table.read_column::<f64>(3, 0, N_ROWS).unwrap()))
    });

    let table = soa();
    group.bench_function("soa/contiguous", |b| {
        b.iter(|| {
            let block = table.get_block_of_column_values::<f32>(3, 0, N_ROWS).unwrap();
            black_box(block.as_slice()[1]);
            block.release().unwrap();
        })
    });
    group.finish();
}

fn bench_pack(c: &mut Criterion) {
    let table = homogen();
    let config = CodecConfig::default();
    c.bench_function("pack/homogen", |b| {
        b.iter(|| black_box(to_bytes(&table, &config).unwrap()))
    });
}

criterion_group!(benches, bench_rows, bench_columns, bench_pack);
criterion_main!(benches);
