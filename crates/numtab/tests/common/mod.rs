//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Once;

use numtab::HomogenTable;

static INIT: Once = Once::new();

/// Install a `tracing` subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// `n_rows x n_cols` f64 table whose values count up from `first`.
pub fn counting_table(n_rows: usize, n_cols: usize, first: f64) -> HomogenTable {
    let values: Vec<f64> = (0..n_rows * n_cols).map(|i| first + i as f64).collect();
    HomogenTable::from_vec(values, n_rows, n_cols).unwrap()
}
