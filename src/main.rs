//! Column Stitching Sort Benchmark
//!
//! Times multi-round stitching sort plans over synthetic 32-bit columns.
//! Two data distributions are measured: "scatter" draws values from a range
//! proportional to the row count, "centric" draws from a small fixed range
//! so rounds stay busy breaking ties. One report file is written per
//! distribution.

use std::fs::File;
use std::io::{BufWriter, Write};

use stitch_sort::bench::{Benchmark, StitchPlan};
use stitch_sort::error::StitchError;
use stitch_sort::generator;
use stitch_sort::RawColumn;

/// Sized well past L3 so stitching actually pays for its memory traffic.
const L3_CACHE_SIZE: usize = 12 * 1024 * 1024;
const SCALE_FACTOR: usize = 50;
const DEFAULT_ROW_COUNT: usize = (L3_CACHE_SIZE / 8) * SCALE_FACTOR;
const NUM_COLUMNS: usize = 4;
const NUM_RUNS: usize = 5;
const SCATTER_CARDINALITY: f64 = 0.001;
const CENTRIC_MAX_VALUE: u32 = 100;

/// The reference plan set: every interesting partition of four columns into
/// rounds, from one wide round to four single-column rounds.
fn reference_plans() -> Vec<StitchPlan> {
    vec![
        vec![vec![0, 1, 2, 3]],
        vec![vec![0, 1], vec![2], vec![3]],
        vec![vec![0, 1], vec![2, 3]],
        vec![vec![0], vec![1, 2], vec![3]],
        vec![vec![0], vec![1], vec![2, 3]],
        vec![vec![0, 1, 2], vec![3]],
        vec![vec![0], vec![1, 2, 3]],
        vec![vec![0], vec![1], vec![2], vec![3]],
    ]
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), StitchError> {
    println!("Column Stitching Sort Benchmark");
    println!("================================\n");

    // Optional positional row count override.
    let args: Vec<String> = std::env::args().collect();
    let row_count = if args.len() > 1 {
        args[1].parse().unwrap_or(DEFAULT_ROW_COUNT)
    } else {
        DEFAULT_ROW_COUNT
    };

    println!(
        "Row count: {} ({} MB per column)",
        row_count,
        row_count * 4 / 1_000_000
    );
    println!("Columns: {}, runs per plan: {}", NUM_COLUMNS, NUM_RUNS);

    let plans = reference_plans();
    println!("Plans registered: {}", plans.len());

    println!("\nGenerating random data...");
    let mut rng = rand::thread_rng();
    let scatter_data =
        generator::generate_columns(row_count, NUM_COLUMNS, SCATTER_CARDINALITY, &mut rng)?;
    let centric_data =
        generator::generate_columns_in_range(row_count, NUM_COLUMNS, CENTRIC_MAX_VALUE, &mut rng);

    run_distribution("scatter", scatter_data, &plans, "benchmark_result_scatter.txt")?;
    run_distribution("centric", centric_data, &plans, "benchmark_result_centric.txt")?;

    Ok(())
}

fn run_distribution(
    name: &str,
    data: Vec<RawColumn>,
    plans: &[StitchPlan],
    report_path: &str,
) -> Result<(), StitchError> {
    println!("\n--- {} distribution ---", name);

    let mut bench = Benchmark::new();
    bench.register_plans(plans);
    bench.register_data(data)?;

    let file = File::create(report_path)?;
    let mut out = BufWriter::new(file);
    bench.run_all_plans(NUM_RUNS, &mut out)?;
    out.flush()?;

    println!("Report written to: {}", report_path);
    Ok(())
}
