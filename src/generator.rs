//! Synthetic table generation.
//!
//! Produces the raw columns the benchmark sorts: independent uniform draws
//! per row, with the value range controlled either directly or through a
//! cardinality rate relative to the row count. A low rate yields many
//! duplicates per column, which is what makes multi-round plans interesting.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::column::RawColumn;
use crate::error::StitchError;

/// Generate `column_count` columns of `row_count` uniform draws from
/// `[0, max_value]`.
pub fn generate_columns_in_range(
    row_count: usize,
    column_count: usize,
    max_value: u32,
    rng: &mut impl Rng,
) -> Vec<RawColumn> {
    (0..column_count)
        .map(|_| (0..row_count).map(|_| rng.gen_range(0..=max_value)).collect())
        .collect()
}

/// Generate columns whose value range is `[0, floor(row_count * rate)]`.
///
/// A rate outside `(0, 1]` is a caller bug and aborts the run.
pub fn generate_columns(
    row_count: usize,
    column_count: usize,
    cardinality_rate: f64,
    rng: &mut impl Rng,
) -> Result<Vec<RawColumn>, StitchError> {
    if !(cardinality_rate > 0.0 && cardinality_rate <= 1.0) {
        return Err(StitchError::InvalidCardinality(cardinality_rate));
    }
    let max_value = (row_count as f64 * cardinality_rate) as u32;
    Ok(generate_columns_in_range(
        row_count,
        column_count,
        max_value,
        rng,
    ))
}

/// Seeded variant of [`generate_columns`] for reproducible runs.
pub fn generate_columns_seeded(
    row_count: usize,
    column_count: usize,
    cardinality_rate: f64,
    seed: u64,
) -> Result<Vec<RawColumn>, StitchError> {
    let mut rng = StdRng::seed_from_u64(seed);
    generate_columns(row_count, column_count, cardinality_rate, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_range() {
        let columns = generate_columns_seeded(500, 3, 0.1, 7).unwrap();
        assert_eq!(columns.len(), 3);
        for column in &columns {
            assert_eq!(column.len(), 500);
            assert!(column.iter().all(|&v| v <= 50));
        }
    }

    #[test]
    fn test_range_variant() {
        let mut rng = StdRng::seed_from_u64(1);
        let columns = generate_columns_in_range(200, 2, 5, &mut rng);
        assert_eq!(columns.len(), 2);
        for column in &columns {
            assert!(column.iter().all(|&v| v <= 5));
        }
    }

    #[test]
    fn test_same_seed_same_data() {
        let a = generate_columns_seeded(100, 4, 0.5, 42).unwrap();
        let b = generate_columns_seeded(100, 4, 0.5, 42).unwrap();
        assert_eq!(a, b);

        let c = generate_columns_seeded(100, 4, 0.5, 43).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_rates_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        for rate in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                generate_columns(10, 1, rate, &mut rng),
                Err(StitchError::InvalidCardinality(_))
            ));
        }
    }

    #[test]
    fn test_full_rate_allowed() {
        let columns = generate_columns_seeded(100, 1, 1.0, 9).unwrap();
        assert!(columns[0].iter().all(|&v| v <= 100));
    }
}
