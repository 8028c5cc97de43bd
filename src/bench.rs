//! Plan executor.
//!
//! A plan is an ordered list of rounds, each round an ordered list of raw
//! column indices. Executing a plan runs stitch, sort, and group extraction
//! once per round: the first round sorts globally, later rounds sort only
//! inside the groups left ambiguous by the rounds before, and the group
//! extraction after every non-final round refines the partition that the
//! next round works within.

use std::io::Write;
use std::time::Instant;

use crate::column::{RawColumn, SortingState, StitchedColumn};
use crate::error::StitchError;
use crate::report::{GroupInfo, Operator, PlanStats};

/// An execution plan: one entry per round, each a non-empty list of 0-based
/// raw column indices.
pub type StitchPlan = Vec<Vec<usize>>;

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Check plan shape against the registered columns.
fn validate_plan(plan: &StitchPlan, column_count: usize) -> Result<(), StitchError> {
    if plan.is_empty() {
        return Err(StitchError::InvalidPlan("plan has no rounds".to_string()));
    }
    for (round, columns) in plan.iter().enumerate() {
        if columns.is_empty() {
            return Err(StitchError::InvalidPlan(format!(
                "round {} selects no columns",
                round
            )));
        }
        for &column in columns {
            if column >= column_count {
                return Err(StitchError::InvalidPlan(format!(
                    "round {} references column {} but only {} columns are registered",
                    round, column, column_count
                )));
            }
        }
    }
    Ok(())
}

/// Check that the columns form a table: at least one column, equal lengths.
fn validate_data(columns: &[RawColumn]) -> Result<usize, StitchError> {
    let first = columns
        .first()
        .ok_or_else(|| StitchError::InvalidData("no columns registered".to_string()))?;
    let row_count = first.len();
    for (idx, column) in columns.iter().enumerate() {
        if column.len() != row_count {
            return Err(StitchError::InvalidData(format!(
                "column {} has {} rows, expected {}",
                idx,
                column.len(),
                row_count
            )));
        }
    }
    Ok(row_count)
}

/// Run every round of `plan` against `columns` and return the final
/// permutation together with the singleton-group count after each round.
///
/// This is the untimed execution path, shared by [`sort_with_plan`] and the
/// group-info collection pass. The last round also extracts groups here so
/// its singleton count is observable.
fn run_rounds(
    columns: &[RawColumn],
    plan: &StitchPlan,
) -> Result<(Vec<u32>, Vec<usize>), StitchError> {
    let row_count = validate_data(columns)?;
    validate_plan(plan, columns.len())?;

    let mut state = SortingState::identity(row_count);
    let mut singletons = Vec::with_capacity(plan.len());

    for (round, selection) in plan.iter().enumerate() {
        let round_columns: Vec<&RawColumn> = selection.iter().map(|&c| &columns[c]).collect();
        let mut stitched = StitchedColumn::stitch(&round_columns, &state.indices);

        if round == 0 {
            stitched.sort()?;
            state = stitched.groups_and_indices();
        } else {
            stitched.sort_within(&state.groups)?;
            state = stitched.refine_groups(&state.groups);
        }
        singletons.push(state.groups.iter().filter(|g| g.length == 1).count());
    }

    Ok((state.indices, singletons))
}

/// Sort `columns` lexicographically under `plan` and return the resulting
/// permutation of row ids.
pub fn sort_with_plan(columns: &[RawColumn], plan: &StitchPlan) -> Result<Vec<u32>, StitchError> {
    let (indices, _) = run_rounds(columns, plan)?;
    Ok(indices)
}

/// Benchmark harness: registered plans, registered table, timed execution.
#[derive(Default)]
pub struct Benchmark {
    plans: Vec<StitchPlan>,
    raw_data: Vec<RawColumn>,
}

impl Benchmark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_plan(&mut self, plan: StitchPlan) {
        self.plans.push(plan);
    }

    pub fn register_plans(&mut self, plans: &[StitchPlan]) {
        for plan in plans {
            self.register_plan(plan.clone());
        }
    }

    /// Register the table all plans run against. The columns must agree on
    /// row count and stay untouched for the lifetime of the benchmark.
    pub fn register_data(&mut self, data: Vec<RawColumn>) -> Result<(), StitchError> {
        validate_data(&data)?;
        self.raw_data = data;
        Ok(())
    }

    /// Execute one registered plan `num_runs` times and record per-operator,
    /// per-round, and total wall times.
    pub fn run_plan(&self, plan_idx: usize, num_runs: usize) -> Result<PlanStats, StitchError> {
        let plan = self.plans.get(plan_idx).ok_or_else(|| {
            StitchError::InvalidPlan(format!(
                "plan index {} out of range, {} plans registered",
                plan_idx,
                self.plans.len()
            ))
        })?;
        let row_count = validate_data(&self.raw_data)?;
        validate_plan(plan, self.raw_data.len())?;

        let round_count = plan.len();
        let mut stats = PlanStats::new(plan.clone(), row_count);

        for _ in 0..num_runs {
            let total_start = Instant::now();
            let mut state = SortingState::identity(row_count);
            let mut final_indices = Vec::new();

            for (round, selection) in plan.iter().enumerate() {
                let round_start = Instant::now();
                let round_columns: Vec<&RawColumn> =
                    selection.iter().map(|&c| &self.raw_data[c]).collect();

                let op_start = Instant::now();
                let mut stitched = StitchedColumn::stitch(&round_columns, &state.indices);
                stats.record(Operator::Stitch, round, elapsed_ms(op_start));

                let op_start = Instant::now();
                if round == 0 {
                    stitched.sort()?;
                } else {
                    stitched.sort_within(&state.groups)?;
                }
                stats.record(Operator::Sort, round, elapsed_ms(op_start));

                let op_start = Instant::now();
                if round + 1 < round_count {
                    state = if round == 0 {
                        stitched.groups_and_indices()
                    } else {
                        stitched.refine_groups(&state.groups)
                    };
                } else {
                    final_indices = stitched.indices_only();
                }
                stats.record(Operator::Group, round, elapsed_ms(op_start));
                stats.record(Operator::Round, round, elapsed_ms(round_start));
            }

            stats.record_total(elapsed_ms(total_start));
            debug_assert_eq!(final_indices.len(), row_count);
        }

        Ok(stats)
    }

    /// Untimed pass over one plan gathering the singleton-group count after
    /// every round and the skipped data rate: the fraction of residual
    /// column-row work later rounds avoided because rows were already
    /// resolved.
    pub fn collect_group_info(&self, plan_idx: usize) -> Result<GroupInfo, StitchError> {
        let plan = self.plans.get(plan_idx).ok_or_else(|| {
            StitchError::InvalidPlan(format!(
                "plan index {} out of range, {} plans registered",
                plan_idx,
                self.plans.len()
            ))
        })?;
        let (_, singletons) = run_rounds(&self.raw_data, plan)?;

        let row_count = self.raw_data[0].len();
        let total_columns: usize = plan.iter().map(|round| round.len()).sum();

        let mut columns_used = 0;
        let mut prev_singletons = 0;
        let mut skipped = 0usize;
        for (round, &resolved) in singletons.iter().enumerate() {
            columns_used += plan[round].len();
            let new_singletons = resolved - prev_singletons;
            skipped += new_singletons * (total_columns - columns_used);
            prev_singletons = resolved;
        }

        let denominator = row_count * total_columns;
        Ok(GroupInfo {
            singletons,
            skipped_rate: if denominator == 0 {
                0.0
            } else {
                skipped as f64 / denominator as f64
            },
        })
    }

    /// Run every registered plan and append one summary block per plan to
    /// `out`. Plans that fail validation are reported to stderr and skipped;
    /// a failing sink aborts.
    pub fn run_all_plans(
        &self,
        num_runs: usize,
        out: &mut impl Write,
    ) -> Result<(), StitchError> {
        for plan_idx in 0..self.plans.len() {
            let mut stats = match self.run_plan(plan_idx, num_runs) {
                Ok(stats) => stats,
                Err(err @ StitchError::Io(_)) => return Err(err),
                Err(err) => {
                    eprintln!("[error] skipping plan {}: {}", plan_idx, err);
                    continue;
                }
            };
            match self.collect_group_info(plan_idx) {
                Ok(info) => stats.set_group_info(info),
                Err(err) => eprintln!("[error] group info for plan {}: {}", plan_idx, err),
            }
            stats.write_summary(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::Rng;

    /// Byte-wise comparison of the rows `a` and `b` under the flattened
    /// column order of `plan`.
    fn plan_key_order(
        columns: &[RawColumn],
        plan: &StitchPlan,
        a: usize,
        b: usize,
    ) -> std::cmp::Ordering {
        for round in plan {
            for &c in round {
                let ord = columns[c][a].to_ne_bytes().cmp(&columns[c][b].to_ne_bytes());
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
        }
        std::cmp::Ordering::Equal
    }

    fn assert_sorted_under_plan(columns: &[RawColumn], plan: &StitchPlan, indices: &[u32]) {
        for pair in indices.windows(2) {
            let ord = plan_key_order(columns, plan, pair[0] as usize, pair[1] as usize);
            assert_ne!(ord, std::cmp::Ordering::Greater, "output out of order");
        }
    }

    fn assert_permutation(indices: &[u32], row_count: usize) {
        let mut seen = indices.to_vec();
        seen.sort_unstable();
        assert_eq!(seen, (0..row_count as u32).collect::<Vec<u32>>());
    }

    #[test]
    fn test_single_round_no_duplicates() {
        let columns = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let plan: StitchPlan = vec![vec![0, 1]];
        let indices = sort_with_plan(&columns, &plan).unwrap();
        assert_eq!(indices, vec![0, 1, 2]);

        let (_, singletons) = run_rounds(&columns, &plan).unwrap();
        assert_eq!(singletons, vec![3]);
    }

    #[test]
    fn test_single_round_with_duplicates() {
        let columns = vec![vec![2, 1, 4, 1, 4, 2], vec![3, 3, 4, 4, 4, 4]];
        let plan: StitchPlan = vec![vec![0, 1]];
        let indices = sort_with_plan(&columns, &plan).unwrap();

        assert_permutation(&indices, 6);
        assert_sorted_under_plan(&columns, &plan, &indices);
        // Distinct pairs (1,3) (1,4) (2,3) (2,4) (4,4): rows 2 and 4 tie.
        let keys: Vec<(u32, u32)> = indices
            .iter()
            .map(|&i| (columns[0][i as usize], columns[1][i as usize]))
            .collect();
        assert_eq!(keys[0], (1, 3));
        assert_eq!(keys[1], (1, 4));
        assert_eq!(keys[2], (2, 3));
        assert_eq!(keys[3], (2, 4));
        assert_eq!(keys[4], (4, 4));
        assert_eq!(keys[5], (4, 4));
    }

    #[test]
    fn test_two_round_tie_break() {
        let columns = vec![
            vec![1, 2, 2, 1, 1, 4],
            vec![4, 2, 2, 4, 1, 4],
            vec![6, 9, 8, 5, 4, 3],
        ];
        let plan: StitchPlan = vec![vec![0, 1], vec![2]];
        let indices = sort_with_plan(&columns, &plan).unwrap();
        assert_permutation(&indices, 6);
        assert_sorted_under_plan(&columns, &plan, &indices);
        // Fully resolved: (1,1,4) (1,4,5) (1,4,6) (2,2,8) (2,2,9) (4,4,3).
        assert_eq!(indices, vec![4, 3, 0, 2, 1, 5]);
    }

    #[test]
    fn test_plans_with_same_flattening_agree() {
        let columns = vec![
            vec![1, 2, 2, 1, 1, 4],
            vec![4, 2, 2, 4, 1, 4],
            vec![6, 9, 8, 5, 4, 3],
        ];
        let two_rounds: StitchPlan = vec![vec![0, 1], vec![2]];
        let three_rounds: StitchPlan = vec![vec![0], vec![1], vec![2]];
        assert_eq!(
            sort_with_plan(&columns, &two_rounds).unwrap(),
            sort_with_plan(&columns, &three_rounds).unwrap()
        );
    }

    #[test]
    fn test_large_random_plan_equivalence() {
        let row_count = 1000;
        let mut rng = rand::thread_rng();
        let columns: Vec<RawColumn> = (0..4)
            .map(|_| (0..row_count).map(|_| rng.gen_range(0..=100)).collect())
            .collect();

        let one_per_round: StitchPlan = vec![vec![0], vec![1], vec![2], vec![3]];
        let two_per_round: StitchPlan = vec![vec![0, 1], vec![2, 3]];

        let a = sort_with_plan(&columns, &one_per_round).unwrap();
        let b = sort_with_plan(&columns, &two_per_round).unwrap();

        assert_permutation(&a, row_count);
        assert_sorted_under_plan(&columns, &one_per_round, &a);
        assert_eq!(a, b);
    }

    #[test]
    fn test_singleton_counts_are_monotone() {
        let columns = generate_test_columns(500, 4, 8);
        let plan: StitchPlan = vec![vec![0], vec![1], vec![2, 3]];
        let (_, singletons) = run_rounds(&columns, &plan).unwrap();
        assert_eq!(singletons.len(), 3);
        assert!(singletons.windows(2).all(|w| w[0] <= w[1]));
    }

    fn generate_test_columns(row_count: usize, column_count: usize, max_value: u32) -> Vec<RawColumn> {
        let mut rng = rand::thread_rng();
        (0..column_count)
            .map(|_| (0..row_count).map(|_| rng.gen_range(0..=max_value)).collect())
            .collect()
    }

    #[test]
    fn test_invalid_plans_rejected() {
        let columns = vec![vec![1u32, 2, 3]];

        let empty: StitchPlan = vec![];
        assert!(matches!(
            sort_with_plan(&columns, &empty),
            Err(StitchError::InvalidPlan(_))
        ));

        let empty_round: StitchPlan = vec![vec![0], vec![]];
        assert!(matches!(
            sort_with_plan(&columns, &empty_round),
            Err(StitchError::InvalidPlan(_))
        ));

        let out_of_range: StitchPlan = vec![vec![0, 1]];
        assert!(matches!(
            sort_with_plan(&columns, &out_of_range),
            Err(StitchError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_invalid_data_rejected() {
        let plan: StitchPlan = vec![vec![0]];
        assert!(matches!(
            sort_with_plan(&[], &plan),
            Err(StitchError::InvalidData(_))
        ));

        let mut bench = Benchmark::new();
        assert!(matches!(
            bench.register_data(vec![vec![1, 2], vec![1, 2, 3]]),
            Err(StitchError::InvalidData(_))
        ));
        assert!(bench.register_data(vec![vec![1, 2], vec![3, 4]]).is_ok());
    }

    #[test]
    fn test_run_plan_records_all_series() {
        let mut bench = Benchmark::new();
        bench.register_plan(vec![vec![0, 1], vec![2]]);
        bench
            .register_data(generate_test_columns(200, 3, 10))
            .unwrap();

        let stats = bench.run_plan(0, 3).unwrap();
        let mut sink = Vec::new();
        stats.write_summary(&mut sink).unwrap();
        let text = String::from_utf8(sink).unwrap();
        assert!(text.contains("Plan: [0,1] [2]"));
        assert!(text.contains("Row count: 200"));
        assert!(text.contains("Column count: 3"));
        assert!(text.contains("Round 1 :"));
    }

    #[test]
    fn test_group_info_fully_resolved_table() {
        // Distinct first-column values resolve every row in round 0, so the
        // whole second round's work is skipped: rate = (N * 1) / (N * 2).
        let columns = vec![vec![3u32, 1, 2, 0], vec![7u32, 7, 7, 7]];
        let mut bench = Benchmark::new();
        bench.register_plan(vec![vec![0], vec![1]]);
        bench.register_data(columns).unwrap();

        let info = bench.collect_group_info(0).unwrap();
        assert_eq!(info.singletons, vec![4, 4]);
        assert!((info.skipped_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_group_info_nothing_resolved_early() {
        // A constant first column resolves nothing before the last round.
        let columns = vec![vec![5u32, 5, 5, 5], vec![4u32, 3, 2, 1]];
        let mut bench = Benchmark::new();
        bench.register_plan(vec![vec![0], vec![1]]);
        bench.register_data(columns).unwrap();

        let info = bench.collect_group_info(0).unwrap();
        assert_eq!(info.singletons, vec![0, 4]);
        assert_eq!(info.skipped_rate, 0.0);
    }

    #[test]
    fn test_run_all_plans_skips_invalid() {
        let mut bench = Benchmark::new();
        bench.register_plan(vec![vec![0, 9]]); // out of range, skipped
        bench.register_plan(vec![vec![0]]);
        bench.register_data(vec![vec![2u32, 1, 3]]).unwrap();

        let mut sink = Vec::new();
        bench.run_all_plans(2, &mut sink).unwrap();
        let text = String::from_utf8(sink).unwrap();
        // Only the valid plan produced a summary block.
        assert_eq!(text.matches("Plan:").count(), 1);
        assert!(text.contains("Plan: [0]"));
        assert!(text.contains("Unique group counts:"));
    }

    proptest! {
        #[test]
        fn prop_final_indices_are_sorted_permutation(
            rows in 1usize..120,
            seed in any::<u64>(),
            max_value in prop_oneof![Just(2u32), Just(50u32), Just(u32::MAX)],
        ) {
            use rand::{rngs::StdRng, SeedableRng};
            let mut rng = StdRng::seed_from_u64(seed);
            let columns: Vec<RawColumn> = (0..4)
                .map(|_| (0..rows).map(|_| rng.gen_range(0..=max_value)).collect())
                .collect();
            let plan: StitchPlan = vec![vec![0, 1], vec![2], vec![3]];

            let indices = sort_with_plan(&columns, &plan).unwrap();
            assert_permutation(&indices, rows);
            assert_sorted_under_plan(&columns, &plan, &indices);
        }

        #[test]
        fn prop_equivalent_plans_agree(rows in 1usize..100, seed in any::<u64>()) {
            use rand::{rngs::StdRng, SeedableRng};
            let mut rng = StdRng::seed_from_u64(seed);
            let columns: Vec<RawColumn> = (0..4)
                .map(|_| (0..rows).map(|_| rng.gen_range(0..=5)).collect())
                .collect();

            let plans: [StitchPlan; 4] = [
                vec![vec![0, 1, 2, 3]],
                vec![vec![0, 1], vec![2, 3]],
                vec![vec![0], vec![1, 2], vec![3]],
                vec![vec![0], vec![1], vec![2], vec![3]],
            ];
            let reference = sort_with_plan(&columns, &plans[0]).unwrap();
            for plan in &plans[1..] {
                prop_assert_eq!(&reference, &sort_with_plan(&columns, plan).unwrap());
            }
        }
    }
}
