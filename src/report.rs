//! Plan statistics and report output.
//!
//! `PlanStats` is the recorder the executor feeds: per-operator and per-round
//! timing series over the repeated runs of one plan, plus the optional group
//! info gathered by the untimed collection pass. The summary block is written
//! to any `io::Write` sink, so the engine itself never touches a file.

use std::io::{self, Write};

use crate::bench::StitchPlan;

/// Which measurement a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Stitch,
    Sort,
    Group,
    Round,
}

/// Group statistics from the untimed collection pass of one plan.
#[derive(Debug, Clone)]
pub struct GroupInfo {
    /// Count of singleton (resolved) groups after each round, in plan order.
    pub singletons: Vec<usize>,
    /// Fraction of residual column-row work that later rounds skipped
    /// because rows were already resolved.
    pub skipped_rate: f64,
}

/// Timing recorder for one plan.
#[derive(Debug, Clone)]
pub struct PlanStats {
    plan: StitchPlan,
    row_count: usize,
    column_count: usize,
    stitch_timing: Vec<Vec<f64>>,
    sort_timing: Vec<Vec<f64>>,
    group_timing: Vec<Vec<f64>>,
    round_timing: Vec<Vec<f64>>,
    total_timing: Vec<f64>,
    group_info: Option<GroupInfo>,
}

impl PlanStats {
    pub fn new(plan: StitchPlan, row_count: usize) -> Self {
        let rounds = plan.len();
        let column_count = plan.iter().map(|round| round.len()).sum();
        PlanStats {
            plan,
            row_count,
            column_count,
            stitch_timing: vec![Vec::new(); rounds],
            sort_timing: vec![Vec::new(); rounds],
            group_timing: vec![Vec::new(); rounds],
            round_timing: vec![Vec::new(); rounds],
            total_timing: Vec::new(),
            group_info: None,
        }
    }

    /// Record one sample (milliseconds) for an operator in a round.
    pub fn record(&mut self, operator: Operator, round: usize, elapsed_ms: f64) {
        let series = match operator {
            Operator::Stitch => &mut self.stitch_timing[round],
            Operator::Sort => &mut self.sort_timing[round],
            Operator::Group => &mut self.group_timing[round],
            Operator::Round => &mut self.round_timing[round],
        };
        series.push(elapsed_ms);
    }

    /// Record the total wall time of one full plan iteration.
    pub fn record_total(&mut self, elapsed_ms: f64) {
        self.total_timing.push(elapsed_ms);
    }

    pub fn set_group_info(&mut self, info: GroupInfo) {
        self.group_info = Some(info);
    }

    pub fn group_info(&self) -> Option<&GroupInfo> {
        self.group_info.as_ref()
    }

    /// Median of a timing series; an empty series reports 0.
    fn median(series: &[f64]) -> f64 {
        if series.is_empty() {
            return 0.0;
        }
        let mut sorted = series.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted[sorted.len() / 2]
    }

    /// Append the human-readable summary block for this plan.
    pub fn write_summary(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "Plan:")?;
        for round in &self.plan {
            let columns: Vec<String> = round.iter().map(|c| c.to_string()).collect();
            write!(out, " [{}]", columns.join(","))?;
        }
        writeln!(out)?;
        writeln!(out, "Row count: {}", self.row_count)?;
        writeln!(out, "Column count: {}", self.column_count)?;

        if let Some(info) = &self.group_info {
            writeln!(out, "Skipped data rate: {:.2}%", info.skipped_rate * 100.0)?;
            writeln!(out, "Unique group counts:")?;
            for (round, singletons) in info.singletons.iter().enumerate() {
                writeln!(out, " [Round {}] {}/{}", round, singletons, self.row_count)?;
            }
        }

        writeln!(out, "Total time: {:.3}ms", Self::median(&self.total_timing))?;
        for round in 0..self.plan.len() {
            writeln!(
                out,
                "Round {} : Stitch: {:.3}ms, Sort: {:.3}ms, Group: {:.3}ms, Total: {:.3}ms",
                round,
                Self::median(&self.stitch_timing[round]),
                Self::median(&self.sort_timing[round]),
                Self::median(&self.group_timing[round]),
                Self::median(&self.round_timing[round]),
            )?;
        }
        writeln!(out)?;
        Ok(())
    }
}
