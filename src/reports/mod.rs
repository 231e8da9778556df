//! Report calculations. Every function here is a pure pass over an
//! in-memory slice of operations; fetching and caching happen elsewhere.

use serde::Serialize;

use crate::models::OperationRecord;

pub mod assignment;
pub mod capacity;
pub mod cycle_time;
pub mod filter;
pub mod flow;
pub mod forecast;
pub mod summary;

pub use assignment::{score_assignments, AssignmentScore};
pub use capacity::{capacity, workload_balance, CapacityRow, WorkloadBalance};
pub use cycle_time::{bottlenecks, cycle_durations, BottleneckReport, CycleDuration};
pub use filter::{months_spanned, parse_list, ReportFilter};
pub use flow::{flow_index, FlowLevel, FlowRow};
pub use forecast::{forecast_volume, Forecaster, SeasonalTrendForecaster, VolumeForecast};
pub use summary::{operations_summary, stats, OperationsSummary, Stats};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleTimeReport {
    pub closed_operations: usize,
    pub by_handler: Vec<cycle_time::GroupStats>,
    pub by_type: Vec<cycle_time::GroupStats>,
    pub standards: Vec<cycle_time::StandardComparison>,
    pub on_time: Vec<cycle_time::OnTimeRow>,
}

pub fn cycle_time_report(ops: &[OperationRecord]) -> CycleTimeReport {
    let durations = cycle_durations(ops);
    CycleTimeReport {
        closed_operations: durations.len(),
        by_handler: cycle_time::stats_by_handler(&durations),
        by_type: cycle_time::stats_by_type(&durations),
        standards: cycle_time::standards_comparison(&durations),
        on_time: cycle_time::on_time_report(&durations),
    }
}

/// Assignment ranking computed straight from operations.
pub fn assignment_ranking(ops: &[OperationRecord]) -> Vec<AssignmentScore> {
    let durations = cycle_durations(ops);
    let averages = cycle_time::average_by_pair(&durations);
    let on_time = cycle_time::on_time_rates(&durations);
    score_assignments(&capacity(ops), &averages, Some(&on_time))
}

/// Flow classification over the months actually covered by `ops`.
pub fn flow_report(ops: &[OperationRecord]) -> Vec<FlowRow> {
    flow_index(ops, months_spanned(ops))
}
