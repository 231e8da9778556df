//! Opening-to-closing durations and everything derived from them: per-group
//! statistics, on-time rates, comparison with standard times and the
//! bottleneck diagnosis.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::display::{or_not_specified, round_to};
use crate::error::{OpsError, Result};
use crate::models::{HandlerType, OperationRecord, OperationType};

/// Closed operations needed before slow ones can be singled out.
pub const BOTTLENECK_MIN_CLOSED: usize = 20;
pub const BOTTLENECK_PERCENTILE: f64 = 0.8;
pub const BOTTLENECK_TOP_N: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleDuration {
    pub file: String,
    #[serde(serialize_with = "or_not_specified")]
    pub handler: Option<String>,
    #[serde(serialize_with = "or_not_specified")]
    pub op_type: Option<String>,
    #[serde(serialize_with = "or_not_specified")]
    pub client: Option<String>,
    pub opened_on: NaiveDate,
    pub closed_on: NaiveDate,
    pub duration_days: i64,
}

impl CycleDuration {
    pub fn group_key(&self) -> HandlerType {
        HandlerType::new(self.handler.as_deref(), self.op_type.as_deref())
    }

    /// Within the standard time of its type. Unknown types have no standard.
    pub fn on_time(&self) -> Option<bool> {
        let standard = self
            .op_type
            .as_deref()
            .and_then(OperationType::from_code)?
            .standard_cycle_days();
        Some(self.duration_days <= standard as i64)
    }
}

/// Durations of every operation with both dates; negative spans are dropped.
pub fn cycle_durations(ops: &[OperationRecord]) -> Vec<CycleDuration> {
    ops.iter()
        .filter_map(|op| {
            let (opened_on, closed_on) = (op.opened_on?, op.closed_on?);
            let duration_days = (closed_on - opened_on).num_days();
            (duration_days >= 0).then(|| CycleDuration {
                file: op.file.clone(),
                handler: op.handler.clone(),
                op_type: op.op_type.clone(),
                client: op.client.clone(),
                opened_on,
                closed_on,
                duration_days,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    #[serde(serialize_with = "or_not_specified")]
    pub group: Option<String>,
    pub count: usize,
    pub mean_days: f64,
    pub min_days: i64,
    pub max_days: i64,
}

fn group_stats<F>(durations: &[CycleDuration], key: F) -> Vec<GroupStats>
where
    F: Fn(&CycleDuration) -> Option<String>,
{
    let mut groups: BTreeMap<Option<String>, Vec<i64>> = BTreeMap::new();
    for d in durations {
        groups.entry(key(d)).or_default().push(d.duration_days);
    }
    groups
        .into_iter()
        .map(|(group, days)| {
            let sum: i64 = days.iter().sum();
            GroupStats {
                group,
                count: days.len(),
                mean_days: round_to(sum as f64 / days.len() as f64, 1),
                min_days: days.iter().copied().min().unwrap_or(0),
                max_days: days.iter().copied().max().unwrap_or(0),
            }
        })
        .collect()
}

pub fn stats_by_handler(durations: &[CycleDuration]) -> Vec<GroupStats> {
    group_stats(durations, |d| d.handler.clone())
}

pub fn stats_by_type(durations: &[CycleDuration]) -> Vec<GroupStats> {
    group_stats(durations, |d| d.op_type.clone())
}

/// Unrounded mean duration per (handler, type).
pub fn average_by_pair(durations: &[CycleDuration]) -> HashMap<HandlerType, f64> {
    let mut sums: HashMap<HandlerType, (i64, usize)> = HashMap::new();
    for d in durations {
        let entry = sums.entry(d.group_key()).or_insert((0, 0));
        entry.0 += d.duration_days;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, n))| (key, sum as f64 / n as f64))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnTimeRow {
    #[serde(serialize_with = "or_not_specified")]
    pub handler: Option<String>,
    #[serde(serialize_with = "or_not_specified")]
    pub op_type: Option<String>,
    pub closed: usize,
    pub on_time: usize,
    pub rate: f64,
}

/// Share of closed operations finished within their standard time, per pair.
/// Operations of unknown type are not rated.
pub fn on_time_report(durations: &[CycleDuration]) -> Vec<OnTimeRow> {
    let mut counts: BTreeMap<HandlerType, (usize, usize)> = BTreeMap::new();
    for d in durations {
        let Some(on_time) = d.on_time() else { continue };
        let entry = counts.entry(d.group_key()).or_insert((0, 0));
        entry.0 += 1;
        if on_time {
            entry.1 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(key, (closed, on_time))| OnTimeRow {
            handler: key.handler,
            op_type: key.op_type,
            closed,
            on_time,
            rate: on_time as f64 / closed as f64,
        })
        .collect()
}

pub fn on_time_rates(durations: &[CycleDuration]) -> HashMap<HandlerType, f64> {
    on_time_report(durations)
        .into_iter()
        .map(|row| (HandlerType::new(row.handler.as_deref(), row.op_type.as_deref()), row.rate))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardComparison {
    pub op_type: &'static str,
    pub label: &'static str,
    pub standard_days: u32,
    pub target_days: u32,
    pub actual_mean_days: Option<f64>,
    pub closed: usize,
}

/// Actual mean duration of each known type next to its standard and target.
pub fn standards_comparison(durations: &[CycleDuration]) -> Vec<StandardComparison> {
    OperationType::ALL
        .iter()
        .map(|&t| {
            let days: Vec<i64> = durations
                .iter()
                .filter(|d| d.op_type.as_deref().and_then(OperationType::from_code) == Some(t))
                .map(|d| d.duration_days)
                .collect();
            let actual_mean_days = (!days.is_empty())
                .then(|| round_to(days.iter().sum::<i64>() as f64 / days.len() as f64, 1));
            StandardComparison {
                op_type: t.code(),
                label: t.label(),
                standard_days: t.standard_cycle_days(),
                target_days: t.target_cycle_days(),
                actual_mean_days,
                closed: days.len(),
            }
        })
        .collect()
}

/// Linear-interpolated quantile of unsorted values; `None` when empty.
pub fn percentile(values: &[i64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] as f64 + (sorted[upper] - sorted[lower]) as f64 * frac)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCount {
    #[serde(serialize_with = "or_not_specified")]
    pub value: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BottleneckReport {
    pub closed_operations: usize,
    pub threshold_days: f64,
    pub slow_operations: usize,
    pub top_types: Vec<RankedCount>,
    pub top_handlers: Vec<RankedCount>,
    pub top_clients: Vec<RankedCount>,
}

fn top_counts<'a, I>(values: I) -> Vec<RankedCount>
where
    I: Iterator<Item = &'a Option<String>>,
{
    let mut counts: BTreeMap<Option<String>, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v.clone()).or_insert(0) += 1;
    }
    let mut ranked: Vec<RankedCount> = counts
        .into_iter()
        .map(|(value, count)| RankedCount { value, count })
        .collect();
    // stable: ties keep key order
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(BOTTLENECK_TOP_N);
    ranked
}

/// Operations slower than the 80th percentile, and who and what they involve.
pub fn bottlenecks(durations: &[CycleDuration]) -> Result<BottleneckReport> {
    if durations.len() < BOTTLENECK_MIN_CLOSED {
        return Err(OpsError::InsufficientHistory(format!(
            "{} closed operations, at least {} needed",
            durations.len(),
            BOTTLENECK_MIN_CLOSED
        )));
    }
    let days: Vec<i64> = durations.iter().map(|d| d.duration_days).collect();
    let threshold = percentile(&days, BOTTLENECK_PERCENTILE).unwrap_or(0.0);
    let slow: Vec<&CycleDuration> = durations
        .iter()
        .filter(|d| d.duration_days as f64 > threshold)
        .collect();

    Ok(BottleneckReport {
        closed_operations: durations.len(),
        threshold_days: round_to(threshold, 1),
        slow_operations: slow.len(),
        top_types: top_counts(slow.iter().map(|d| &d.op_type)),
        top_handlers: top_counts(slow.iter().map(|d| &d.handler)),
        top_clients: top_counts(slow.iter().map(|d| &d.client)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(file: &str, handler: &str, op_type: &str, opened: (u32, u32), days: i64) -> OperationRecord {
        let mut r = OperationRecord::empty(file.to_string());
        r.handler = Some(handler.to_string());
        r.op_type = Some(op_type.to_string());
        r.opened_on = NaiveDate::from_ymd_opt(2024, opened.0, opened.1);
        r.closed_on = r.opened_on.map(|d| d + chrono::Duration::days(days));
        r
    }

    #[test]
    fn test_durations_skip_open_and_negative() {
        let mut open = closed("F2", "ANA", "A", (1, 1), 0);
        open.closed_on = None;
        let ops = vec![
            closed("F1", "ANA", "A", (1, 1), 10),
            open,
            closed("F3", "ANA", "A", (1, 10), -3),
            closed("F4", "ANA", "A", (1, 10), 0),
        ];
        let d = cycle_durations(&ops);
        let files: Vec<_> = d.iter().map(|c| c.file.as_str()).collect();
        assert_eq!(files, vec!["F1", "F4"]);
        assert!(d.iter().all(|c| c.duration_days >= 0));
    }

    #[test]
    fn test_group_stats() {
        let ops = vec![
            closed("F1", "ANA", "A", (1, 1), 10),
            closed("F2", "ANA", "M", (1, 1), 40),
            closed("F3", "LUIS", "A", (1, 1), 21),
        ];
        let d = cycle_durations(&ops);
        let by_handler = stats_by_handler(&d);
        assert_eq!(by_handler[0].group.as_deref(), Some("ANA"));
        assert_eq!(by_handler[0].count, 2);
        assert_eq!(by_handler[0].mean_days, 25.0);
        assert_eq!((by_handler[0].min_days, by_handler[0].max_days), (10, 40));

        let by_type = stats_by_type(&d);
        assert_eq!(by_type[0].group.as_deref(), Some("A"));
        assert_eq!(by_type[0].mean_days, 15.5);
    }

    #[test]
    fn test_on_time_uses_type_standard() {
        let ops = vec![
            closed("F1", "ANA", "A", (1, 1), 30),
            closed("F2", "ANA", "A", (1, 1), 31),
            closed("F3", "ANA", "M", (1, 1), 80),
            closed("F4", "ANA", "Z", (1, 1), 1),
        ];
        let rates = on_time_rates(&cycle_durations(&ops));
        assert_eq!(rates[&HandlerType::new(Some("ANA"), Some("A"))], 0.5);
        assert_eq!(rates[&HandlerType::new(Some("ANA"), Some("M"))], 1.0);
        assert!(!rates.contains_key(&HandlerType::new(Some("ANA"), Some("Z"))));
    }

    #[test]
    fn test_standards_comparison() {
        let ops = vec![
            closed("F1", "ANA", "A", (1, 1), 25),
            closed("F2", "LUIS", "A", (1, 1), 30),
        ];
        let rows = standards_comparison(&cycle_durations(&ops));
        assert_eq!(rows.len(), 7);
        let air = rows.iter().find(|r| r.op_type == "A").unwrap();
        assert_eq!(air.standard_days, 30);
        assert_eq!(air.target_days, 20);
        assert_eq!(air.actual_mean_days, Some(27.5));
        let customs = rows.iter().find(|r| r.op_type == "C").unwrap();
        assert_eq!(customs.actual_mean_days, None);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values: Vec<i64> = (1..=10).collect();
        assert!((percentile(&values, 0.8).unwrap() - 8.2).abs() < 1e-9);
        assert_eq!(percentile(&[5], 0.8), Some(5.0));
        assert_eq!(percentile(&[], 0.8), None);
    }

    #[test]
    fn test_bottlenecks_need_history() {
        let ops: Vec<_> = (0..19)
            .map(|i| closed(&format!("F{}", i), "ANA", "A", (1, 1), i))
            .collect();
        let err = bottlenecks(&cycle_durations(&ops)).unwrap_err();
        assert!(matches!(err, OpsError::InsufficientHistory(_)));
    }

    #[test]
    fn test_bottlenecks_rank_slow_operations() {
        let mut ops: Vec<_> = (0..16)
            .map(|i| closed(&format!("F{}", i), "ANA", "A", (1, 1), 10))
            .collect();
        for i in 0..3 {
            ops.push(closed(&format!("S{}", i), "LUIS", "M", (1, 1), 120));
        }
        ops.push(closed("S9", "PEDRO", "T", (1, 1), 100));

        let report = bottlenecks(&cycle_durations(&ops)).unwrap();
        assert_eq!(report.closed_operations, 20);
        assert_eq!(report.threshold_days, 28.0);
        assert_eq!(report.slow_operations, 4);
        assert_eq!(report.top_handlers[0].value.as_deref(), Some("LUIS"));
        assert_eq!(report.top_handlers[0].count, 3);
        assert_eq!(report.top_types.len(), 2);
        assert_eq!(report.top_clients[0].value, None);
        assert_eq!(report.top_clients[0].count, 4);
    }
}
