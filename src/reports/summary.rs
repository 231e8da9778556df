use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use super::filter::months_spanned;
use crate::display::or_not_specified;
use crate::models::{HandlerType, OperationRecord, OperationType};

/// Handlers listed in the workload ranking.
pub const TOP_HANDLERS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerTypeCount {
    #[serde(serialize_with = "or_not_specified")]
    pub handler: Option<String>,
    #[serde(serialize_with = "or_not_specified")]
    pub op_type: Option<String>,
    pub operations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCount {
    pub month: String,
    pub operations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeCount {
    #[serde(serialize_with = "or_not_specified")]
    pub op_type: Option<String>,
    pub label: Option<&'static str>,
    pub operations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerCount {
    #[serde(serialize_with = "or_not_specified")]
    pub handler: Option<String>,
    pub operations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationsSummary {
    pub total: usize,
    /// Handler ascending, then count descending.
    pub by_handler_type: Vec<HandlerTypeCount>,
    pub monthly_trend: Vec<MonthCount>,
    pub type_distribution: Vec<TypeCount>,
    pub top_handlers: Vec<HandlerCount>,
}

pub fn operations_summary(ops: &[OperationRecord]) -> OperationsSummary {
    let mut pairs: BTreeMap<HandlerType, usize> = BTreeMap::new();
    let mut months = BTreeMap::new();
    let mut types: BTreeMap<Option<String>, usize> = BTreeMap::new();
    let mut handlers: BTreeMap<Option<String>, usize> = BTreeMap::new();
    for op in ops {
        *pairs.entry(op.group_key()).or_insert(0) += 1;
        if let Some(month) = op.opened_month() {
            *months.entry(month).or_insert(0) += 1;
        }
        *types.entry(op.op_type.clone()).or_insert(0) += 1;
        *handlers.entry(op.handler.clone()).or_insert(0) += 1;
    }

    let mut by_handler_type: Vec<HandlerTypeCount> = pairs
        .into_iter()
        .map(|(key, operations)| HandlerTypeCount {
            handler: key.handler,
            op_type: key.op_type,
            operations,
        })
        .collect();
    by_handler_type.sort_by(|a, b| a.handler.cmp(&b.handler).then_with(|| b.operations.cmp(&a.operations)));

    let monthly_trend = months
        .into_iter()
        .map(|(month, operations)| MonthCount {
            month: month.to_string(),
            operations,
        })
        .collect();

    let mut type_distribution: Vec<TypeCount> = types
        .into_iter()
        .map(|(op_type, operations)| TypeCount {
            label: op_type.as_deref().and_then(OperationType::from_code).map(OperationType::label),
            op_type,
            operations,
        })
        .collect();
    type_distribution.sort_by(|a, b| b.operations.cmp(&a.operations));

    let mut top_handlers: Vec<HandlerCount> = handlers
        .into_iter()
        .map(|(handler, operations)| HandlerCount { handler, operations })
        .collect();
    top_handlers.sort_by(|a, b| b.operations.cmp(&a.operations));
    top_handlers.truncate(TOP_HANDLERS);

    OperationsSummary {
        total: ops.len(),
        by_handler_type,
        monthly_trend,
        type_distribution,
        top_handlers,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total_operations: usize,
    pub open_operations: usize,
    pub closed_operations: usize,
    pub handlers: usize,
    pub clients: usize,
    pub months_spanned: u32,
    pub first_opened: Option<String>,
    pub last_opened: Option<String>,
}

/// Headline numbers for the overview page.
pub fn stats(ops: &[OperationRecord]) -> Stats {
    let closed = ops.iter().filter(|op| op.is_closed()).count();
    let handlers: HashSet<&str> = ops.iter().filter_map(|op| op.handler.as_deref()).collect();
    let clients: HashSet<&str> = ops.iter().filter_map(|op| op.client.as_deref()).collect();
    let dates = ops.iter().filter_map(|op| op.opened_on);
    Stats {
        total_operations: ops.len(),
        open_operations: ops.len() - closed,
        closed_operations: closed,
        handlers: handlers.len(),
        clients: clients.len(),
        months_spanned: months_spanned(ops),
        first_opened: dates.clone().min().map(|d| d.to_string()),
        last_opened: dates.max().map(|d| d.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn op(file: &str, handler: Option<&str>, op_type: &str, month: u32) -> OperationRecord {
        let mut r = OperationRecord::empty(file.to_string());
        r.handler = handler.map(str::to_string);
        r.op_type = Some(op_type.to_string());
        r.opened_on = NaiveDate::from_ymd_opt(2024, month, 3);
        r
    }

    fn data() -> Vec<OperationRecord> {
        vec![
            op("F1", Some("LUIS"), "A", 1),
            op("F2", Some("ANA"), "A", 1),
            op("F3", Some("ANA"), "M", 2),
            op("F4", Some("ANA"), "M", 2),
            op("F5", None, "T", 3),
        ]
    }

    #[test]
    fn test_handler_type_ordering() {
        let summary = operations_summary(&data());
        assert_eq!(summary.total, 5);
        let order: Vec<_> = summary
            .by_handler_type
            .iter()
            .map(|r| (r.handler.clone(), r.op_type.clone().unwrap(), r.operations))
            .collect();
        assert_eq!(
            order,
            vec![
                (None, "T".to_string(), 1),
                (Some("ANA".to_string()), "M".to_string(), 2),
                (Some("ANA".to_string()), "A".to_string(), 1),
                (Some("LUIS".to_string()), "A".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_trend_and_distribution() {
        let summary = operations_summary(&data());
        let months: Vec<_> = summary.monthly_trend.iter().map(|m| (m.month.as_str(), m.operations)).collect();
        assert_eq!(months, vec![("2024-01", 2), ("2024-02", 2), ("2024-03", 1)]);
        assert_eq!(summary.type_distribution[2].op_type.as_deref(), Some("T"));
        assert_eq!(summary.type_distribution[0].label, Some("Air"));
        assert_eq!(summary.top_handlers[0].handler.as_deref(), Some("ANA"));
        assert_eq!(summary.top_handlers[0].operations, 3);
    }

    #[test]
    fn test_top_handlers_capped() {
        let ops: Vec<_> = (0..20)
            .map(|i| op(&format!("F{}", i), Some(&format!("H{:02}", i)), "A", 1))
            .collect();
        assert_eq!(operations_summary(&ops).top_handlers.len(), TOP_HANDLERS);
    }

    #[test]
    fn test_stats() {
        let mut ops = data();
        ops[0].closed_on = NaiveDate::from_ymd_opt(2024, 2, 1);
        let s = stats(&ops);
        assert_eq!(s.total_operations, 5);
        assert_eq!(s.closed_operations, 1);
        assert_eq!(s.open_operations, 4);
        assert_eq!(s.handlers, 2);
        assert_eq!(s.months_spanned, 3);
        assert_eq!(s.first_opened.as_deref(), Some("2024-01-03"));
    }
}
