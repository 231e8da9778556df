//! Open-operation load per handler: remaining capacity against the monthly
//! quota, and effort-weighted workload balance.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::display::or_not_specified;
use crate::models::{quota_for, HandlerType, OperationRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityRow {
    #[serde(serialize_with = "or_not_specified")]
    pub handler: Option<String>,
    #[serde(serialize_with = "or_not_specified")]
    pub op_type: Option<String>,
    pub open: u32,
    pub closed: u32,
    pub quota: u32,
    pub available: u32,
}

impl CapacityRow {
    pub fn key(&self) -> HandlerType {
        HandlerType::new(self.handler.as_deref(), self.op_type.as_deref())
    }
}

/// One row for every handler paired with every type seen in `ops`, ordered
/// by pair. Pairs with no operations keep their whole quota available.
pub fn capacity(ops: &[OperationRecord]) -> Vec<CapacityRow> {
    let handlers: BTreeSet<Option<String>> = ops.iter().map(|op| op.handler.clone()).collect();
    let types: BTreeSet<Option<String>> = ops.iter().map(|op| op.op_type.clone()).collect();

    let mut counts: BTreeMap<HandlerType, (u32, u32)> = BTreeMap::new();
    for handler in &handlers {
        for op_type in &types {
            counts.insert(
                HandlerType {
                    handler: handler.clone(),
                    op_type: op_type.clone(),
                },
                (0, 0),
            );
        }
    }
    for op in ops {
        let entry = counts.entry(op.group_key()).or_insert((0, 0));
        if op.is_closed_status() {
            entry.1 += 1;
        } else {
            entry.0 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(key, (open, closed))| {
            let quota = quota_for(key.op_type.as_deref());
            CapacityRow {
                handler: key.handler,
                op_type: key.op_type,
                open,
                closed,
                quota,
                available: quota.saturating_sub(open),
            }
        })
        .collect()
}

/// Effort carried by one open operation of an unknown type.
const DEFAULT_EFFORT: u32 = 1;

/// Handlers compared when looking for hidden overload.
const OVERLOAD_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerWorkload {
    #[serde(serialize_with = "or_not_specified")]
    pub handler: Option<String>,
    pub open_operations: u32,
    pub effort: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadBalance {
    /// Sorted by effort, heaviest first.
    pub handlers: Vec<HandlerWorkload>,
    /// Handlers among the heaviest by effort but not by raw count.
    pub hidden_overload: Vec<HandlerWorkload>,
}

pub fn workload_balance(ops: &[OperationRecord]) -> WorkloadBalance {
    let mut per_handler: BTreeMap<Option<String>, (u32, u32)> = BTreeMap::new();
    for op in ops.iter().filter(|op| !op.is_closed_status()) {
        let effort = op
            .operation_type()
            .map(|t| t.effort_points())
            .unwrap_or(DEFAULT_EFFORT);
        let entry = per_handler.entry(op.handler.clone()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += effort;
    }

    let rows: Vec<HandlerWorkload> = per_handler
        .into_iter()
        .map(|(handler, (open_operations, effort))| HandlerWorkload {
            handler,
            open_operations,
            effort,
        })
        .collect();

    let mut by_count = rows.clone();
    by_count.sort_by(|a, b| b.open_operations.cmp(&a.open_operations).then_with(|| a.handler.cmp(&b.handler)));
    let top_by_count: HashSet<Option<String>> = by_count
        .iter()
        .take(OVERLOAD_TOP_N)
        .map(|w| w.handler.clone())
        .collect();

    let mut handlers = rows;
    handlers.sort_by(|a, b| b.effort.cmp(&a.effort).then_with(|| a.handler.cmp(&b.handler)));
    let hidden_overload = handlers
        .iter()
        .take(OVERLOAD_TOP_N)
        .filter(|w| !top_by_count.contains(&w.handler))
        .cloned()
        .collect();

    WorkloadBalance {
        handlers,
        hidden_overload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::label;

    fn op(file: &str, handler: &str, op_type: &str, status: &str) -> OperationRecord {
        let mut r = OperationRecord::empty(file.to_string());
        r.handler = Some(handler.to_string());
        r.op_type = Some(op_type.to_string());
        r.status = Some(status.to_string());
        r
    }

    #[test]
    fn test_open_count_and_available() {
        let mut ops: Vec<_> = (0..5).map(|i| op(&format!("A{}", i), "ANA", "A", "ABIERTO")).collect();
        ops.push(op("A9", "ANA", "A", "Cerrado"));
        ops.push(op("M1", "ANA", "M", "CLOSED"));

        let rows = capacity(&ops);
        assert_eq!(rows.len(), 2);
        let air = &rows[0];
        assert_eq!(air.op_type.as_deref(), Some("A"));
        assert_eq!((air.open, air.closed, air.quota, air.available), (5, 1, 15, 10));
        let sea = &rows[1];
        assert_eq!((sea.open, sea.closed, sea.available), (0, 1, 10));
    }

    #[test]
    fn test_every_handler_offered_every_type() {
        let ops = vec![op("A1", "ANA", "A", "ABIERTO"), op("M1", "LUIS", "M", "ABIERTO")];
        let rows = capacity(&ops);
        let pairs: Vec<_> = rows
            .iter()
            .map(|r| (label(&r.handler).to_string(), label(&r.op_type).to_string(), r.open, r.available))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("ANA".to_string(), "A".to_string(), 1, 14),
                ("ANA".to_string(), "M".to_string(), 0, 10),
                ("LUIS".to_string(), "A".to_string(), 0, 15),
                ("LUIS".to_string(), "M".to_string(), 1, 9),
            ]
        );
    }

    #[test]
    fn test_available_never_negative() {
        let ops: Vec<_> = (0..7).map(|i| op(&format!("C{}", i), "LUIS", "C", "EN PROCESO")).collect();
        let rows = capacity(&ops);
        assert_eq!(rows[0].open, 7);
        assert_eq!(rows[0].available, 0);
    }

    #[test]
    fn test_unknown_type_has_zero_quota() {
        let rows = capacity(&[op("X1", "ANA", "Z", "ABIERTO")]);
        assert_eq!(rows[0].quota, 0);
        assert_eq!(rows[0].available, 0);
    }

    #[test]
    fn test_missing_handler_renders_sentinel() {
        let mut r = op("F1", "ANA", "A", "ABIERTO");
        r.handler = None;
        let json = serde_json::to_value(&capacity(&[r])[0]).unwrap();
        assert_eq!(json["handler"], "NOT SPECIFIED");
    }

    #[test]
    fn test_hidden_overload() {
        let mut ops = Vec::new();
        // five handlers with many light operations
        for h in ["H1", "H2", "H3", "H4", "H5"] {
            for i in 0..4 {
                ops.push(op(&format!("{}-{}", h, i), h, "A", "ABIERTO"));
            }
        }
        // one handler with fewer but heavy operations
        for i in 0..3 {
            ops.push(op(&format!("HEAVY-{}", i), "HEAVY", "M", "ABIERTO"));
        }
        ops.push(op("HEAVY-X", "HEAVY", "M", "CERRADO"));

        let balance = workload_balance(&ops);
        assert_eq!(balance.handlers[0].handler.as_deref(), Some("HEAVY"));
        assert_eq!(balance.handlers[0].effort, 27);
        assert_eq!(balance.handlers[0].open_operations, 3);
        assert_eq!(balance.hidden_overload.len(), 1);
        assert_eq!(balance.hidden_overload[0].handler.as_deref(), Some("HEAVY"));
    }
}
