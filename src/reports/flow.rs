use std::collections::BTreeMap;

use serde::Serialize;

use crate::display::{or_not_specified, round_to};
use crate::models::{quota_for, HandlerType, OperationRecord};

/// Index at or above which a handler is at full flow.
pub const HIGH_FLOW_INDEX: f64 = 100.0;
pub const MEDIUM_FLOW_INDEX: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlowLevel {
    High,
    Medium,
    Low,
}

impl FlowLevel {
    pub fn classify(index: f64) -> Self {
        if index >= HIGH_FLOW_INDEX {
            FlowLevel::High
        } else if index >= MEDIUM_FLOW_INDEX {
            FlowLevel::Medium
        } else {
            // NaN falls through both comparisons
            FlowLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlowLevel::High => "HIGH",
            FlowLevel::Medium => "MEDIUM",
            FlowLevel::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRow {
    #[serde(serialize_with = "or_not_specified")]
    pub handler: Option<String>,
    #[serde(serialize_with = "or_not_specified")]
    pub op_type: Option<String>,
    pub total: u32,
    pub monthly_average: f64,
    pub quota: u32,
    pub flow_index: f64,
    pub level: FlowLevel,
}

/// Monthly throughput per (handler, type) against the ideal quota.
pub fn flow_index(ops: &[OperationRecord], months: u32) -> Vec<FlowRow> {
    let months = months.max(1) as f64;
    let mut totals: BTreeMap<HandlerType, u32> = BTreeMap::new();
    for op in ops {
        *totals.entry(op.group_key()).or_insert(0) += 1;
    }

    totals
        .into_iter()
        .map(|(key, total)| {
            let quota = quota_for(key.op_type.as_deref());
            let monthly_average = total as f64 / months;
            let index = if quota == 0 {
                0.0
            } else {
                monthly_average / quota as f64 * 100.0
            };
            FlowRow {
                handler: key.handler,
                op_type: key.op_type,
                total,
                monthly_average: round_to(monthly_average, 2),
                quota,
                flow_index: round_to(index, 1),
                level: FlowLevel::classify(index),
            }
        })
        .collect()
}
