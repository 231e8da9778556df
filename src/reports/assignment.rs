//! Ranking of handlers for new work, combining free capacity with how fast
//! and how reliably they have closed that type of operation.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::capacity::CapacityRow;
use crate::display::{or_not_specified, round_to};
use crate::models::HandlerType;

/// Assumed cycle time when no closed operation exists anywhere.
pub const DEFAULT_CYCLE_DAYS: f64 = 90.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentScore {
    #[serde(serialize_with = "or_not_specified")]
    pub op_type: Option<String>,
    #[serde(serialize_with = "or_not_specified")]
    pub handler: Option<String>,
    pub available: u32,
    pub avg_cycle_days: f64,
    pub on_time_rate: Option<f64>,
    pub score: f64,
}

impl AssignmentScore {
    /// Score rounded for display.
    pub fn display_score(&self) -> f64 {
        round_to(self.score, 2)
    }
}

/// `available / (avg_cycle_days + 1) * 100`, boosted by the on-time rate
/// when one is known.
pub fn assignment_score(available: u32, avg_cycle_days: f64, on_time_rate: Option<f64>) -> f64 {
    let base = available as f64 / (avg_cycle_days + 1.0) * 100.0;
    match on_time_rate {
        Some(rate) => base * (1.0 + rate),
        None => base,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Cycle time per capacity row, filling gaps with the type's mean over the
/// rows, then with the overall mean, then with [`DEFAULT_CYCLE_DAYS`].
fn impute_cycle_days(capacity: &[CapacityRow], avg_cycle: &HashMap<HandlerType, f64>) -> Vec<f64> {
    let known: Vec<Option<f64>> = capacity.iter().map(|row| avg_cycle.get(&row.key()).copied()).collect();

    let mut per_type: BTreeMap<Option<&str>, Vec<f64>> = BTreeMap::new();
    for (row, days) in capacity.iter().zip(&known) {
        if let Some(days) = days {
            per_type.entry(row.op_type.as_deref()).or_default().push(*days);
        }
    }
    let type_means: BTreeMap<Option<&str>, f64> = per_type
        .into_iter()
        .filter_map(|(t, values)| mean(&values).map(|m| (t, m)))
        .collect();

    let filled: Vec<Option<f64>> = capacity
        .iter()
        .zip(&known)
        .map(|(row, days)| days.or_else(|| type_means.get(&row.op_type.as_deref()).copied()))
        .collect();
    let present: Vec<f64> = filled.iter().flatten().copied().collect();
    let overall = mean(&present).unwrap_or(DEFAULT_CYCLE_DAYS);

    filled.into_iter().map(|d| d.unwrap_or(overall)).collect()
}

/// Eligible (handler, type) pairs ranked by type, then by score descending.
pub fn score_assignments(
    capacity: &[CapacityRow],
    avg_cycle: &HashMap<HandlerType, f64>,
    on_time: Option<&HashMap<HandlerType, f64>>,
) -> Vec<AssignmentScore> {
    let cycle_days = impute_cycle_days(capacity, avg_cycle);

    let mut scores: Vec<AssignmentScore> = capacity
        .iter()
        .zip(cycle_days)
        .filter(|(row, _)| row.available > 0)
        .map(|(row, avg_cycle_days)| {
            let on_time_rate = on_time.and_then(|rates| rates.get(&row.key()).copied());
            AssignmentScore {
                op_type: row.op_type.clone(),
                handler: row.handler.clone(),
                available: row.available,
                avg_cycle_days,
                on_time_rate,
                score: assignment_score(row.available, avg_cycle_days, on_time_rate),
            }
        })
        .collect();

    scores.sort_by(|a, b| {
        a.op_type
            .cmp(&b.op_type)
            .then_with(|| b.score.total_cmp(&a.score))
            .then_with(|| a.handler.cmp(&b.handler))
    });
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(handler: &str, op_type: &str, available: u32) -> CapacityRow {
        CapacityRow {
            handler: Some(handler.to_string()),
            op_type: Some(op_type.to_string()),
            open: 0,
            closed: 0,
            quota: available,
            available,
        }
    }

    fn key(handler: &str, op_type: &str) -> HandlerType {
        HandlerType::new(Some(handler), Some(op_type))
    }

    #[test]
    fn test_worked_example() {
        let score = assignment_score(10, 20.0, None);
        assert_eq!(round_to(score, 2), 47.62);
    }

    #[test]
    fn test_on_time_boost_only_when_known() {
        let capacity = vec![cap("ANA", "A", 10), cap("LUIS", "A", 10)];
        let avg: HashMap<_, _> = [(key("ANA", "A"), 20.0), (key("LUIS", "A"), 20.0)].into_iter().collect();
        let rates: HashMap<_, _> = [(key("ANA", "A"), 0.5)].into_iter().collect();

        let scores = score_assignments(&capacity, &avg, Some(&rates));
        assert_eq!(scores[0].handler.as_deref(), Some("ANA"));
        assert_eq!(scores[0].display_score(), 71.43);
        assert_eq!(scores[1].on_time_rate, None);
        assert_eq!(scores[1].display_score(), 47.62);
    }

    #[test]
    fn test_more_capacity_never_scores_lower() {
        let a = assignment_score(5, 30.0, Some(0.2));
        let b = assignment_score(6, 30.0, Some(0.2));
        assert!(b >= a);
        let slower = assignment_score(6, 45.0, Some(0.2));
        assert!(slower <= b);
    }

    #[test]
    fn test_only_available_pairs_ranked_by_type() {
        let capacity = vec![
            cap("ANA", "M", 3),
            cap("LUIS", "A", 0),
            cap("PEDRO", "A", 4),
            cap("ANA", "A", 8),
        ];
        let avg: HashMap<_, _> = [(key("ANA", "M"), 50.0), (key("PEDRO", "A"), 10.0), (key("ANA", "A"), 10.0)]
            .into_iter()
            .collect();
        let scores = score_assignments(&capacity, &avg, None);
        let order: Vec<_> = scores
            .iter()
            .map(|s| (s.op_type.as_deref().unwrap(), s.handler.as_deref().unwrap()))
            .collect();
        assert_eq!(order, vec![("A", "ANA"), ("A", "PEDRO"), ("M", "ANA")]);
    }

    #[test]
    fn test_imputation_type_then_global_then_default() {
        let capacity = vec![cap("ANA", "A", 5), cap("LUIS", "A", 5), cap("PEDRO", "M", 5)];
        let avg: HashMap<_, _> = [(key("ANA", "A"), 12.0)].into_iter().collect();
        let scores = score_assignments(&capacity, &avg, None);
        let luis = scores.iter().find(|s| s.handler.as_deref() == Some("LUIS")).unwrap();
        assert_eq!(luis.avg_cycle_days, 12.0);
        let pedro = scores.iter().find(|s| s.handler.as_deref() == Some("PEDRO")).unwrap();
        assert_eq!(pedro.avg_cycle_days, 12.0);

        let none = score_assignments(&capacity, &HashMap::new(), None);
        assert!(none.iter().all(|s| s.avg_cycle_days == DEFAULT_CYCLE_DAYS));
    }
}
