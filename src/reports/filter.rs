use std::collections::{BTreeSet, HashSet};

use crate::display::label;
use crate::error::{OpsError, Result};
use crate::models::{OperationRecord, YearMonth};

/// Dashboard filter. `None` leaves a dimension unfiltered; an empty set
/// selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ReportFilter {
    pub years: Option<BTreeSet<i32>>,
    pub months: Option<BTreeSet<YearMonth>>,
    pub op_types: Option<BTreeSet<String>>,
    pub handlers: Option<BTreeSet<String>>,
}

impl ReportFilter {
    /// Builds a filter from comma-separated selections as typed by a user.
    /// Years must be integers and months `YYYY-MM`.
    pub fn from_lists(
        years: Option<&str>,
        months: Option<&str>,
        op_types: Option<&str>,
        handlers: Option<&str>,
    ) -> Result<Self> {
        let years = years
            .map(|raw| {
                parse_list(raw)
                    .iter()
                    .map(|y| {
                        y.parse::<i32>()
                            .map_err(|_| OpsError::InvalidArgument(format!("invalid year '{}'", y)))
                    })
                    .collect::<Result<BTreeSet<_>>>()
            })
            .transpose()?;
        let months = months
            .map(|raw| {
                parse_list(raw)
                    .iter()
                    .map(|m| {
                        YearMonth::parse(m).ok_or_else(|| {
                            OpsError::InvalidArgument(format!("invalid month '{}', expected YYYY-MM", m))
                        })
                    })
                    .collect::<Result<BTreeSet<_>>>()
            })
            .transpose()?;
        Ok(Self {
            years,
            months,
            op_types: op_types.map(parse_list),
            handlers: handlers.map(parse_list),
        })
    }

    pub fn matches(&self, op: &OperationRecord) -> bool {
        if let Some(years) = &self.years {
            match op.opened_on {
                Some(d) if years.contains(&YearMonth::from_date(d).year) => {}
                _ => return false,
            }
        }
        if let Some(months) = &self.months {
            match op.opened_month() {
                Some(m) if months.contains(&m) => {}
                _ => return false,
            }
        }
        if let Some(types) = &self.op_types {
            if !types.contains(label(&op.op_type)) {
                return false;
            }
        }
        if let Some(handlers) = &self.handlers {
            if !handlers.contains(label(&op.handler)) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, ops: &[OperationRecord]) -> Vec<OperationRecord> {
        ops.iter().filter(|op| self.matches(op)).cloned().collect()
    }

    /// Stable text form used in report cache keys.
    pub fn cache_params(&self) -> String {
        format!("{:?}", self)
    }
}

/// Splits a comma-separated selection. Blank items are skipped, so an empty
/// string yields an empty selection.
pub fn parse_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Distinct calendar months of opening dates, at least 1.
pub fn months_spanned(ops: &[OperationRecord]) -> u32 {
    let months: HashSet<YearMonth> = ops.iter().filter_map(|op| op.opened_month()).collect();
    (months.len() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn op(file: &str, handler: Option<&str>, op_type: &str, opened: (i32, u32, u32)) -> OperationRecord {
        let mut r = OperationRecord::empty(file.to_string());
        r.handler = handler.map(str::to_string);
        r.op_type = Some(op_type.to_string());
        r.opened_on = NaiveDate::from_ymd_opt(opened.0, opened.1, opened.2);
        r
    }

    fn data() -> Vec<OperationRecord> {
        vec![
            op("F1", Some("ANA"), "A", (2023, 12, 5)),
            op("F2", Some("ANA"), "M", (2024, 1, 9)),
            op("F3", Some("LUIS"), "A", (2024, 1, 20)),
            op("F4", None, "T", (2024, 2, 2)),
        ]
    }

    #[test]
    fn test_unfiltered_keeps_everything() {
        let filter = ReportFilter::default();
        assert_eq!(filter.apply(&data()).len(), 4);
        assert_eq!(ReportFilter::from_lists(None, None, None, None).unwrap(), filter);
    }

    #[test]
    fn test_from_lists() {
        let filter = ReportFilter::from_lists(Some("2024, 2023"), Some("2024-01"), Some("a"), Some("")).unwrap();
        assert_eq!(filter.years, Some([2023, 2024].into_iter().collect()));
        assert_eq!(filter.months, Some([YearMonth { year: 2024, month: 1 }].into_iter().collect()));
        assert_eq!(filter.op_types, Some(parse_list("A")));
        assert_eq!(filter.handlers, Some(BTreeSet::new()));

        let bad_year = ReportFilter::from_lists(Some("abc"), None, None, None);
        assert!(matches!(bad_year, Err(OpsError::InvalidArgument(_))));
        let bad_month = ReportFilter::from_lists(None, Some("2024-13"), None, None);
        assert!(matches!(bad_month, Err(OpsError::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_selection_selects_nothing() {
        let filter = ReportFilter {
            handlers: Some(BTreeSet::new()),
            ..Default::default()
        };
        assert!(filter.apply(&data()).is_empty());
    }

    #[test]
    fn test_combined_filters() {
        let filter = ReportFilter {
            years: Some([2024].into_iter().collect()),
            op_types: Some(parse_list("a, m")),
            ..Default::default()
        };
        let files: Vec<_> = filter.apply(&data()).into_iter().map(|r| r.file).collect();
        assert_eq!(files, vec!["F2", "F3"]);
    }

    #[test]
    fn test_month_and_unspecified_handler() {
        let filter = ReportFilter {
            months: Some([YearMonth { year: 2024, month: 2 }].into_iter().collect()),
            handlers: Some(parse_list("not specified")),
            ..Default::default()
        };
        let files: Vec<_> = filter.apply(&data()).into_iter().map(|r| r.file).collect();
        assert_eq!(files, vec!["F4"]);
    }

    #[test]
    fn test_months_spanned() {
        assert_eq!(months_spanned(&data()), 3);
        assert_eq!(months_spanned(&[]), 1);
        assert_eq!(months_spanned(&[OperationRecord::empty("X".to_string())]), 1);
    }
}
