use crate::display::round_to;
use crate::models::{OperationRecord, QualityEntry};

/// Fields whose absence is reported after each upload.
const IMPORTANT_FIELDS: [(&str, fn(&OperationRecord) -> bool); 3] = [
    ("Handler", |r| r.handler.is_none()),
    ("Salesperson", |r| r.salesperson.is_none()),
    ("Status", |r| r.status.is_none()),
];

/// Missing-value percentages over the rows about to be stored.
pub fn quality_report(new: &[OperationRecord]) -> Vec<QualityEntry> {
    if new.is_empty() {
        return Vec::new();
    }
    let total = new.len() as f64;
    IMPORTANT_FIELDS
        .iter()
        .map(|(field, is_missing)| {
            let missing = new.iter().filter(|r| is_missing(r)).count() as u64;
            QualityEntry {
                field: field.to_string(),
                missing,
                percent: round_to(missing as f64 / total * 100.0, 1),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_has_empty_report() {
        assert!(quality_report(&[]).is_empty());
    }

    #[test]
    fn test_missing_percentages() {
        let mut a = OperationRecord::empty("F1".to_string());
        a.handler = Some("ANA".to_string());
        a.status = Some("ABIERTO".to_string());
        let mut b = OperationRecord::empty("F2".to_string());
        b.handler = Some("LUIS".to_string());
        let c = OperationRecord::empty("F3".to_string());

        let report = quality_report(&[a, b, c]);
        assert_eq!(report.len(), 3);
        assert_eq!(report[0].field, "Handler");
        assert_eq!(report[0].missing, 1);
        assert_eq!(report[0].percent, 33.3);
        assert_eq!(report[1].field, "Salesperson");
        assert_eq!(report[1].percent, 100.0);
        assert_eq!(report[2].missing, 2);
        assert_eq!(report[2].percent, 66.7);
    }
}
