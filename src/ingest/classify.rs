//! Reconciliation of an upload against the keys already stored.

use std::collections::{HashMap, HashSet};

use crate::display::NOT_SPECIFIED;
use crate::models::{OperationRecord, UploadRow};

/// Placeholder spellings that mean "no value".
const MISSING_MARKERS: [&str; 5] = ["NAN", "NONE", "NA", NOT_SPECIFIED, "NO ESPECIFICADO"];

/// Upper-cased, trimmed categorical value; placeholders become `None`.
pub fn clean_text(value: Option<&str>) -> Option<String> {
    let upper = value?.trim().to_uppercase();
    if upper.is_empty() || MISSING_MARKERS.contains(&upper.as_str()) {
        None
    } else {
        Some(upper)
    }
}

/// Key form used on both sides of the comparison.
pub fn normalize_key(key: &str) -> Option<String> {
    clean_text(Some(key))
}

pub fn clean_row(row: UploadRow) -> UploadRow {
    UploadRow {
        file: clean_text(row.file.as_deref()),
        client_id: clean_text(row.client_id.as_deref()),
        client: clean_text(row.client.as_deref()),
        op_type: clean_text(row.op_type.as_deref()),
        handler: clean_text(row.handler.as_deref()),
        salesperson: clean_text(row.salesperson.as_deref()),
        billing_route: clean_text(row.billing_route.as_deref()),
        status: clean_text(row.status.as_deref()),
        ..row
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// First occurrence of each key not yet stored.
    pub new: Vec<OperationRecord>,
    /// First occurrence of each key already stored.
    pub existing: Vec<OperationRecord>,
    /// Every occurrence of keys repeated within the upload, sorted by key.
    pub internal_duplicates: Vec<OperationRecord>,
    /// Rows dropped because they had no usable key.
    pub invalid_key_rows: usize,
}

/// Splits an upload into new, existing and internally duplicated rows.
pub fn classify(rows: Vec<UploadRow>, existing_keys: &HashSet<String>) -> Classification {
    let mut invalid_key_rows = 0;
    let mut valid: Vec<OperationRecord> = Vec::with_capacity(rows.len());
    for row in rows.into_iter().map(clean_row) {
        match row.file.clone() {
            Some(key) => valid.push(row.rekey(key)),
            None => invalid_key_rows += 1,
        }
    }

    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for record in &valid {
        *occurrences.entry(record.file.clone()).or_insert(0) += 1;
    }

    let mut internal_duplicates = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();
    for record in valid {
        if occurrences.get(&record.file).copied().unwrap_or(0) > 1 {
            internal_duplicates.push(record.clone());
        }
        if seen.insert(record.file.clone()) {
            candidates.push(record);
        }
    }
    internal_duplicates.sort_by(|a, b| a.file.cmp(&b.file));

    let (existing, new): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|r| existing_keys.contains(&r.file));

    Classification {
        new,
        existing,
        internal_duplicates,
        invalid_key_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(file: &str, handler: &str) -> UploadRow {
        let mut r = UploadRow::empty(Some(file.to_string()));
        r.handler = Some(handler.to_string());
        r
    }

    fn keys(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_internal_duplicates_example() {
        let rows = vec![row("F1", "ANA"), row("F1", "LUIS"), row("F2", "ANA")];
        let result = classify(rows, &HashSet::new());

        assert_eq!(result.internal_duplicates.len(), 2);
        assert!(result.internal_duplicates.iter().all(|r| r.file == "F1"));
        assert_eq!(result.new.len(), 2);
        assert_eq!(result.new[0].file, "F1");
        assert_eq!(result.new[0].handler.as_deref(), Some("ANA"));
        assert_eq!(result.new[1].file, "F2");
        assert!(result.existing.is_empty());
    }

    #[test]
    fn test_existing_keys_partition() {
        let rows = vec![row("F1", "ANA"), row("F2", "ANA"), row("F3", "ANA")];
        let result = classify(rows, &keys(&["F2"]));
        let new: Vec<_> = result.new.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(new, vec!["F1", "F3"]);
        assert_eq!(result.existing.len(), 1);
        assert_eq!(result.existing[0].file, "F2");
    }

    #[test]
    fn test_missing_keys_excluded() {
        let rows = vec![
            UploadRow::empty(None),
            UploadRow::empty(Some("  ".to_string())),
            UploadRow::empty(Some("nan".to_string())),
            UploadRow::empty(Some("NOT SPECIFIED".to_string())),
            row("f9", "ana"),
        ];
        let result = classify(rows, &HashSet::new());
        assert_eq!(result.invalid_key_rows, 4);
        assert_eq!(result.new.len(), 1);
        assert_eq!(result.new[0].file, "F9");
        assert_eq!(result.new[0].handler.as_deref(), Some("ANA"));
    }

    #[test]
    fn test_keys_compared_after_cleaning() {
        let rows = vec![row(" f1 ", "ANA"), row("F1", "LUIS")];
        let result = classify(rows, &keys(&["F1"]));
        assert!(result.new.is_empty());
        assert_eq!(result.existing.len(), 1);
        assert_eq!(result.internal_duplicates.len(), 2);
    }

    #[test]
    fn test_empty_upload() {
        let result = classify(Vec::new(), &keys(&["F1"]));
        assert_eq!(result, Classification::default());
    }

    #[test]
    fn test_placeholders_become_none() {
        let mut r = row("F1", "none");
        r.status = Some("".to_string());
        r.salesperson = Some("No Especificado".to_string());
        r.opened_on = NaiveDate::from_ymd_opt(2024, 1, 1);
        let result = classify(vec![r], &HashSet::new());
        let rec = &result.new[0];
        assert_eq!(rec.handler, None);
        assert_eq!(rec.status, None);
        assert_eq!(rec.salesperson, None);
        assert_eq!(rec.opened_on, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn test_partition_invariants() {
        let rows = vec![
            row("A1", "X"),
            row("A2", "X"),
            row("A2", "Y"),
            row("A3", "X"),
            row("A4", "X"),
            row("A4", "Z"),
            row("A4", "Y"),
            UploadRow::empty(None),
        ];
        let stored = keys(&["A3", "A4", "Z9"]);
        let result = classify(rows.clone(), &stored);

        let new_keys: HashSet<_> = result.new.iter().map(|r| r.file.clone()).collect();
        let existing_keys: HashSet<_> = result.existing.iter().map(|r| r.file.clone()).collect();
        assert_eq!(new_keys.len(), result.new.len());
        assert!(new_keys.is_disjoint(&existing_keys));
        assert!(new_keys.is_disjoint(&stored));

        let covered: HashSet<_> = result
            .new
            .iter()
            .chain(&result.existing)
            .chain(&result.internal_duplicates)
            .map(|r| r.file.clone())
            .collect();
        for r in rows.iter().filter_map(|r| r.file.clone()) {
            assert!(covered.contains(&r));
        }
        assert_eq!(result.internal_duplicates.len(), 5);
    }

    #[test]
    fn test_reclassifying_new_rows_is_idempotent() {
        let rows = vec![row("F1", "ANA"), row("F2", "LUIS"), row("F2", "ANA")];
        let first = classify(rows, &HashSet::new());

        let mut stored: HashSet<String> = HashSet::new();
        stored.extend(first.new.iter().map(|r| r.file.clone()));
        let again: Vec<UploadRow> = first
            .new
            .iter()
            .cloned()
            .map(|r| {
                let key = Some(r.file.clone());
                r.rekey(key)
            })
            .collect();
        let second = classify(again, &stored);
        assert!(second.new.is_empty());
        assert_eq!(second.existing.len(), 2);
    }
}
