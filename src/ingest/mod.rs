//! Upload pipeline: normalize headers, reconcile rows against the store,
//! report data quality, then commit the net-new rows.

use std::collections::HashSet;
use std::io::Read;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::display::or_not_specified;
use crate::error::Result;
use crate::models::{LoadLogEntry, OperationRecord, QualityEntry, UploadRow};
use crate::store::{fetch_existing_keys, OperationStore};

pub mod classify;
pub mod normalize;
pub mod quality;

use classify::classify;
use quality::quality_report;

/// Result of reconciling one upload. Lives until it is committed.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionBatch {
    pub source: String,
    pub new: Vec<OperationRecord>,
    pub existing: Vec<OperationRecord>,
    pub internal_duplicates: Vec<OperationRecord>,
    pub invalid_key_rows: usize,
    pub quality: Vec<QualityEntry>,
}

/// Counts shown to the uploader before committing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub source: String,
    pub new_records: usize,
    pub existing_records: usize,
    pub internal_duplicates: usize,
    pub invalid_key_rows: usize,
    pub quality: Vec<QualityEntry>,
}

/// A repeated row as shown to the uploader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateRow {
    pub file: String,
    #[serde(serialize_with = "or_not_specified")]
    pub client: Option<String>,
    #[serde(serialize_with = "or_not_specified")]
    pub op_type: Option<String>,
    #[serde(serialize_with = "or_not_specified")]
    pub handler: Option<String>,
    #[serde(serialize_with = "or_not_specified")]
    pub status: Option<String>,
    pub opened_on: Option<NaiveDate>,
}

impl From<&OperationRecord> for DuplicateRow {
    fn from(op: &OperationRecord) -> Self {
        Self {
            file: op.file.clone(),
            client: op.client.clone(),
            op_type: op.op_type.clone(),
            handler: op.handler.clone(),
            status: op.status.clone(),
            opened_on: op.opened_on,
        }
    }
}

impl IngestionBatch {
    pub fn duplicate_rows(&self) -> Vec<DuplicateRow> {
        self.internal_duplicates.iter().map(DuplicateRow::from).collect()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            source: self.source.clone(),
            new_records: self.new.len(),
            existing_records: self.existing.len(),
            internal_duplicates: self.internal_duplicates.len(),
            invalid_key_rows: self.invalid_key_rows,
            quality: self.quality.clone(),
        }
    }

    /// Rows not loaded because they were repeated or already stored.
    pub fn discarded(&self) -> usize {
        self.internal_duplicates.len() + self.existing.len()
    }

    pub fn log_entry(&self, loaded_at: DateTime<Utc>) -> LoadLogEntry {
        LoadLogEntry {
            loaded_at,
            source: self.source.clone(),
            new_records: self.new.len() as u64,
            existing_records: self.existing.len() as u64,
            internal_duplicates: self.internal_duplicates.len() as u64,
            discarded_records: self.discarded() as u64,
            invalid_key_rows: self.invalid_key_rows as u64,
            quality: self.quality.clone(),
        }
    }
}

/// Reconciles already-normalized rows against a set of stored keys.
pub fn analyze_rows(source: &str, rows: Vec<UploadRow>, existing_keys: &HashSet<String>) -> IngestionBatch {
    let classification = classify(rows, existing_keys);
    let quality = quality_report(&classification.new);
    IngestionBatch {
        source: source.to_string(),
        new: classification.new,
        existing: classification.existing,
        internal_duplicates: classification.internal_duplicates,
        invalid_key_rows: classification.invalid_key_rows,
        quality,
    }
}

/// Reads a CSV upload and reconciles it against every stored key.
pub async fn analyze_upload<R: Read>(store: &dyn OperationStore, reader: R, source: &str) -> Result<IngestionBatch> {
    let (columns, rows) = normalize::read_upload(reader)?;
    info!(
        "Read {} rows from {} ({} recognised columns)",
        rows.len(),
        source,
        columns.headers().len()
    );

    let existing_keys = fetch_existing_keys(store).await?;
    let batch = analyze_rows(source, rows, &existing_keys);
    info!(
        "Reconciled {}: {} new, {} existing, {} duplicated, {} without key",
        source,
        batch.new.len(),
        batch.existing.len(),
        batch.internal_duplicates.len(),
        batch.invalid_key_rows
    );
    Ok(batch)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadOutcome {
    pub inserted: u64,
    pub log_written: bool,
}

/// Inserts the batch's new rows in one call and appends a load-log entry.
///
/// An insert failure aborts the load. A failure to write the log after a
/// successful insert is reported in the outcome but does not undo the load.
pub async fn commit(store: &dyn OperationStore, batch: &IngestionBatch) -> Result<LoadOutcome> {
    let inserted = if batch.new.is_empty() {
        info!("No new operations in {}", batch.source);
        0
    } else {
        store.insert_operations(&batch.new).await?
    };

    let entry = batch.log_entry(Utc::now());
    let log_written = match store.append_load_log(&entry).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Loaded {} rows but could not write the load log: {}", inserted, e);
            false
        }
    };

    info!("Committed {}: {} operations inserted", batch.source, inserted);
    Ok(LoadOutcome { inserted, log_written })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fetch_all_operations, latest_load_log, MemoryStore};

    const UPLOAD: &str = "\
FILE,Tipo,Operativo,Comercial,Estado,Fecha File,Fecha Cierre,Unnamed: 7
F1,A,ana,luis,abierto,2024-01-05,,x
F1,A,ana,luis,abierto,2024-01-05,,x
F2,M,pedro,,cerrado,2024-01-10,2024-03-01,
,A,ana,luis,abierto,2024-02-01,,
F3,T,,luis,,2024-02-11,,
";

    #[tokio::test]
    async fn test_analyze_then_commit() {
        let store = MemoryStore::new();
        store
            .insert_operations(&[OperationRecord::empty("F3".to_string())])
            .await
            .unwrap();

        let batch = analyze_upload(&store, UPLOAD.as_bytes(), "jan.csv").await.unwrap();
        let summary = batch.summary();
        assert_eq!(summary.new_records, 2);
        assert_eq!(summary.existing_records, 1);
        assert_eq!(summary.internal_duplicates, 2);
        assert_eq!(summary.invalid_key_rows, 1);
        assert_eq!(batch.discarded(), 3);

        let shown = serde_json::to_value(batch.duplicate_rows()).unwrap();
        assert_eq!(shown[0]["file"], "F1");
        assert_eq!(shown[0]["handler"], "ANA");
        assert_eq!(shown[0]["client"], "NOT SPECIFIED");

        let outcome = commit(&store, &batch).await.unwrap();
        assert_eq!(outcome, LoadOutcome { inserted: 2, log_written: true });

        let stored = fetch_all_operations(&store).await.unwrap();
        assert_eq!(stored.len(), 3);
        let log = latest_load_log(&store).await.unwrap().unwrap();
        assert_eq!(log.new_records, 2);
        assert_eq!(log.discarded_records, 3);
        assert_eq!(log.source, "jan.csv");
    }

    #[tokio::test]
    async fn test_second_load_adds_nothing() {
        let store = MemoryStore::new();
        let first = analyze_upload(&store, UPLOAD.as_bytes(), "a.csv").await.unwrap();
        commit(&store, &first).await.unwrap();

        let second = analyze_upload(&store, UPLOAD.as_bytes(), "a.csv").await.unwrap();
        assert!(second.new.is_empty());
        assert!(second.quality.is_empty());
        let outcome = commit(&store, &second).await.unwrap();
        assert_eq!(outcome.inserted, 0);
        assert_eq!(store.load_logs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_aborts_analysis() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = analyze_upload(&store, UPLOAD.as_bytes(), "a.csv").await.unwrap_err();
        assert!(err.is_store_failure());
    }

    #[tokio::test]
    async fn test_racing_insert_surfaces_store_error() {
        let store = MemoryStore::new();
        let batch = analyze_upload(&store, UPLOAD.as_bytes(), "a.csv").await.unwrap();
        store
            .insert_operations(&[OperationRecord::empty("F2".to_string())])
            .await
            .unwrap();
        assert!(commit(&store, &batch).await.is_err());
        assert!(store.load_logs().await.unwrap().is_empty());
    }
}
