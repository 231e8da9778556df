//! Backing store for operations, load logs and usage sessions.
//!
//! Reads are paginated: callers walk fixed windows until a page comes back
//! empty, so large tables never depend on a single-call row limit.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::ingest::classify::normalize_key;
use crate::models::{LoadLogEntry, OperationRecord, SessionRecord};

pub mod memory;
pub mod surreal;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

/// Rows requested per page.
pub const PAGE_SIZE: usize = 1000;

#[async_trait]
pub trait OperationStore: Send + Sync {
    /// One window of stored `file` keys, ordered by key.
    async fn operation_keys(&self, offset: usize, limit: usize) -> Result<Vec<String>>;

    /// One window of stored operations, ordered by key.
    async fn operations(&self, offset: usize, limit: usize) -> Result<Vec<OperationRecord>>;

    /// Inserts all rows in one call. Fails without partial effect if any key
    /// is already stored.
    async fn insert_operations(&self, rows: &[OperationRecord]) -> Result<u64>;

    async fn append_load_log(&self, entry: &LoadLogEntry) -> Result<()>;

    async fn load_logs(&self) -> Result<Vec<LoadLogEntry>>;

    async fn insert_session(&self, session: &SessionRecord) -> Result<()>;

    async fn sessions(&self) -> Result<Vec<SessionRecord>>;
}

/// Every stored key, normalized for comparison with uploads.
pub async fn fetch_existing_keys(store: &dyn OperationStore) -> Result<HashSet<String>> {
    let mut keys = HashSet::new();
    let mut page = 0;
    loop {
        let batch = store.operation_keys(page * PAGE_SIZE, PAGE_SIZE).await?;
        if batch.is_empty() {
            break;
        }
        debug!("Key page {}: {} keys", page, batch.len());
        keys.extend(batch.iter().filter_map(|k| normalize_key(k)));
        page += 1;
    }
    Ok(keys)
}

/// Every stored operation.
pub async fn fetch_all_operations(store: &dyn OperationStore) -> Result<Vec<OperationRecord>> {
    let mut all = Vec::new();
    let mut page = 0;
    loop {
        let batch = store.operations(page * PAGE_SIZE, PAGE_SIZE).await?;
        if batch.is_empty() {
            break;
        }
        debug!("Operation page {}: {} rows", page, batch.len());
        all.extend(batch);
        page += 1;
    }
    Ok(all)
}

pub async fn latest_load_log(store: &dyn OperationStore) -> Result<Option<LoadLogEntry>> {
    let logs = store.load_logs().await?;
    Ok(logs.into_iter().max_by_key(|l| l.loaded_at))
}
