//! In-process store with an outage switch, used by the service and API tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::OperationStore;
use crate::error::{OpsError, Result};
use crate::models::{LoadLogEntry, OperationRecord, SessionRecord};

#[derive(Default)]
struct Tables {
    operations: BTreeMap<String, OperationRecord>,
    load_log: Vec<LoadLogEntry>,
    sessions: Vec<SessionRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    page_requests: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of key pages served so far.
    pub fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(OpsError::StoreUnavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OperationStore for MemoryStore {
    async fn operation_keys(&self, offset: usize, limit: usize) -> Result<Vec<String>> {
        self.check()?;
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read().await;
        Ok(tables.operations.keys().skip(offset).take(limit).cloned().collect())
    }

    async fn operations(&self, offset: usize, limit: usize) -> Result<Vec<OperationRecord>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.operations.values().skip(offset).take(limit).cloned().collect())
    }

    async fn insert_operations(&self, rows: &[OperationRecord]) -> Result<u64> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if let Some(dup) = rows.iter().find(|r| tables.operations.contains_key(&r.file)) {
            return Err(OpsError::StoreUnavailable(format!(
                "unique index violated for file '{}'",
                dup.file
            )));
        }
        for row in rows {
            tables.operations.insert(row.file.clone(), row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn append_load_log(&self, entry: &LoadLogEntry) -> Result<()> {
        self.check()?;
        self.tables.write().await.load_log.push(entry.clone());
        Ok(())
    }

    async fn load_logs(&self) -> Result<Vec<LoadLogEntry>> {
        self.check()?;
        Ok(self.tables.read().await.load_log.clone())
    }

    async fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        self.check()?;
        self.tables.write().await.sessions.push(session.clone());
        Ok(())
    }

    async fn sessions(&self) -> Result<Vec<SessionRecord>> {
        self.check()?;
        Ok(self.tables.read().await.sessions.clone())
    }
}
