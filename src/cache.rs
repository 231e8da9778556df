//! Report cache keyed on the dataset contents and the report parameters.
//!
//! Entries are type-erased so one cache holds every report shape. When full,
//! the oldest entry is evicted. Loads clear the whole cache.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;

pub const DEFAULT_CAPACITY: usize = 64;

/// Content hash of a dataset.
pub fn fingerprint<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    let bytes = serde_json::to_vec(data)?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fingerprint: String,
    pub report: &'static str,
    pub params: String,
}

impl CacheKey {
    pub fn new(fingerprint: &str, report: &'static str, params: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            report,
            params: params.into(),
        }
    }
}

type Entry = (CacheKey, Arc<dyn Any + Send + Sync>);

pub struct ReportCache {
    capacity: usize,
    entries: RwLock<VecDeque<Entry>>,
}

impl ReportCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::new()),
        }
    }

    pub async fn get<T: Any + Send + Sync>(&self, key: &CacheKey) -> Option<Arc<T>> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.clone().downcast::<T>().ok())
    }

    pub async fn insert<T: Any + Send + Sync>(&self, key: CacheKey, value: Arc<T>) {
        let mut entries = self.entries.write().await;
        entries.retain(|(k, _)| k != &key);
        while entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.pop_front() {
                debug!("Evicting cached {} report", evicted.report);
            }
        }
        let value: Arc<dyn Any + Send + Sync> = value;
        entries.push_back((key, value));
    }

    /// Cached value for `key`, computing and storing it on a miss.
    pub async fn get_or_compute<T, F>(&self, key: CacheKey, compute: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        if let Some(hit) = self.get::<T>(&key).await {
            return Ok(hit);
        }
        let value = Arc::new(compute()?);
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        debug!("Dropping {} cached reports", entries.len());
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
