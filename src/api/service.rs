//! Shared business logic for the dashboard API.
//!
//! Holds the store handle, the loaded dataset, the report cache and the
//! per-user usage sessions. Handlers and tests go through this type only.

use std::any::Any;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{fingerprint, CacheKey, ReportCache};
use crate::error::Result;
use crate::ingest::{self, BatchSummary, IngestionBatch, LoadOutcome};
use crate::models::{LoadLogEntry, OperationRecord, SessionRecord};
use crate::reports::{
    self, capacity::CapacityRow, cycle_time, AssignmentScore, BottleneckReport, FlowRow, Forecaster,
    OperationsSummary, ReportFilter, SeasonalTrendForecaster, Stats, VolumeForecast, WorkloadBalance,
};
use crate::store::{fetch_all_operations, latest_load_log, OperationStore};
use crate::usage::{recent_sessions, summarize_sessions, SessionRegistry, UsageSummary};

/// Stored operations as served to reports, with their content hash.
#[derive(Clone)]
struct Dataset {
    operations: Arc<Vec<OperationRecord>>,
    fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub summary: BatchSummary,
    pub outcome: LoadOutcome,
}

pub struct DashboardService {
    store: Arc<dyn OperationStore>,
    dataset: Arc<RwLock<Option<Dataset>>>,
    reports: ReportCache,
    sessions: SessionRegistry,
    forecaster: Box<dyn Forecaster>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn OperationStore>, session_log: impl Into<PathBuf>) -> Self {
        Self {
            store,
            dataset: Arc::new(RwLock::new(None)),
            reports: ReportCache::default(),
            sessions: SessionRegistry::new(session_log),
            forecaster: Box::new(SeasonalTrendForecaster),
        }
    }

    pub fn with_forecaster(mut self, forecaster: Box<dyn Forecaster>) -> Self {
        self.forecaster = forecaster;
        self
    }

    async fn dataset(&self) -> Result<Dataset> {
        {
            let cache = self.dataset.read().await;
            if let Some(dataset) = cache.as_ref() {
                return Ok(dataset.clone());
            }
        }

        let all = fetch_all_operations(self.store.as_ref()).await?;
        let total = all.len();
        let dated: Vec<OperationRecord> = all.into_iter().filter(|op| op.opened_on.is_some()).collect();
        info!("Loaded {} operations ({} without opening date dropped)", dated.len(), total - dated.len());

        let dataset = Dataset {
            fingerprint: fingerprint(&dated)?,
            operations: Arc::new(dated),
        };
        *self.dataset.write().await = Some(dataset.clone());
        Ok(dataset)
    }

    /// Forgets the loaded dataset and every report computed from it.
    pub async fn invalidate(&self) {
        *self.dataset.write().await = None;
        self.reports.invalidate_all().await;
    }

    async fn cached_report<T, F>(&self, report: &'static str, filter: &ReportFilter, extra: &str, compute: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce(&[OperationRecord]) -> Result<T>,
    {
        let dataset = self.dataset().await?;
        let key = CacheKey::new(&dataset.fingerprint, report, format!("{}{}", filter.cache_params(), extra));
        self.reports
            .get_or_compute(key, || compute(&filter.apply(&dataset.operations)))
            .await
    }

    pub async fn stats(&self, filter: &ReportFilter) -> Result<Arc<Stats>> {
        self.cached_report("stats", filter, "", |ops| Ok(reports::stats(ops))).await
    }

    pub async fn summary(&self, filter: &ReportFilter) -> Result<Arc<OperationsSummary>> {
        self.cached_report("summary", filter, "", |ops| Ok(reports::operations_summary(ops)))
            .await
    }

    pub async fn capacity(&self, filter: &ReportFilter) -> Result<Arc<Vec<CapacityRow>>> {
        self.cached_report("capacity", filter, "", |ops| Ok(reports::capacity(ops))).await
    }

    pub async fn workload(&self, filter: &ReportFilter) -> Result<Arc<WorkloadBalance>> {
        self.cached_report("workload", filter, "", |ops| Ok(reports::workload_balance(ops)))
            .await
    }

    pub async fn flow(&self, filter: &ReportFilter) -> Result<Arc<Vec<FlowRow>>> {
        self.cached_report("flow", filter, "", |ops| Ok(reports::flow_report(ops))).await
    }

    pub async fn assignment(&self, filter: &ReportFilter) -> Result<Arc<Vec<AssignmentScore>>> {
        self.cached_report("assignment", filter, "", |ops| Ok(reports::assignment_ranking(ops)))
            .await
    }

    pub async fn cycle_times(&self, filter: &ReportFilter) -> Result<Arc<reports::CycleTimeReport>> {
        self.cached_report("cycle_times", filter, "", |ops| Ok(reports::cycle_time_report(ops)))
            .await
    }

    pub async fn bottlenecks(&self, filter: &ReportFilter) -> Result<Arc<BottleneckReport>> {
        self.cached_report("bottlenecks", filter, "", |ops| {
            cycle_time::bottlenecks(&reports::cycle_durations(ops))
        })
        .await
    }

    pub async fn forecast(&self, filter: &ReportFilter, horizon_days: u32) -> Result<Arc<VolumeForecast>> {
        let extra = format!("|{}|{}", self.forecaster.name(), horizon_days);
        self.cached_report("forecast", filter, &extra, |ops| {
            reports::forecast_volume(ops, horizon_days, self.forecaster.as_ref())
        })
        .await
    }

    pub async fn latest_load(&self) -> Result<Option<LoadLogEntry>> {
        latest_load_log(self.store.as_ref()).await
    }

    pub async fn analyze_upload(&self, body: &[u8], source: &str) -> Result<IngestionBatch> {
        ingest::analyze_upload(self.store.as_ref(), Cursor::new(body), source).await
    }

    /// Reconciles and commits an upload, then drops cached reports.
    pub async fn load_upload(&self, body: &[u8], source: &str) -> Result<UploadResult> {
        let batch = self.analyze_upload(body, source).await?;
        let outcome = ingest::commit(self.store.as_ref(), &batch).await?;
        if outcome.inserted > 0 {
            self.invalidate().await;
        }
        Ok(UploadResult {
            summary: batch.summary(),
            outcome,
        })
    }

    pub async fn record_visit(&self, username: &str, page: &str) {
        self.sessions.touch(username, page, Utc::now()).await;
    }

    pub async fn logout(&self, username: &str) -> Result<Option<SessionRecord>> {
        self.sessions.finish(self.store.as_ref(), username, Utc::now()).await
    }

    pub async fn usage(&self, days: u32) -> Result<UsageSummary> {
        let sessions = self.sessions.recorded_sessions(self.store.as_ref()).await?;
        Ok(summarize_sessions(&sessions, Utc::now(), days))
    }

    pub async fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let sessions = self.sessions.recorded_sessions(self.store.as_ref()).await?;
        Ok(recent_sessions(&sessions, limit))
    }
}
