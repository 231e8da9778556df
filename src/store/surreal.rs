//! SurrealDB-backed store, embedded on RocksDB for real deployments and
//! in memory for tests.

use async_trait::async_trait;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;
use tracing::{debug, info};

use super::OperationStore;
use crate::error::Result;
use crate::models::{LoadLogEntry, OperationRecord, SessionRecord};

pub type DbConn = Surreal<Db>;

const SCHEMA: &str = r#"
    -- Operations keyed by their file number
    DEFINE TABLE IF NOT EXISTS operation SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_operation_file ON operation FIELDS file UNIQUE;
    DEFINE INDEX IF NOT EXISTS idx_operation_opened ON operation FIELDS opened_on;

    -- One row per load, append only
    DEFINE TABLE IF NOT EXISTS load_log SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_load_log_at ON load_log FIELDS loaded_at;

    DEFINE TABLE IF NOT EXISTS user_sessions SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS idx_sessions_user ON user_sessions FIELDS username;
"#;

const OPERATION_FIELDS: &str = "file, client_id, client, op_type, handler, salesperson, \
    billing_route, status, opened_on, first_invoice_on, arrival_on, departure_on, \
    invoiced_on, closing_sent_on, closed_on";

#[derive(Clone)]
pub struct SurrealStore {
    db: DbConn,
}

impl SurrealStore {
    /// Opens (or creates) the RocksDB-backed database at `path`.
    pub async fn connect(path: &str, namespace: &str, database: &str) -> Result<Self> {
        let db = Surreal::new::<RocksDb>(path).await?;
        db.use_ns(namespace).use_db(database).await?;
        info!("Connected to store at {} ({}/{})", path, namespace, database);
        Self::with_schema(db).await
    }

    pub async fn connect_memory() -> Result<Self> {
        let db = Surreal::new::<Mem>(()).await?;
        db.use_ns("logistics").use_db("operations").await?;
        Self::with_schema(db).await
    }

    async fn with_schema(db: DbConn) -> Result<Self> {
        db.query(SCHEMA).await?.check()?;
        Ok(Self { db })
    }
}

#[async_trait]
impl OperationStore for SurrealStore {
    async fn operation_keys(&self, offset: usize, limit: usize) -> Result<Vec<String>> {
        let keys: Vec<String> = self
            .db
            .query("SELECT VALUE file FROM operation ORDER BY file LIMIT $limit START $start")
            .bind(("limit", limit))
            .bind(("start", offset))
            .await?
            .take(0)?;
        Ok(keys)
    }

    async fn operations(&self, offset: usize, limit: usize) -> Result<Vec<OperationRecord>> {
        let sql = format!(
            "SELECT {} FROM operation ORDER BY file LIMIT $limit START $start",
            OPERATION_FIELDS
        );
        let rows: Vec<OperationRecord> = self
            .db
            .query(sql)
            .bind(("limit", limit))
            .bind(("start", offset))
            .await?
            .take(0)?;
        Ok(rows)
    }

    async fn insert_operations(&self, rows: &[OperationRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        debug!("Inserting {} operations", rows.len());
        self.db
            .query("INSERT INTO operation $rows")
            .bind(("rows", rows.to_vec()))
            .await?
            .check()?;
        Ok(rows.len() as u64)
    }

    async fn append_load_log(&self, entry: &LoadLogEntry) -> Result<()> {
        self.db
            .query("CREATE load_log CONTENT $entry")
            .bind(("entry", entry.clone()))
            .await?
            .check()?;
        Ok(())
    }

    async fn load_logs(&self) -> Result<Vec<LoadLogEntry>> {
        let logs: Vec<LoadLogEntry> = self
            .db
            .query("SELECT * OMIT id FROM load_log ORDER BY loaded_at")
            .await?
            .take(0)?;
        Ok(logs)
    }

    async fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        self.db
            .query("CREATE user_sessions CONTENT $session")
            .bind(("session", session.clone()))
            .await?
            .check()?;
        Ok(())
    }

    async fn sessions(&self) -> Result<Vec<SessionRecord>> {
        let sessions: Vec<SessionRecord> = self
            .db
            .query("SELECT * OMIT id FROM user_sessions ORDER BY session_start")
            .await?
            .take(0)?;
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fetch_all_operations, fetch_existing_keys};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn record(file: &str) -> OperationRecord {
        let mut r = OperationRecord::empty(file.to_string());
        r.handler = Some("ANA".to_string());
        r.op_type = Some("A".to_string());
        r.opened_on = NaiveDate::from_ymd_opt(2024, 3, 1);
        r
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let store = SurrealStore::connect_memory().await.unwrap();
        let inserted = store
            .insert_operations(&[record("F1"), record("F2")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let keys = fetch_existing_keys(&store).await.unwrap();
        assert!(keys.contains("F1") && keys.contains("F2"));

        let all = fetch_all_operations(&store).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], record("F1"));
    }

    #[tokio::test]
    async fn test_unique_index_rejects_stored_key() {
        let store = SurrealStore::connect_memory().await.unwrap();
        store.insert_operations(&[record("F1")]).await.unwrap();
        assert!(store.insert_operations(&[record("F1")]).await.is_err());
    }

    #[tokio::test]
    async fn test_load_log_round_trip() {
        let store = SurrealStore::connect_memory().await.unwrap();
        let entry = LoadLogEntry {
            loaded_at: Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap(),
            source: "march.csv".to_string(),
            new_records: 3,
            existing_records: 1,
            internal_duplicates: 0,
            discarded_records: 1,
            invalid_key_rows: 0,
            quality: Vec::new(),
        };
        store.append_load_log(&entry).await.unwrap();
        let logs = store.load_logs().await.unwrap();
        assert_eq!(logs, vec![entry]);
    }
}
