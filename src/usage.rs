//! Per-user usage sessions and the admin metrics built from them.
//!
//! A session starts on a user's first authenticated request, collects the
//! pages visited, and is recorded when the user logs out. Sessions the store
//! refuses are appended to a local JSON file instead.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::display::round_to;
use crate::error::Result;
use crate::models::SessionRecord;
use crate::store::OperationStore;

/// Scratch state of one signed-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub username: String,
    pub started_at: DateTime<Utc>,
    pages: Vec<String>,
}

impl SessionContext {
    pub fn new(username: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            username: username.to_string(),
            started_at,
            pages: Vec::new(),
        }
    }

    /// Records a page; repeat visits are kept once, in first-visit order.
    pub fn visit(&mut self, page: &str) {
        if !self.pages.iter().any(|p| p == page) {
            self.pages.push(page.to_string());
        }
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn finish(self, ended_at: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            duration_minutes: (ended_at - self.started_at).num_minutes().max(0),
            username: self.username,
            session_start: self.started_at,
            session_end: ended_at,
            pages_visited: self.pages,
        }
    }
}

pub struct SessionRegistry {
    active: Mutex<HashMap<String, SessionContext>>,
    fallback_path: PathBuf,
}

impl SessionRegistry {
    pub fn new(fallback_path: impl Into<PathBuf>) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            fallback_path: fallback_path.into(),
        }
    }

    /// Notes a page visit, opening a session for the user if needed.
    pub async fn touch(&self, username: &str, page: &str, now: DateTime<Utc>) {
        let mut active = self.active.lock().await;
        active
            .entry(username.to_string())
            .or_insert_with(|| {
                debug!("Session started for {}", username);
                SessionContext::new(username, now)
            })
            .visit(page);
    }

    #[cfg(test)]
    async fn active(&self, username: &str) -> Option<SessionContext> {
        self.active.lock().await.get(username).cloned()
    }

    /// Closes the user's session and records it. Returns `None` when the
    /// user had no open session.
    pub async fn finish(
        &self,
        store: &dyn OperationStore,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>> {
        let Some(context) = self.active.lock().await.remove(username) else {
            return Ok(None);
        };
        let record = context.finish(now);
        if let Err(e) = store.insert_session(&record).await {
            warn!(
                "Could not store session of {} ({}), writing to {}",
                username,
                e,
                self.fallback_path.display()
            );
            append_fallback(&self.fallback_path, &record).await?;
        }
        Ok(Some(record))
    }

    /// Every recorded session: from the store, or from the fallback file
    /// when the store cannot be read.
    pub async fn recorded_sessions(&self, store: &dyn OperationStore) -> Result<Vec<SessionRecord>> {
        match store.sessions().await {
            Ok(sessions) => Ok(sessions),
            Err(e) => {
                warn!("Could not read sessions from store ({}), using local file", e);
                read_fallback(&self.fallback_path).await
            }
        }
    }
}

pub async fn read_fallback(path: &Path) -> Result<Vec<SessionRecord>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

pub async fn append_fallback(path: &Path, record: &SessionRecord) -> Result<()> {
    let mut sessions = read_fallback(path).await?;
    sessions.push(record.clone());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, serde_json::to_vec_pretty(&sessions)?).await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserUsage {
    pub username: String,
    pub sessions: usize,
    pub total_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub days: u32,
    pub total_sessions: usize,
    pub unique_users: usize,
    pub avg_duration_minutes: f64,
    pub total_hours: f64,
    /// Most sessions first.
    pub by_user: Vec<UserUsage>,
    pub by_day: Vec<DailyUsage>,
}

/// Usage over the `days` before `now`, by session start.
pub fn summarize_sessions(sessions: &[SessionRecord], now: DateTime<Utc>, days: u32) -> UsageSummary {
    let since = now
        .checked_sub_signed(Duration::days(days as i64))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let window: Vec<&SessionRecord> = sessions.iter().filter(|s| s.session_start >= since).collect();

    let total_minutes: i64 = window.iter().map(|s| s.duration_minutes).sum();
    let users: HashSet<&str> = window.iter().map(|s| s.username.as_str()).collect();

    let mut per_user: BTreeMap<&str, (usize, i64)> = BTreeMap::new();
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for s in &window {
        let entry = per_user.entry(s.username.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += s.duration_minutes;
        *per_day.entry(s.session_start.date_naive()).or_insert(0) += 1;
    }
    let mut by_user: Vec<UserUsage> = per_user
        .into_iter()
        .map(|(username, (sessions, total_minutes))| UserUsage {
            username: username.to_string(),
            sessions,
            total_minutes,
        })
        .collect();
    by_user.sort_by(|a, b| b.sessions.cmp(&a.sessions));

    let avg = if window.is_empty() {
        0.0
    } else {
        total_minutes as f64 / window.len() as f64
    };

    UsageSummary {
        days,
        total_sessions: window.len(),
        unique_users: users.len(),
        avg_duration_minutes: round_to(avg, 1),
        total_hours: round_to(total_minutes as f64 / 60.0, 1),
        by_user,
        by_day: per_day
            .into_iter()
            .map(|(date, sessions)| DailyUsage { date, sessions })
            .collect(),
    }
}

/// Latest `limit` sessions, newest first.
pub fn recent_sessions(sessions: &[SessionRecord], limit: usize) -> Vec<SessionRecord> {
    let mut sorted = sessions.to_vec();
    sorted.sort_by(|a, b| b.session_start.cmp(&a.session_start));
    sorted.truncate(limit);
    sorted
}
