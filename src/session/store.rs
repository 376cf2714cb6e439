use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::warn;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::metrics::TimeRange;
use crate::models::SessionRecord;

use super::statistics::EfficiencyStatistics;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Where completed sessions are kept.
pub trait SessionStore: Send + Sync {
    fn save(&self, record: SessionRecord) -> Result<()>;

    /// Sessions whose start falls inside `range`, oldest first.
    fn load(&self, range: TimeRange) -> Result<Vec<SessionRecord>>;
}

/// Session history in one pretty-printed JSON file, rewritten on every
/// change.
pub struct JsonSessionStore {
    path: PathBuf,
    sessions: RwLock<Vec<SessionRecord>>,
}

impl JsonSessionStore {
    /// Opens the store at `path`. A missing file starts an empty history; an
    /// unparseable one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sessions = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read sessions from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("ignoring unreadable session file {}: {err}", path.display());
                Vec::new()
            })
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            sessions: RwLock::new(sessions),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<SessionRecord>> {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<SessionRecord>> {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn all(&self) -> Vec<SessionRecord> {
        self.read().clone()
    }

    pub fn statistics(&self, lookback: Duration, now: DateTime<Utc>) -> Result<EfficiencyStatistics> {
        let range = TimeRange::last(lookback, now);
        let sessions = self.load(range)?;
        Ok(EfficiencyStatistics::from_sessions(range, &sessions, now))
    }

    /// Drops sessions that started more than `days` before `now`. Returns how
    /// many were removed.
    pub fn prune_older_than(&self, days: i64, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::days(days);
        let mut guard = self.write();
        let before = guard.len();
        guard.retain(|session| session.started_at >= cutoff);
        let removed = before - guard.len();
        if removed > 0 {
            self.persist(&guard)?;
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<()> {
        let mut guard = self.write();
        guard.clear();
        self.persist(&guard)
    }

    fn persist(&self, sessions: &[SessionRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(sessions)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write sessions to {}", self.path.display()))
    }
}

impl SessionStore for JsonSessionStore {
    fn save(&self, record: SessionRecord) -> Result<()> {
        let mut guard = self.write();
        guard.push(record);
        self.persist(&guard)
    }

    fn load(&self, range: TimeRange) -> Result<Vec<SessionRecord>> {
        let mut sessions: Vec<SessionRecord> = self
            .read()
            .iter()
            .filter(|session| range.contains(session.started_at))
            .cloned()
            .collect();
        sessions.sort_by_key(|session| session.started_at);
        Ok(sessions)
    }
}
