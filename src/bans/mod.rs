//! Ban store
//!
//! Relation of (username, course) → banned. The engine reads it at most once
//! and writes it at most once per request; writes are idempotent upserts, so
//! concurrent requests racing to ban the same user are harmless.

use crate::error::BanResult;
use crate::gate::keys::CourseKey;
// async_trait required for dyn-compatibility with Arc<dyn BanStore>
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Persistence of user bans
#[async_trait]
pub trait BanStore: Send + Sync {
    /// Whether the user is banned from the course
    async fn is_banned(&self, username: &str, course: &CourseKey) -> BanResult<bool>;

    /// Ban the user from the course.
    ///
    /// Must be a single atomic upsert; banning twice is a no-op.
    async fn ban(&self, username: &str, course: &CourseKey, reason: &str) -> BanResult<()>;
}

/// One stored ban
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BanRecord {
    pub username: String,
    pub course: String,
    pub reason: String,
    /// Seconds since the Unix epoch
    pub created_at: u64,
}

type BanKey = (String, String);

/// Process-local ban store
#[derive(Default)]
pub struct InMemoryBanStore {
    records: RwLock<HashMap<BanKey, BanRecord>>,
}

impl InMemoryBanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(username: &str, course: &CourseKey) -> BanKey {
        (username.to_string(), course.to_string())
    }

    // Poisoned locks are recovered: a panic elsewhere must not unban everyone

    fn read_records(&self) -> RwLockReadGuard<'_, HashMap<BanKey, BanRecord>> {
        self.records.read().unwrap_or_else(|poisoned| {
            tracing::warn!("ban store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_records(&self) -> RwLockWriteGuard<'_, HashMap<BanKey, BanRecord>> {
        self.records.write().unwrap_or_else(|poisoned| {
            tracing::warn!("ban store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Lift a ban; returns whether one existed
    pub fn unban(&self, username: &str, course: &CourseKey) -> bool {
        let removed = self
            .write_records()
            .remove(&Self::key(username, course))
            .is_some();
        if removed {
            info!(user = username, course = %course, "User unbanned");
        }
        removed
    }

    /// Stored ban for the pair, if any
    pub fn record(&self, username: &str, course: &CourseKey) -> Option<BanRecord> {
        self.read_records()
            .get(&Self::key(username, course))
            .cloned()
    }

    /// All bans for a course, sorted by username
    pub fn list_banned(&self, course: &CourseKey) -> Vec<BanRecord> {
        let course = course.to_string();
        let mut records: Vec<_> = self
            .read_records()
            .values()
            .filter(|r| r.course == course)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.username.cmp(&b.username));
        records
    }

    pub fn len(&self) -> usize {
        self.read_records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_records().is_empty()
    }
}

#[async_trait]
impl BanStore for InMemoryBanStore {
    async fn is_banned(&self, username: &str, course: &CourseKey) -> BanResult<bool> {
        Ok(self
            .read_records()
            .contains_key(&Self::key(username, course)))
    }

    async fn ban(&self, username: &str, course: &CourseKey, reason: &str) -> BanResult<()> {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut records = self.write_records();
        let key = Self::key(username, course);
        if records.contains_key(&key) {
            debug!(user = username, course = %course, "User already banned");
            return Ok(());
        }
        records.insert(
            key,
            BanRecord {
                username: username.to_string(),
                course: course.to_string(),
                reason: reason.to_string(),
                created_at,
            },
        );
        Ok(())
    }
}
