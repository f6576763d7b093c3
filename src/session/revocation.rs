//! Per-subject revocation bookkeeping.
//!
//! Revoking a subject records a "valid after" instant: every credential issued
//! at or before it is dead, later ones are unaffected.

use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use tokio::sync::RwLock;

const SHARD_COUNT: usize = 16;

#[derive(Debug, Error)]
#[error("revocation store unavailable: {0}")]
pub struct RevocationError(pub String);

#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Invalidate every credential for `subject` issued at or before `at_millis`.
    async fn revoke(&self, subject: &str, at_millis: i64) -> Result<(), RevocationError>;

    /// Latest revocation instant for `subject`, if any.
    async fn valid_after(&self, subject: &str) -> Result<Option<i64>, RevocationError>;
}

/// In-process store. Subjects are spread over independent shards so requests
/// for different subjects do not contend on one lock.
#[derive(Debug)]
pub struct MemoryRevocationStore {
    shards: Vec<RwLock<HashMap<String, i64>>>,
}

impl MemoryRevocationStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
        }
    }

    fn shard(&self, subject: &str) -> &RwLock<HashMap<String, i64>> {
        let mut hasher = DefaultHasher::new();
        subject.hash(&mut hasher);
        let index = usize::try_from(hasher.finish() % SHARD_COUNT as u64).unwrap_or(0);
        &self.shards[index]
    }
}

impl Default for MemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, subject: &str, at_millis: i64) -> Result<(), RevocationError> {
        let mut shard = self.shard(subject).write().await;
        let entry = shard.entry(subject.to_string()).or_insert(at_millis);
        // Never move the boundary backwards.
        *entry = (*entry).max(at_millis);
        Ok(())
    }

    async fn valid_after(&self, subject: &str) -> Result<Option<i64>, RevocationError> {
        Ok(self.shard(subject).read().await.get(subject).copied())
    }
}
