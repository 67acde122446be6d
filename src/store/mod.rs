//! User profile persistence and the per-profile transaction.
//!
//! A [`ProfileTransaction`] records the version of the profile it read and
//! buffers its write; `commit` applies the write only if the stored version
//! is unchanged. Concurrent read-check-increment sequences on one profile
//! therefore never lose an update: the late committer sees its commit
//! refused and must re-read before writing again. Dropping a transaction
//! discards its write.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub is_premium: bool,
    pub analysis_count: i64,
    pub analysis_limit: i64,
}

impl UserProfile {
    /// Free-plan profile created the first time a user runs a quota-gated flow.
    pub fn new_default(uid: &str, email: Option<&str>, analysis_limit: i64) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.unwrap_or_default().to_string(),
            is_premium: false,
            analysis_count: 0,
            analysis_limit,
        }
    }

    pub fn quota_exhausted(&self) -> bool {
        !self.is_premium && self.analysis_count >= self.analysis_limit
    }
}

/// A stored profile with its optimistic-concurrency version.
#[derive(Debug, Clone)]
pub struct VersionedProfile {
    pub profile: UserProfile,
    pub version: i64,
}

/// Keyed profile documents with compare-and-swap writes.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, uid: &str) -> Result<Option<VersionedProfile>>;

    /// Write `profile` only if the stored version still equals `expected`
    /// (`None` meaning no profile exists yet). Returns whether it was written.
    async fn compare_and_swap(&self, expected: Option<i64>, profile: &UserProfile)
        -> Result<bool>;
}

pub struct ProfileTransaction<'a> {
    store: &'a dyn ProfileStore,
    uid: String,
    /// Version observed by the first read; outer None until something was read.
    observed: Option<Option<i64>>,
    current: Option<UserProfile>,
    pending: Option<UserProfile>,
}

impl<'a> ProfileTransaction<'a> {
    pub fn begin(store: &'a dyn ProfileStore, uid: &str) -> Self {
        Self {
            store,
            uid: uid.to_string(),
            observed: None,
            current: None,
            pending: None,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Read the profile. Sees this transaction's own pending write.
    pub async fn get(&mut self) -> Result<Option<UserProfile>> {
        if let Some(pending) = &self.pending {
            return Ok(Some(pending.clone()));
        }
        if self.observed.is_none() {
            let loaded = self.store.load(&self.uid).await?;
            self.observed = Some(loaded.as_ref().map(|v| v.version));
            self.current = loaded.map(|v| v.profile);
        }
        Ok(self.current.clone())
    }

    pub fn set(&mut self, profile: UserProfile) {
        self.pending = Some(profile);
    }

    /// Apply the pending write. Returns `false`, writing nothing, when the
    /// profile changed since this transaction first read it.
    pub async fn commit(mut self) -> Result<bool> {
        let Some(profile) = self.pending.take() else {
            return Ok(true);
        };
        if self.observed.is_none() {
            let loaded = self.store.load(&self.uid).await?;
            self.observed = Some(loaded.map(|v| v.version));
        }
        let expected = self.observed.flatten();
        let written = self.store.compare_and_swap(expected, &profile).await?;
        if !written {
            tracing::debug!(uid = %self.uid, ?expected, "Profile changed since it was read");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryProfileStore;

    #[test]
    fn test_default_profile() {
        let profile = UserProfile::new_default("u1", None, 10);
        assert!(!profile.is_premium);
        assert_eq!(profile.analysis_count, 0);
        assert_eq!(profile.analysis_limit, 10);
        assert_eq!(profile.email, "");
    }

    #[test]
    fn test_quota_exhausted() {
        let mut profile = UserProfile::new_default("u1", Some("a@b.c"), 2);
        assert!(!profile.quota_exhausted());
        profile.analysis_count = 2;
        assert!(profile.quota_exhausted());
        profile.is_premium = true;
        assert!(!profile.quota_exhausted());
    }

    #[tokio::test]
    async fn test_read_your_writes_then_commit() {
        let store = MemoryProfileStore::new();
        let mut tx = ProfileTransaction::begin(&store, "u1");
        assert!(tx.get().await.unwrap().is_none());
        tx.set(UserProfile::new_default("u1", None, 10));
        assert_eq!(tx.get().await.unwrap().unwrap().analysis_limit, 10);
        assert!(tx.commit().await.unwrap());

        assert!(store.load("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_drop_discards_write() {
        let store = MemoryProfileStore::new();
        {
            let mut tx = ProfileTransaction::begin(&store, "u1");
            tx.get().await.unwrap();
            tx.set(UserProfile::new_default("u1", None, 10));
        }
        assert!(store.load("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_increment_conflicts() {
        let store = MemoryProfileStore::new();
        store.insert(UserProfile::new_default("u1", None, 10));

        let mut a = ProfileTransaction::begin(&store, "u1");
        let mut b = ProfileTransaction::begin(&store, "u1");
        let mut pa = a.get().await.unwrap().unwrap();
        let mut pb = b.get().await.unwrap().unwrap();
        pa.analysis_count += 1;
        pb.analysis_count += 1;
        a.set(pa);
        b.set(pb);

        assert!(a.commit().await.unwrap());
        assert!(!b.commit().await.unwrap());
        assert_eq!(store.load("u1").await.unwrap().unwrap().profile.analysis_count, 1);
    }

    #[tokio::test]
    async fn test_refused_commit_writes_nothing() {
        let store = MemoryProfileStore::new();
        store.insert(UserProfile::new_default("u1", None, 10));

        let mut tx = ProfileTransaction::begin(&store, "u1");
        let mut profile = tx.get().await.unwrap().unwrap();
        profile.analysis_count = 7;
        tx.set(profile);

        let mut other = store.profile("u1").unwrap();
        other.analysis_count = 1;
        store.insert(other);

        assert!(!tx.commit().await.unwrap());
        assert_eq!(store.profile("u1").unwrap().analysis_count, 1);
        let empty = ProfileTransaction::begin(&store, "u1");
        assert!(empty.commit().await.unwrap());
    }
}
