//! In-process profile store for tests and the `--ephemeral` server mode.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::store::{ProfileStore, UserProfile, VersionedProfile};

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, VersionedProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a profile outside of any transaction.
    pub fn insert(&self, profile: UserProfile) {
        let mut profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        let version = profiles.get(&profile.uid).map_or(1, |v| v.version + 1);
        profiles.insert(profile.uid.clone(), VersionedProfile { profile, version });
    }

    pub fn profile(&self, uid: &str) -> Option<UserProfile> {
        let profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        profiles.get(uid).map(|v| v.profile.clone())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn load(&self, uid: &str) -> Result<Option<VersionedProfile>> {
        let profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        Ok(profiles.get(uid).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected: Option<i64>,
        profile: &UserProfile,
    ) -> Result<bool> {
        let mut profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        let stored = profiles.get(&profile.uid).map(|v| v.version);
        if stored != expected {
            return Ok(false);
        }
        let version = stored.map_or(1, |v| v + 1);
        profiles.insert(
            profile.uid.clone(),
            VersionedProfile {
                profile: profile.clone(),
                version,
            },
        );
        Ok(true)
    }
}
