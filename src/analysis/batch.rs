//! Batch value-bet analysis with a per-user quota.
//!
//! One batch call: authenticate, read (or bootstrap) the caller's profile,
//! check the quota, extract matches, analyze all of them concurrently, then
//! charge one unit for the whole batch and commit. Any failure before the
//! commit leaves the profile untouched. A batch with no extractable match,
//! blank text included, is not charged. A charge that races another writer
//! is retried against the fresh profile, quota check included.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::analysis::extractor::MatchExtractor;
use crate::analysis::single_match::{MatchAnalysis, SingleMatchAnalyzer};
use crate::auth::Session;
use crate::config::QuotaConfig;
use crate::error::{AnalysisError, Result};
use crate::llm::prompts;
use crate::store::{ProfileStore, ProfileTransaction, UserProfile};

/// Commit attempts for the charge before giving up with a conflict.
const CHARGE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub analyzed_matches: Vec<MatchAnalysis>,
}

pub struct BatchOrchestrator {
    extractor: MatchExtractor,
    analyzer: SingleMatchAnalyzer,
    profiles: Arc<dyn ProfileStore>,
    quota: QuotaConfig,
}

impl BatchOrchestrator {
    pub fn new(
        extractor: MatchExtractor,
        analyzer: SingleMatchAnalyzer,
        profiles: Arc<dyn ProfileStore>,
        quota: QuotaConfig,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            profiles,
            quota,
        }
    }

    #[instrument(skip(self, session, matches_text), fields(text_len = matches_text.len()))]
    pub async fn calculate_batch_value_bets(
        &self,
        session: &dyn Session,
        matches_text: &str,
        sport_key: Option<&str>,
    ) -> Result<BatchResult> {
        let uid = session.user_id().ok_or(AnalysisError::Auth)?;
        prompts::ensure_within_limit("match text", matches_text, prompts::MAX_BATCH_CHARS)?;

        let mut tx = ProfileTransaction::begin(self.profiles.as_ref(), &uid);
        let profile = self.read_or_bootstrap(&mut tx, session).await?;
        check_quota(&profile)?;

        let matches = if matches_text.trim().is_empty() {
            Vec::new()
        } else {
            self.extractor.extract(matches_text).await?
        };
        if matches.is_empty() {
            info!(uid = %uid, "No matches extracted, batch not charged");
            // Losing the bootstrap race is fine: the profile exists either way
            if !tx.commit().await? {
                debug!(uid = %uid, "Profile bootstrapped concurrently");
            }
            return Ok(BatchResult {
                analyzed_matches: Vec::new(),
            });
        }

        // Results come back in submission order; the first failure fails the batch
        let analyzed_matches = try_join_all(
            matches
                .iter()
                .map(|description| self.analyzer.analyze(description, sport_key)),
        )
        .await?;

        let profile = self.charge(tx, session).await?;

        info!(
            uid = %uid,
            matches = analyzed_matches.len(),
            value_bets = analyzed_matches.iter().filter(|m| m.value_bet_found).count(),
            analysis_count = profile.analysis_count,
            "Batch analysis complete"
        );

        Ok(BatchResult { analyzed_matches })
    }

    async fn read_or_bootstrap(
        &self,
        tx: &mut ProfileTransaction<'_>,
        session: &dyn Session,
    ) -> Result<UserProfile> {
        if let Some(profile) = tx.get().await? {
            return Ok(profile);
        }
        info!(uid = %tx.uid(), "Bootstrapping default profile");
        let profile = UserProfile::new_default(
            tx.uid(),
            session.email().as_deref(),
            self.quota.default_analysis_limit,
        );
        tx.set(profile.clone());
        Ok(profile)
    }

    /// Add one unit to the caller's count and commit. When another writer
    /// got there first, re-read the profile, re-check the quota and retry.
    async fn charge(
        &self,
        tx: ProfileTransaction<'_>,
        session: &dyn Session,
    ) -> Result<UserProfile> {
        let uid = tx.uid().to_string();
        let mut first = Some(tx);
        for attempt in 1..=CHARGE_ATTEMPTS {
            let mut tx = first
                .take()
                .unwrap_or_else(|| ProfileTransaction::begin(self.profiles.as_ref(), &uid));
            let mut profile = self.read_or_bootstrap(&mut tx, session).await?;
            check_quota(&profile)?;
            if !profile.is_premium {
                profile.analysis_count += 1;
                tx.set(profile.clone());
            }
            if tx.commit().await? {
                return Ok(profile);
            }
            warn!(uid = %uid, attempt, "Profile changed during batch, retrying charge");
        }
        Err(AnalysisError::Conflict { uid })
    }
}

fn check_quota(profile: &UserProfile) -> Result<()> {
    if profile.quota_exhausted() {
        warn!(
            uid = %profile.uid,
            count = profile.analysis_count,
            limit = profile.analysis_limit,
            "Analysis quota exceeded"
        );
        return Err(AnalysisError::QuotaExceeded {
            limit: profile.analysis_limit,
        });
    }
    Ok(())
}
