//! The `MatchEngine` facade — wires the store, cache, and engines together
//! and exposes the public surface.

use std::sync::Arc;

use chrono::Duration;

use crate::adaptive::{DECAY_FLOOR, HALF_LIFE_DAYS};
use crate::cache::{Clock, RosterCache, SystemClock};
use crate::compat::CompatibilityEngine;
use crate::error::EngineError;
use crate::party::PartyAggregator;
use crate::profile::{
    ArticleStance, EvidenceEvent, EvidenceRecord, PartyMatch, PartyProfile,
    PersonalRankingEntry, PoliticianProfile, PolicyAgreementRecord, UserProfile,
};
use crate::questionnaire::{EnhancedAnswers, LegacyAnswers, UserProfileBuilder};
use crate::store::SqliteProfileStore;
use crate::update::{AppliedUpdate, ProfileUpdateEngine};
use crate::votes::{VoteOutcome, VoteProcessor};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Roster cache TTL. Five minutes keeps ranking passes off the store
    /// without letting a politician's public position lag noticeably behind
    /// applied evidence (updates also invalidate eagerly).
    pub cache_ttl: Duration,
    /// Evidence half-life in days. At 180, a statement from a year ago
    /// carries a quarter of a fresh one's force.
    pub half_life_days: f64,
    /// Floor on time decay. Ancient evidence never drops to zero; a
    /// politician's record does not expire, it fades.
    pub decay_floor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::seconds(300),
            half_life_days: HALF_LIFE_DAYS,
            decay_floor: DECAY_FLOOR,
        }
    }
}

/// Top-level entry point composing the store, the roster cache, and the
/// update/compatibility/vote engines.
pub struct MatchEngine {
    store: SqliteProfileStore,
    cache: Arc<RosterCache>,
    updates: ProfileUpdateEngine,
    compat: CompatibilityEngine,
    votes: VoteProcessor,
    builder: UserProfileBuilder,
    aggregator: PartyAggregator,
}

impl MatchEngine {
    pub fn new(store: SqliteProfileStore, config: EngineConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Construct with an injected clock, for tests that control time.
    pub fn with_clock(
        store: SqliteProfileStore,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(RosterCache::new(
            Arc::new(store.clone()),
            Arc::clone(&clock),
            config.cache_ttl,
        ));
        let updates = ProfileUpdateEngine::new(
            store.clone(),
            Arc::clone(&cache),
            clock,
            config.half_life_days,
            config.decay_floor,
        );
        let compat = CompatibilityEngine::new(store.clone(), Arc::clone(&cache));
        let votes = VoteProcessor::new(store.clone());
        let builder = UserProfileBuilder::new(store.clone());
        let aggregator = PartyAggregator::new(store.clone());
        Self {
            store,
            cache,
            updates,
            compat,
            votes,
            builder,
            aggregator,
        }
    }

    // -------------------------------------------------------------------------
    // Evidence and profiles
    // -------------------------------------------------------------------------

    /// Fold one evidence event into a politician's profile.
    pub async fn apply_evidence(
        &self,
        politician_id: &str,
        event: &EvidenceEvent,
    ) -> Result<AppliedUpdate, EngineError> {
        self.updates.apply(politician_id, event).await
    }

    /// Register a politician with an explicit affiliation and constituency.
    /// A no-op returning the existing profile when already registered.
    pub async fn register_politician(
        &self,
        politician_id: &str,
        party: Option<&str>,
        constituency: Option<&str>,
    ) -> Result<PoliticianProfile, EngineError> {
        Ok(self
            .updates
            .ensure_politician(politician_id, party, constituency)
            .await?)
    }

    /// A politician's profile, lazily seeded on first read.
    pub async fn profile(&self, politician_id: &str) -> Result<PoliticianProfile, EngineError> {
        Ok(self.updates.ensure_politician(politician_id, None, None).await?)
    }

    /// Audit read of the evidence log, most recent first.
    pub async fn evidence_log(
        &self,
        politician_id: &str,
        limit: usize,
    ) -> Result<Vec<EvidenceRecord>, EngineError> {
        Ok(self.store.evidence_for(politician_id, limit).await?)
    }

    /// Recompute and persist a party's aggregate position.
    pub async fn recompute_party(&self, party: &str) -> Result<PartyProfile, EngineError> {
        Ok(self.aggregator.recompute(party).await?)
    }

    // -------------------------------------------------------------------------
    // Ranking
    // -------------------------------------------------------------------------

    /// A user's full politician ranking, recomputed and persisted. Degrades
    /// to empty on storage trouble rather than failing the serving path.
    pub async fn rank(&self, user_id: &str) -> Vec<PersonalRankingEntry> {
        self.compat.rank(user_id).await
    }

    /// A user's party-level compatibility list, best match first.
    pub async fn party_matches(&self, user_id: &str, limit: usize) -> Vec<PartyMatch> {
        self.compat.party_matches(user_id, limit).await
    }

    /// The stored agreement history between a user and a politician.
    pub async fn agreement(
        &self,
        user_id: &str,
        politician_id: &str,
    ) -> Result<Option<PolicyAgreementRecord>, EngineError> {
        Ok(self.store.get_agreement(user_id, politician_id).await?)
    }

    // -------------------------------------------------------------------------
    // Votes and stances
    // -------------------------------------------------------------------------

    /// Record a politician's extracted stance on an article.
    pub async fn record_article_stance(&self, stance: &ArticleStance) -> Result<(), EngineError> {
        if !(1..=5).contains(&stance.strength) {
            return Err(EngineError::InvalidRating(stance.strength));
        }
        Ok(self.store.put_article_stance(stance).await?)
    }

    /// Record a user's article rating against every stance on the article,
    /// then recompute the user's ranking so the next read reflects the vote.
    pub async fn record_vote(
        &self,
        user_id: &str,
        article_id: &str,
        rating: u8,
    ) -> Result<Vec<VoteOutcome>, EngineError> {
        let outcomes = self.votes.record_vote(user_id, article_id, rating).await?;
        if !outcomes.is_empty() {
            self.compat.rank(user_id).await;
        }
        Ok(outcomes)
    }

    // -------------------------------------------------------------------------
    // Questionnaires
    // -------------------------------------------------------------------------

    /// Persist legacy quiz answers and rebuild the user's profile.
    pub async fn save_legacy_answers(
        &self,
        user_id: &str,
        answers: &LegacyAnswers,
    ) -> Result<UserProfile, EngineError> {
        answers.validate()?;
        self.store.save_legacy_answers(user_id, answers).await?;
        self.rebuild_user(user_id).await
    }

    /// Persist enhanced quiz answers and rebuild the user's profile.
    pub async fn save_enhanced_answers(
        &self,
        user_id: &str,
        answers: &EnhancedAnswers,
    ) -> Result<UserProfile, EngineError> {
        self.store.save_enhanced_answers(user_id, answers).await?;
        self.rebuild_user(user_id).await
    }

    /// Rebuild a user's profile from whatever answers are stored. `None`
    /// when the user has answered neither questionnaire.
    pub async fn sync_user_profile(
        &self,
        user_id: &str,
    ) -> Result<Option<UserProfile>, EngineError> {
        Ok(self.builder.build(user_id).await?)
    }

    // -------------------------------------------------------------------------
    // Cache
    // -------------------------------------------------------------------------

    pub fn roster_cache(&self) -> &Arc<RosterCache> {
        &self.cache
    }

    async fn rebuild_user(&self, user_id: &str) -> Result<UserProfile, EngineError> {
        match self.builder.build(user_id).await? {
            Some(profile) => Ok(profile),
            // Unreachable after a successful save; surface as storage trouble.
            None => Err(EngineError::Storage(crate::store::StoreError::NotFound(
                format!("answers for user {user_id}"),
            ))),
        }
    }
}
