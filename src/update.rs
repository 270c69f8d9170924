//! Profile update engine — folds evidence events into politician vectors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::adaptive::{bounded_delta, time_decay, VECTOR_SPACE};
use crate::cache::{Clock, RosterCache};
use crate::error::EngineError;
use crate::party::PartyAggregator;
use crate::profile::{Affiliation, EvidenceEvent, PoliticianProfile};
use crate::store::{SqliteProfileStore, StoreError};
use crate::vector::{clamp_axis, IdeologyDelta, IdeologyVector};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Outcome of one `apply` call.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    pub politician_id: String,
    pub evidence_id: i64,
    pub effective_weight: f64,
    pub time_decay: f64,
    /// Per-dimension deltas actually applied, after bounding and clamping.
    pub applied: IdeologyDelta,
    pub vector: IdeologyVector,
    pub total_weight: f64,
    /// True when the event was journaled but moved nothing (zero effective
    /// weight).
    pub skipped: bool,
}

pub struct ProfileUpdateEngine {
    store: SqliteProfileStore,
    cache: Arc<RosterCache>,
    aggregator: PartyAggregator,
    clock: Arc<dyn Clock>,
    half_life_days: f64,
    decay_floor: f64,
}

impl ProfileUpdateEngine {
    pub fn new(
        store: SqliteProfileStore,
        cache: Arc<RosterCache>,
        clock: Arc<dyn Clock>,
        half_life_days: f64,
        decay_floor: f64,
    ) -> Self {
        let aggregator = PartyAggregator::new(store.clone());
        Self {
            store,
            cache,
            aggregator,
            clock,
            half_life_days,
            decay_floor,
        }
    }

    /// Fold one evidence event into a politician's profile.
    ///
    /// The raw delta is validated before anything is touched; a malformed
    /// event is rejected whole, never partially applied. Zero-effective-weight
    /// events are journaled for audit but do not move the profile. The
    /// profile write and evidence append commit as one transaction, then the
    /// party aggregate is recomputed and the cache entry invalidated.
    ///
    /// Delivery is at-most-once from this engine's point of view: callers
    /// that retry a failed apply after the commit raced will double-count.
    pub async fn apply(
        &self,
        politician_id: &str,
        event: &EvidenceEvent,
    ) -> Result<AppliedUpdate, EngineError> {
        event.raw_delta.validate()?;

        let mut profile = self.ensure_politician(politician_id, None, None).await?;
        let effective_weight = event.effective_weight();

        if effective_weight <= 0.0 {
            let evidence_id = self
                .store
                .log_evidence(politician_id, event, effective_weight)
                .await?;
            debug!(politician_id, evidence_id, "evidence journaled with zero weight");
            return Ok(AppliedUpdate {
                politician_id: politician_id.to_string(),
                evidence_id,
                effective_weight,
                time_decay: 1.0,
                applied: IdeologyDelta::default(),
                vector: profile.vector,
                total_weight: profile.total_weight,
                skipped: true,
            });
        }

        let decay = self.decay_for(event.source_date);
        let mut applied = IdeologyDelta::default();
        for (dim, raw) in event.raw_delta.iter() {
            if raw == 0.0 {
                continue;
            }
            let current = profile.vector.get(dim);
            let adjusted = bounded_delta(
                raw * effective_weight * decay,
                profile.total_weight,
                current,
                &VECTOR_SPACE,
            );
            profile.vector.set(dim, clamp_axis(current + adjusted));
            applied.set(dim, adjusted);
        }
        profile.total_weight += effective_weight;

        let evidence_id = self
            .store
            .apply_politician_update(&profile, event, effective_weight)
            .await?;

        if let Affiliation::Affiliated(party) = &profile.affiliation {
            self.aggregator.recompute(party).await?;
        }
        self.cache.invalidate(politician_id);

        debug!(
            politician_id,
            evidence_id,
            effective_weight,
            decay,
            total_weight = profile.total_weight,
            "evidence applied"
        );
        Ok(AppliedUpdate {
            politician_id: politician_id.to_string(),
            evidence_id,
            effective_weight,
            time_decay: decay,
            applied,
            vector: profile.vector,
            total_weight: profile.total_weight,
            skipped: false,
        })
    }

    /// Fetch a politician, lazily seeding a profile on first contact.
    ///
    /// An affiliated politician starts at the party's current aggregate;
    /// everyone else starts at the zero vector. The affiliation tag is fixed
    /// here and never re-derived afterwards.
    pub async fn ensure_politician(
        &self,
        politician_id: &str,
        party: Option<&str>,
        constituency: Option<&str>,
    ) -> Result<PoliticianProfile, StoreError> {
        if let Some(existing) = self.store.get_politician(politician_id).await? {
            return Ok(existing);
        }

        let affiliation = Affiliation::from_party(party);
        let baseline = match affiliation.party() {
            Some(p) => self
                .store
                .get_party(p)
                .await?
                .map(|party| party.vector)
                .unwrap_or(IdeologyVector::ZERO),
            None => IdeologyVector::ZERO,
        };
        let profile = PoliticianProfile::seeded(
            politician_id,
            affiliation,
            constituency.map(str::to_string),
            baseline,
        );
        self.store.put_politician(&profile).await?;
        self.cache.invalidate(politician_id);
        debug!(politician_id, "politician profile seeded");
        Ok(profile)
    }

    fn decay_for(&self, source_date: Option<DateTime<Utc>>) -> f64 {
        match source_date {
            Some(date) => {
                let days = (self.clock.now() - date).num_seconds() as f64 / SECONDS_PER_DAY;
                time_decay(days, self.half_life_days, self.decay_floor)
            }
            None => 1.0,
        }
    }
}
