//! Vote processing — article ratings folded into per-politician agreement
//! history.

use tracing::debug;

use crate::adaptive::{bounded_delta, COMPAT_SPACE};
use crate::compat::ideology_match;
use crate::error::EngineError;
use crate::profile::{PolicyAgreementRecord, Stance};
use crate::store::{SqliteProfileStore, StoreError};

/// Fallback compatibility score when a pair has no ranking and no profiles
/// to compute one from.
const NEUTRAL_SCORE: f64 = 50.0;

/// Classify a 1–5 article rating as a stance.
pub fn user_stance(rating: u8) -> Stance {
    match rating {
        0..=2 => Stance::Oppose,
        3 => Stance::Neutral,
        _ => Stance::Support,
    }
}

/// Result of comparing one vote against one politician's stance.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    pub user_id: String,
    pub article_id: String,
    pub politician_id: String,
    pub agreed: bool,
    /// The compatibility delta actually applied, after bounding.
    pub bounded_delta: f64,
    pub record: PolicyAgreementRecord,
}

pub struct VoteProcessor {
    store: SqliteProfileStore,
}

impl VoteProcessor {
    pub fn new(store: SqliteProfileStore) -> Self {
        Self { store }
    }

    /// Compare a user's article rating against every politician with a
    /// recorded stance on the article, updating each pair's agreement
    /// history. Articles nobody took a stance on produce no outcomes.
    ///
    /// Unlike the ranking read path, agreement history is authoritative
    /// state, so storage failures here propagate instead of degrading.
    pub async fn record_vote(
        &self,
        user_id: &str,
        article_id: &str,
        rating: u8,
    ) -> Result<Vec<VoteOutcome>, EngineError> {
        if !(1..=5).contains(&rating) {
            return Err(EngineError::InvalidRating(rating));
        }
        let stance = user_stance(rating);
        let article_stances = self.store.stances_for_article(article_id).await?;

        let mut outcomes = Vec::with_capacity(article_stances.len());
        for article_stance in article_stances {
            // Neutral on either side reads as non-opposition.
            let agreed = article_stance.stance == stance
                || article_stance.stance == Stance::Neutral
                || stance == Stance::Neutral;
            let base = if article_stance.strength >= 4 { 3.0 } else { 2.0 };
            let raw = if agreed { base } else { -base };

            let mut record = self
                .store
                .get_agreement(user_id, &article_stance.politician_id)
                .await?
                .unwrap_or_else(|| {
                    PolicyAgreementRecord::zero(user_id, &article_stance.politician_id)
                });
            let current = self
                .current_score(user_id, &article_stance.politician_id, &record)
                .await?;

            let delta = bounded_delta(raw, record.total_compared as f64, current, &COMPAT_SPACE);
            record.record(agreed, delta);
            self.store.put_agreement(&record).await?;

            debug!(
                user_id,
                article_id,
                politician_id = %article_stance.politician_id,
                agreed,
                delta,
                "vote recorded"
            );
            outcomes.push(VoteOutcome {
                user_id: user_id.to_string(),
                article_id: article_id.to_string(),
                politician_id: article_stance.politician_id,
                agreed,
                bounded_delta: delta,
                record,
            });
        }
        Ok(outcomes)
    }

    /// Current overall compatibility for the pair: the persisted ranking
    /// entry when one exists, else computed fresh from the two profiles,
    /// else the scale midpoint.
    async fn current_score(
        &self,
        user_id: &str,
        politician_id: &str,
        record: &PolicyAgreementRecord,
    ) -> Result<f64, StoreError> {
        if let Some(entry) = self.store.get_ranking(user_id, politician_id).await? {
            return Ok(entry.overall_compatibility);
        }
        let user = self.store.get_user(user_id).await?;
        let politician = self.store.get_politician(politician_id).await?;
        if let (Some(user), Some(politician)) = (user, politician) {
            let matched = ideology_match(
                &user.vector,
                user.total_weight,
                &politician.vector,
                politician.total_weight,
            );
            return Ok((matched + record.cumulative_policy_delta).clamp(0.0, 100.0));
        }
        Ok(NEUTRAL_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_classify_into_stances() {
        assert_eq!(user_stance(1), Stance::Oppose);
        assert_eq!(user_stance(2), Stance::Oppose);
        assert_eq!(user_stance(3), Stance::Neutral);
        assert_eq!(user_stance(4), Stance::Support);
        assert_eq!(user_stance(5), Stance::Support);
    }
}
