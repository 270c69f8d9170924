//! Compatibility engine — user↔politician and user↔party ranking.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::warn;

use crate::cache::RosterCache;
use crate::profile::{PartyMatch, PersonalRankingEntry, UserProfile};
use crate::questionnaire::UserProfileBuilder;
use crate::store::{SqliteProfileStore, StoreError};
use crate::vector::IdeologyVector;

/// Maximum possible mean absolute per-dimension distance.
const MAX_AVG_DISTANCE: f64 = 20.0;

/// Ideology match score in [0, 100], rounded to a whole number.
///
/// Distance maps linearly onto [0, 100], then a confidence multiplier damps
/// the score toward 80% of its raw value when either profile is thin: two
/// profiles that happen to coincide but have little evidence behind them
/// should not read as a perfect match.
pub fn ideology_match(
    user_vector: &IdeologyVector,
    user_weight: f64,
    politician_vector: &IdeologyVector,
    politician_weight: f64,
) -> f64 {
    let avg = user_vector.avg_abs_diff(politician_vector);
    let raw = 100.0 - (avg / MAX_AVG_DISTANCE * 100.0).min(100.0);
    let combined = (user_weight.max(0.0) * politician_weight.max(0.0) + 1.0).log10();
    let confidence = (combined / 2.0).min(1.0);
    (raw * (0.8 + 0.2 * confidence)).clamp(0.0, 100.0).round()
}

pub struct CompatibilityEngine {
    store: SqliteProfileStore,
    cache: Arc<RosterCache>,
    builder: UserProfileBuilder,
}

impl CompatibilityEngine {
    pub fn new(store: SqliteProfileStore, cache: Arc<RosterCache>) -> Self {
        let builder = UserProfileBuilder::new(store.clone());
        Self {
            store,
            cache,
            builder,
        }
    }

    /// Recompute a user's full politician ranking.
    ///
    /// A serving path: storage trouble on the read side degrades to an empty
    /// ranking with a warning rather than an error, and a failed persist of
    /// the recomputed ranking still returns the computed entries.
    pub async fn rank(&self, user_id: &str) -> Vec<PersonalRankingEntry> {
        let user = match self.load_or_build_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(user_id, error = %e, "user profile unavailable, empty ranking");
                return Vec::new();
            }
        };
        let roster = match self.cache.snapshot().await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(user_id, error = %e, "roster unavailable, empty ranking");
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(roster.len());
        for politician in roster.values() {
            let matched = ideology_match(
                &user.vector,
                user.total_weight,
                &politician.vector,
                politician.total_weight,
            );
            let (rate, policy_delta) =
                match self.store.get_agreement(user_id, &politician.id).await {
                    Ok(Some(rec)) => (rec.agreement_rate, rec.cumulative_policy_delta),
                    Ok(None) => (0.0, 0.0),
                    Err(e) => {
                        warn!(
                            user_id,
                            politician_id = %politician.id,
                            error = %e,
                            "agreement record unavailable, treating as none"
                        );
                        (0.0, 0.0)
                    }
                };
            entries.push(PersonalRankingEntry {
                user_id: user_id.to_string(),
                politician_id: politician.id.clone(),
                ideology_match: matched,
                policy_agreement: rate,
                overall_compatibility: (matched + policy_delta).clamp(0.0, 100.0),
                personal_rank: 0,
            });
        }

        entries.sort_by(|a, b| {
            b.overall_compatibility
                .partial_cmp(&a.overall_compatibility)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.politician_id.cmp(&b.politician_id))
        });
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.personal_rank = (i + 1) as u32;
        }

        if let Err(e) = self.store.upsert_rankings(user_id, &entries).await {
            warn!(user_id, error = %e, "ranking persist failed, returning computed entries");
        }
        entries
    }

    /// Party-level compatibility, best match first, truncated to `limit`.
    pub async fn party_matches(&self, user_id: &str, limit: usize) -> Vec<PartyMatch> {
        let user = match self.load_or_build_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(user_id, error = %e, "user profile unavailable, empty party matches");
                return Vec::new();
            }
        };
        let parties = match self.store.list_parties().await {
            Ok(parties) => parties,
            Err(e) => {
                warn!(user_id, error = %e, "parties unavailable, empty party matches");
                return Vec::new();
            }
        };

        let mut matches: Vec<PartyMatch> = parties
            .into_iter()
            .map(|party| PartyMatch {
                match_score: ideology_match(
                    &user.vector,
                    user.total_weight,
                    &party.vector,
                    party.total_weight,
                ),
                vector: party.vector,
                party: party.name,
            })
            .collect();
        matches.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.party.cmp(&b.party))
        });
        matches.truncate(limit);
        matches
    }

    async fn load_or_build_user(
        &self,
        user_id: &str,
    ) -> Result<Option<UserProfile>, StoreError> {
        if let Some(user) = self.store.get_user(user_id).await? {
            return Ok(Some(user));
        }
        self.builder.build(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_mature_profiles_score_one_hundred() {
        let v = IdeologyVector {
            economic: 3.0,
            welfare: -4.0,
            ..IdeologyVector::ZERO
        };
        // 16 × 50 = 800 accumulated weight product: log10(801)/2 > 1, so the
        // confidence multiplier saturates at 1.
        assert_eq!(ideology_match(&v, 16.0, &v, 50.0), 100.0);
    }

    #[test]
    fn thin_profiles_are_damped_to_eighty_percent() {
        let v = IdeologyVector::ZERO;
        // Zero combined weight: log10(1) = 0, multiplier floor of 0.8.
        assert_eq!(ideology_match(&v, 0.0, &v, 0.0), 80.0);
    }

    #[test]
    fn maximal_opposition_scores_zero() {
        let lo = IdeologyVector::from_array([-10.0; 8]);
        let hi = IdeologyVector::from_array([10.0; 8]);
        assert_eq!(ideology_match(&lo, 16.0, &hi, 50.0), 0.0);
    }

    #[test]
    fn closer_politician_scores_higher() {
        let user = IdeologyVector {
            economic: 5.0,
            ..IdeologyVector::ZERO
        };
        let near = IdeologyVector {
            economic: 4.0,
            ..IdeologyVector::ZERO
        };
        let far = IdeologyVector {
            economic: -5.0,
            ..IdeologyVector::ZERO
        };
        assert!(
            ideology_match(&user, 16.0, &near, 20.0) > ideology_match(&user, 16.0, &far, 20.0)
        );
    }
}
