//! Party aggregation — parties as evidence-weighted means of their members.

use tracing::debug;

use crate::profile::PartyProfile;
use crate::store::{SqliteProfileStore, StoreError};
use crate::vector::{Dimension, IdeologyVector};

/// Floor applied to each member's weight so freshly-seeded members still
/// contribute to the party position.
const MIN_MEMBER_WEIGHT: f64 = 1.0;

pub struct PartyAggregator {
    store: SqliteProfileStore,
}

impl PartyAggregator {
    pub fn new(store: SqliteProfileStore) -> Self {
        Self { store }
    }

    /// Recompute a party's aggregate from scratch and persist it.
    ///
    /// Weighted mean per dimension with `weight = max(total_weight, 1)`;
    /// a party with no members sits at the zero vector with weight 0.
    pub async fn recompute(&self, party: &str) -> Result<PartyProfile, StoreError> {
        let members = self.store.list_party_members(party).await?;

        let mut vector = IdeologyVector::ZERO;
        let mut weight_sum = 0.0;
        if !members.is_empty() {
            for member in &members {
                weight_sum += member.total_weight.max(MIN_MEMBER_WEIGHT);
            }
            for dim in Dimension::ALL {
                let total: f64 = members
                    .iter()
                    .map(|m| m.vector.get(dim) * m.total_weight.max(MIN_MEMBER_WEIGHT))
                    .sum();
                vector.set(dim, total / weight_sum);
            }
        }

        let profile = PartyProfile {
            name: party.to_string(),
            vector,
            total_weight: weight_sum,
        };
        self.store.put_party(&profile).await?;
        debug!(party, members = members.len(), weight = weight_sum, "party aggregate recomputed");
        Ok(profile)
    }
}
