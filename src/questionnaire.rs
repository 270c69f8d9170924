//! Questionnaire answer shapes and the user profile builder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::profile::UserProfile;
use crate::store::{SqliteProfileStore, StoreError};
use crate::vector::{clamp_axis, IdeologyVector};

/// Evidence weight assigned to a legacy questionnaire profile.
pub const LEGACY_TOTAL_WEIGHT: f64 = 8.0;
/// Evidence weight assigned to an enhanced questionnaire profile.
pub const ENHANCED_TOTAL_WEIGHT: f64 = 16.0;

#[derive(Debug, Error)]
pub enum QuestionnaireError {
    #[error("answer '{question}' is {value}, outside 1..=5")]
    OutOfScale { question: &'static str, value: u8 },
}

/// The original 8-question quiz, each answered on a 1–5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyAnswers {
    pub immigration: u8,
    pub healthcare: u8,
    pub housing: u8,
    pub economy: u8,
    pub environment: u8,
    pub social_issues: u8,
    pub justice: u8,
    pub education: u8,
}

impl LegacyAnswers {
    fn fields(&self) -> [(&'static str, u8); 8] {
        [
            ("immigration", self.immigration),
            ("healthcare", self.healthcare),
            ("housing", self.housing),
            ("economy", self.economy),
            ("environment", self.environment),
            ("social_issues", self.social_issues),
            ("justice", self.justice),
            ("education", self.education),
        ]
    }

    /// Every answer must be on the 1–5 scale. Checked before any persist.
    pub fn validate(&self) -> Result<(), QuestionnaireError> {
        for (question, value) in self.fields() {
            if !(1..=5).contains(&value) {
                return Err(QuestionnaireError::OutOfScale { question, value });
            }
        }
        Ok(())
    }

    /// Map the eight question answers onto the eight ideology axes.
    ///
    /// The quiz predates the axis model, so the mapping is uneven: two
    /// questions average into one axis and one question feeds two.
    pub fn to_vector(&self) -> IdeologyVector {
        let welfare = (scale_answer(self.healthcare) + scale_answer(self.housing)) / 2.0;
        let social = scale_answer(self.social_issues);
        IdeologyVector {
            economic: scale_answer(self.economy),
            social,
            cultural: social,
            globalism: scale_answer(self.immigration),
            environmental: scale_answer(self.environment),
            authority: scale_answer(self.justice),
            welfare,
            technocratic: scale_answer(self.education),
        }
    }
}

/// The revised quiz: a direct per-axis placement in [-10, +10].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhancedAnswers {
    pub values: IdeologyVector,
}

impl EnhancedAnswers {
    /// Per-axis values pass through 1:1, clamped to the axis range.
    pub fn to_vector(&self) -> IdeologyVector {
        self.values.clamped()
    }
}

/// Map a 1–5 answer onto [-10, +10]: 3 is neutral, 1 and 5 are the poles.
fn scale_answer(answer: u8) -> f64 {
    clamp_axis((answer as f64 - 3.0) / 2.0 * 10.0)
}

/// Builds (and persists) a user's ideology profile from their stored
/// questionnaire answers. Enhanced answers win when both exist.
pub struct UserProfileBuilder {
    store: SqliteProfileStore,
}

impl UserProfileBuilder {
    pub fn new(store: SqliteProfileStore) -> Self {
        Self { store }
    }

    /// Rebuild the user's profile from stored answers. Returns `None` when
    /// the user has answered neither questionnaire.
    pub async fn build(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let (vector, total_weight) =
            if let Some(enhanced) = self.store.get_enhanced_answers(user_id).await? {
                (enhanced.to_vector(), ENHANCED_TOTAL_WEIGHT)
            } else if let Some(legacy) = self.store.get_legacy_answers(user_id).await? {
                (legacy.to_vector(), LEGACY_TOTAL_WEIGHT)
            } else {
                return Ok(None);
            };
        let profile = UserProfile {
            id: user_id.to_string(),
            vector,
            total_weight,
        };
        self.store.put_user(&profile).await?;
        Ok(Some(profile))
    }
}
