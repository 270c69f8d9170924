//! Top-level error taxonomy.

use thiserror::Error;

use crate::questionnaire::QuestionnaireError;
use crate::store::StoreError;
use crate::vector::VectorError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("invalid evidence: {0}")]
    InvalidEvidence(#[from] VectorError),
    #[error("invalid answer: {0}")]
    InvalidAnswer(#[from] QuestionnaireError),
    #[error("vote rating {0} outside 1..=5")]
    InvalidRating(u8),
}

impl EngineError {
    /// Storage failures are transient; everything else is a caller bug and
    /// retrying the same input will fail the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
