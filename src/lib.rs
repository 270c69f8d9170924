#![forbid(unsafe_code)]

//! # polimatch
//!
//! Ideology tracking and personalized politician compatibility.
//!
//! Every tracked politician, party, and user holds a position in an
//! 8-dimensional ideological space. Politician positions move incrementally
//! as structured evidence events arrive — time-decayed, diminishing with
//! accumulated evidence, and resistant near the extremes, so profiles
//! converge instead of oscillating. Users get a two-stage compatibility
//! ranking: ideological distance sets the baseline, and their article votes
//! nudge per-politician scores up or down through the same adaptive kernel.
//!
//! [`MatchEngine`] is the entry point; everything persists in SQLite.

pub mod adaptive;
pub mod cache;
pub mod compat;
pub mod engine;
pub mod error;
pub mod party;
pub mod profile;
pub mod questionnaire;
pub mod store;
pub mod update;
pub mod vector;
pub mod votes;

pub use cache::{Clock, RosterCache, RosterSnapshot, RosterSource, SystemClock};
pub use engine::{EngineConfig, MatchEngine};
pub use error::EngineError;
pub use profile::{
    Affiliation, ArticleStance, EvidenceEvent, EvidenceRecord, PartyMatch, PartyProfile,
    PersonalRankingEntry, PoliticianProfile, PolicyAgreementRecord, SourceType, Stance,
    UserProfile,
};
pub use questionnaire::{EnhancedAnswers, LegacyAnswers};
pub use store::{SqliteProfileStore, StoreError};
pub use update::AppliedUpdate;
pub use vector::{Dimension, IdeologyDelta, IdeologyVector};
pub use votes::VoteOutcome;
