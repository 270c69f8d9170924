//! Entity profiles and ledger record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vector::{coerce_unit_factor, IdeologyDelta, IdeologyVector};

/// Party membership, decided once at politician creation and stored.
/// Never re-derived from string matching on the party name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "party")]
pub enum Affiliation {
    Affiliated(String),
    Independent,
}

impl Affiliation {
    pub fn party(&self) -> Option<&str> {
        match self {
            Self::Affiliated(p) => Some(p),
            Self::Independent => None,
        }
    }

    pub fn from_party(party: Option<&str>) -> Self {
        match party {
            Some(p) if !p.trim().is_empty() => Self::Affiliated(p.to_string()),
            _ => Self::Independent,
        }
    }
}

/// A tracked public official. Created lazily on first evidence application
/// or first read; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoliticianProfile {
    pub id: String,
    pub affiliation: Affiliation,
    pub constituency: Option<String>,
    pub vector: IdeologyVector,
    /// Cumulative effective evidence weight — a confidence/maturity proxy.
    pub total_weight: f64,
}

impl PoliticianProfile {
    /// Seed a new profile: party baseline when affiliated, zero otherwise.
    pub fn seeded(
        id: impl Into<String>,
        affiliation: Affiliation,
        constituency: Option<String>,
        baseline: IdeologyVector,
    ) -> Self {
        Self {
            id: id.into(),
            affiliation,
            constituency,
            vector: baseline.clamped(),
            total_weight: 0.0,
        }
    }
}

/// A party's aggregate position. Fully derived — recomputed from member
/// profiles after any member update, never independently mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyProfile {
    pub name: String,
    pub vector: IdeologyVector,
    pub total_weight: f64,
}

/// An end user's position, built from questionnaire answers. Never moved by
/// evidence events; only rebuilt by re-taking a questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub vector: IdeologyVector,
    pub total_weight: f64,
}

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Article,
    Debate,
    Manual,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Debate => "debate",
            Self::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "article" => Self::Article,
            "debate" => Self::Debate,
            _ => Self::Manual,
        }
    }
}

/// One externally-extracted piece of signal proposing a small adjustment to
/// a politician's vector. `weight`, `confidence`, and `source_reliability`
/// default to 1 when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEvent {
    pub source_type: SourceType,
    pub source_id: String,
    pub policy_topic: String,
    pub raw_delta: IdeologyDelta,
    pub weight: Option<f64>,
    pub confidence: Option<f64>,
    pub source_reliability: Option<f64>,
    pub source_date: Option<DateTime<Utc>>,
}

impl EvidenceEvent {
    /// `weight × confidence × source_reliability`, each coerced into [0,1]
    /// with a default of 1 when absent.
    pub fn effective_weight(&self) -> f64 {
        coerce_unit_factor(self.weight)
            * coerce_unit_factor(self.confidence)
            * coerce_unit_factor(self.source_reliability)
    }
}

/// An evidence log row: the raw, un-decayed event as received, journaled for
/// audit on every `apply` — including ones whose computed delta was
/// negligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: i64,
    pub politician_id: String,
    pub source_type: SourceType,
    pub source_id: String,
    pub policy_topic: String,
    pub raw_delta: IdeologyDelta,
    pub effective_weight: f64,
    pub source_date: Option<DateTime<Utc>>,
    pub created_at: i64,
}

/// A politician's recorded stance on an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Support,
    Oppose,
    Neutral,
}

impl Stance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Oppose => "oppose",
            Self::Neutral => "neutral",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "support" => Self::Support,
            "oppose" => Self::Oppose,
            _ => Self::Neutral,
        }
    }
}

/// Upstream-extracted stance of one politician on one article, with the
/// extractor's 1–5 strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleStance {
    pub article_id: String,
    pub politician_id: String,
    pub stance: Stance,
    pub strength: u8,
}

/// Path-dependent agreement history between one user and one politician.
/// Counts only grow; the cumulative delta accumulates unbounded and is
/// consumed through a clamp downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyAgreementRecord {
    pub user_id: String,
    pub politician_id: String,
    pub agreed_count: i64,
    pub disagreed_count: i64,
    pub total_compared: i64,
    pub agreement_rate: f64,
    pub cumulative_policy_delta: f64,
}

impl PolicyAgreementRecord {
    pub fn zero(user_id: impl Into<String>, politician_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            politician_id: politician_id.into(),
            agreed_count: 0,
            disagreed_count: 0,
            total_compared: 0,
            agreement_rate: 0.0,
            cumulative_policy_delta: 0.0,
        }
    }

    /// Fold one agreement/disagreement into the counts and refresh the rate.
    pub fn record(&mut self, agreed: bool, bounded_delta: f64) {
        if agreed {
            self.agreed_count += 1;
        } else {
            self.disagreed_count += 1;
        }
        self.total_compared += 1;
        self.agreement_rate = self.agreed_count as f64 / self.total_compared as f64 * 100.0;
        self.cumulative_policy_delta += bounded_delta;
    }
}

/// One row of a user's personalized ranking — derived, fully recomputed on
/// every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRankingEntry {
    pub user_id: String,
    pub politician_id: String,
    pub ideology_match: f64,
    /// Display-only legacy agreement rate (0–100).
    pub policy_agreement: f64,
    pub overall_compatibility: f64,
    /// 1-based position after sorting by overall compatibility descending.
    pub personal_rank: u32,
}

/// One row of a user's party-level compatibility list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMatch {
    pub party: String,
    pub match_score: f64,
    pub vector: IdeologyVector,
}
