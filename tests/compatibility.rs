use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use polimatch::cache::{Clock, RosterCache, RosterSource, SystemClock};
use polimatch::compat::CompatibilityEngine;
use polimatch::profile::{Affiliation, PartyProfile, PoliticianProfile};
use polimatch::questionnaire::{EnhancedAnswers, LegacyAnswers};
use polimatch::store::{SqliteProfileStore, StoreError};
use polimatch::vector::IdeologyVector;
use polimatch::{EngineConfig, MatchEngine};
use tempfile::tempdir;

fn politician(id: &str, vector: IdeologyVector, weight: f64) -> PoliticianProfile {
    PoliticianProfile {
        id: id.to_string(),
        affiliation: Affiliation::Independent,
        constituency: None,
        vector,
        total_weight: weight,
    }
}

async fn setup() -> (tempfile::TempDir, SqliteProfileStore, MatchEngine) {
    let dir = tempdir().unwrap();
    let store = SqliteProfileStore::new(dir.path().join("c.sqlite")).unwrap();
    let engine = MatchEngine::new(store.clone(), EngineConfig::default());
    (dir, store, engine)
}

#[tokio::test]
async fn identical_mature_profiles_rank_at_one_hundred() {
    let (_dir, store, engine) = setup().await;

    let shared = IdeologyVector {
        economic: 4.0,
        globalism: -3.0,
        welfare: 6.0,
        ..IdeologyVector::ZERO
    };
    engine
        .save_enhanced_answers("u1", &EnhancedAnswers { values: shared })
        .await
        .unwrap();
    store
        .put_politician(&politician("p1", shared, 50.0))
        .await
        .unwrap();

    let ranking = engine.rank("u1").await;
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0].ideology_match, 100.0);
    assert_eq!(ranking[0].overall_compatibility, 100.0);
    assert_eq!(ranking[0].personal_rank, 1);
}

#[tokio::test]
async fn thin_profiles_never_read_as_perfect_matches() {
    let (_dir, store, engine) = setup().await;

    let shared = IdeologyVector::ZERO;
    engine
        .save_enhanced_answers("u1", &EnhancedAnswers { values: shared })
        .await
        .unwrap();
    // Identical vector but no evidence behind it.
    store
        .put_politician(&politician("p1", shared, 0.0))
        .await
        .unwrap();

    let ranking = engine.rank("u1").await;
    assert_eq!(ranking[0].ideology_match, 80.0);
}

#[tokio::test]
async fn ranking_orders_by_overall_with_deterministic_ties() {
    let (_dir, store, engine) = setup().await;

    let user = IdeologyVector {
        economic: 5.0,
        ..IdeologyVector::ZERO
    };
    engine
        .save_enhanced_answers("u1", &EnhancedAnswers { values: user })
        .await
        .unwrap();

    let near = IdeologyVector {
        economic: 4.0,
        ..IdeologyVector::ZERO
    };
    let far = IdeologyVector {
        economic: -5.0,
        ..IdeologyVector::ZERO
    };
    store.put_politician(&politician("far", far, 30.0)).await.unwrap();
    store.put_politician(&politician("near", near, 30.0)).await.unwrap();
    // Same vector as "near": a genuine tie, broken by id.
    store.put_politician(&politician("also-near", near, 30.0)).await.unwrap();

    let ranking = engine.rank("u1").await;
    assert_eq!(ranking.len(), 3);
    assert_eq!(ranking[0].politician_id, "also-near");
    assert_eq!(ranking[1].politician_id, "near");
    assert_eq!(ranking[2].politician_id, "far");
    assert_eq!(
        ranking.iter().map(|e| e.personal_rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn repeated_ranking_is_idempotent() {
    let (_dir, store, engine) = setup().await;

    engine
        .save_enhanced_answers(
            "u1",
            &EnhancedAnswers {
                values: IdeologyVector {
                    social: 2.0,
                    ..IdeologyVector::ZERO
                },
            },
        )
        .await
        .unwrap();
    store
        .put_politician(&politician("p1", IdeologyVector::ZERO, 10.0))
        .await
        .unwrap();
    store
        .put_politician(&politician(
            "p2",
            IdeologyVector {
                social: 3.0,
                ..IdeologyVector::ZERO
            },
            10.0,
        ))
        .await
        .unwrap();

    let first = engine.rank("u1").await;
    let second = engine.rank("u1").await;
    assert_eq!(first, second);
    assert_eq!(store.rankings_for("u1").await.unwrap(), first);
}

#[tokio::test]
async fn users_without_answers_get_an_empty_ranking() {
    let (_dir, store, engine) = setup().await;
    store
        .put_politician(&politician("p1", IdeologyVector::ZERO, 10.0))
        .await
        .unwrap();

    assert!(engine.rank("nobody").await.is_empty());
    assert!(engine.party_matches("nobody", 5).await.is_empty());
}

#[tokio::test]
async fn legacy_answers_build_a_usable_profile() {
    let (_dir, store, engine) = setup().await;

    let answers = LegacyAnswers {
        immigration: 3,
        healthcare: 5,
        housing: 5,
        economy: 3,
        environment: 3,
        social_issues: 3,
        justice: 3,
        education: 3,
    };
    let profile = engine.save_legacy_answers("u1", &answers).await.unwrap();
    assert_eq!(profile.total_weight, 8.0);
    assert_eq!(profile.vector.welfare, 10.0);

    store
        .put_politician(&politician(
            "p1",
            IdeologyVector {
                welfare: 10.0,
                ..IdeologyVector::ZERO
            },
            20.0,
        ))
        .await
        .unwrap();
    let ranking = engine.rank("u1").await;
    assert_eq!(ranking.len(), 1);
    assert!(ranking[0].ideology_match > 80.0);
}

#[tokio::test]
async fn enhanced_answers_take_priority_over_legacy() {
    let (_dir, _store, engine) = setup().await;

    engine
        .save_legacy_answers(
            "u1",
            &LegacyAnswers {
                immigration: 1,
                healthcare: 1,
                housing: 1,
                economy: 1,
                environment: 1,
                social_issues: 1,
                justice: 1,
                education: 1,
            },
        )
        .await
        .unwrap();
    let profile = engine
        .save_enhanced_answers(
            "u1",
            &EnhancedAnswers {
                values: IdeologyVector {
                    economic: 2.5,
                    ..IdeologyVector::ZERO
                },
            },
        )
        .await
        .unwrap();
    assert_eq!(profile.total_weight, 16.0);
    assert_eq!(profile.vector.economic, 2.5);

    let resynced = engine.sync_user_profile("u1").await.unwrap().unwrap();
    assert_eq!(resynced, profile);
}

/// A roster source whose store has gone away.
struct BrokenSource;

#[async_trait]
impl RosterSource for BrokenSource {
    async fn load_roster(&self) -> Result<Vec<PoliticianProfile>, StoreError> {
        Err(StoreError::NotFound("roster".to_string()))
    }
}

#[tokio::test]
async fn roster_failures_degrade_to_an_empty_ranking() {
    let (_dir, store, _engine) = setup().await;

    // A real user with a usable profile, but every roster load fails.
    store
        .save_enhanced_answers(
            "u1",
            &EnhancedAnswers {
                values: IdeologyVector {
                    economic: 4.0,
                    ..IdeologyVector::ZERO
                },
            },
        )
        .await
        .unwrap();

    let cache = Arc::new(RosterCache::new(
        Arc::new(BrokenSource) as Arc<dyn RosterSource>,
        Arc::new(SystemClock) as Arc<dyn Clock>,
        Duration::seconds(300),
    ));
    let compat = CompatibilityEngine::new(store.clone(), cache);

    // The serving path degrades to empty instead of erroring, and leaves no
    // ranking rows behind.
    assert!(compat.rank("u1").await.is_empty());
    assert!(store.rankings_for("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn party_matches_sort_and_truncate() {
    let (_dir, store, engine) = setup().await;

    let user = IdeologyVector {
        environmental: 8.0,
        ..IdeologyVector::ZERO
    };
    engine
        .save_enhanced_answers("u1", &EnhancedAnswers { values: user })
        .await
        .unwrap();

    let party = |name: &str, environmental: f64| PartyProfile {
        name: name.to_string(),
        vector: IdeologyVector {
            environmental,
            ..IdeologyVector::ZERO
        },
        total_weight: 25.0,
    };
    store.put_party(&party("Green", 8.0)).await.unwrap();
    store.put_party(&party("Industry", -6.0)).await.unwrap();
    store.put_party(&party("Centre", 1.0)).await.unwrap();

    let matches = engine.party_matches("u1", 2).await;
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].party, "Green");
    assert_eq!(matches[1].party, "Centre");
    assert!(matches[0].match_score > matches[1].match_score);
}
