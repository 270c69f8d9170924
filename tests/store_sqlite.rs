use polimatch::profile::{
    Affiliation, ArticleStance, EvidenceEvent, PartyProfile, PersonalRankingEntry,
    PoliticianProfile, PolicyAgreementRecord, SourceType, Stance, UserProfile,
};
use polimatch::questionnaire::{EnhancedAnswers, LegacyAnswers};
use polimatch::store::SqliteProfileStore;
use polimatch::vector::{Dimension, IdeologyDelta, IdeologyVector};
use tempfile::tempdir;

fn sample_politician(id: &str, party: Option<&str>) -> PoliticianProfile {
    PoliticianProfile {
        id: id.to_string(),
        affiliation: Affiliation::from_party(party),
        constituency: Some("North".to_string()),
        vector: IdeologyVector {
            economic: 3.5,
            welfare: -2.0,
            ..IdeologyVector::ZERO
        },
        total_weight: 4.0,
    }
}

fn sample_event() -> EvidenceEvent {
    let mut delta = IdeologyDelta::default();
    delta.set(Dimension::Economic, 0.3);
    delta.set(Dimension::Welfare, -0.1);
    EvidenceEvent {
        source_type: SourceType::Article,
        source_id: "article-9".to_string(),
        policy_topic: "taxation".to_string(),
        raw_delta: delta,
        weight: Some(0.9),
        confidence: Some(0.8),
        source_reliability: None,
        source_date: None,
    }
}

#[tokio::test]
async fn politician_round_trip_preserves_affiliation() {
    let dir = tempdir().unwrap();
    let store = SqliteProfileStore::new(dir.path().join("profiles.sqlite")).unwrap();

    let affiliated = sample_politician("p1", Some("Labour"));
    let independent = sample_politician("p2", None);
    store.put_politician(&affiliated).await.unwrap();
    store.put_politician(&independent).await.unwrap();

    let got = store.get_politician("p1").await.unwrap().unwrap();
    assert_eq!(got, affiliated);
    assert_eq!(got.affiliation.party(), Some("Labour"));

    let got = store.get_politician("p2").await.unwrap().unwrap();
    assert_eq!(got.affiliation, Affiliation::Independent);

    assert!(store.get_politician("missing").await.unwrap().is_none());

    let all = store.list_politicians().await.unwrap();
    assert_eq!(all.len(), 2);
    let members = store.list_party_members("Labour").await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, "p1");
}

#[tokio::test]
async fn apply_writes_profile_and_evidence_together() {
    let dir = tempdir().unwrap();
    let store = SqliteProfileStore::new(dir.path().join("profiles.sqlite")).unwrap();

    let mut profile = sample_politician("p1", Some("Labour"));
    store.put_politician(&profile).await.unwrap();

    profile.vector.economic = 3.7;
    profile.total_weight = 4.72;
    let event = sample_event();
    let id = store
        .apply_politician_update(&profile, &event, 0.72)
        .await
        .unwrap();
    assert!(id > 0);

    let got = store.get_politician("p1").await.unwrap().unwrap();
    assert_eq!(got.vector.economic, 3.7);
    assert_eq!(got.total_weight, 4.72);

    let log = store.evidence_for("p1", 10).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].id, id);
    assert_eq!(log[0].source_id, "article-9");
    assert_eq!(log[0].effective_weight, 0.72);
    assert_eq!(log[0].raw_delta, event.raw_delta);
}

#[tokio::test]
async fn zero_weight_evidence_is_journaled_without_profile() {
    let dir = tempdir().unwrap();
    let store = SqliteProfileStore::new(dir.path().join("profiles.sqlite")).unwrap();

    let profile = sample_politician("p1", None);
    store.put_politician(&profile).await.unwrap();
    store.log_evidence("p1", &sample_event(), 0.0).await.unwrap();

    let got = store.get_politician("p1").await.unwrap().unwrap();
    assert_eq!(got, profile);
    let log = store.evidence_for("p1", 10).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].effective_weight, 0.0);
}

#[tokio::test]
async fn corrupt_evidence_rows_fail_the_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("profiles.sqlite");
    let store = SqliteProfileStore::new(&path).unwrap();

    store.log_evidence("p1", &sample_event(), 0.5).await.unwrap();
    assert_eq!(store.evidence_for("p1", 10).await.unwrap().len(), 1);

    // Corrupt the journaled delta out-of-band.
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("UPDATE evidence_log SET raw_delta = 'not json'", [])
        .unwrap();
    drop(conn);

    let err = store.evidence_for("p1", 10).await.unwrap_err();
    assert!(matches!(err, polimatch::StoreError::Sqlite(_)));
}

#[tokio::test]
async fn party_and_user_round_trip() {
    let dir = tempdir().unwrap();
    let store = SqliteProfileStore::new(dir.path().join("profiles.sqlite")).unwrap();

    let party = PartyProfile {
        name: "Green".to_string(),
        vector: IdeologyVector {
            environmental: 8.0,
            ..IdeologyVector::ZERO
        },
        total_weight: 12.0,
    };
    store.put_party(&party).await.unwrap();
    assert_eq!(store.get_party("Green").await.unwrap().unwrap(), party);
    assert_eq!(store.list_parties().await.unwrap(), vec![party.clone()]);

    // Upsert replaces in place.
    let moved = PartyProfile {
        total_weight: 13.0,
        ..party
    };
    store.put_party(&moved).await.unwrap();
    assert_eq!(store.get_party("Green").await.unwrap().unwrap().total_weight, 13.0);

    let user = UserProfile {
        id: "u1".to_string(),
        vector: IdeologyVector {
            social: -5.0,
            ..IdeologyVector::ZERO
        },
        total_weight: 16.0,
    };
    store.put_user(&user).await.unwrap();
    assert_eq!(store.get_user("u1").await.unwrap().unwrap(), user);
    assert!(store.get_user("u2").await.unwrap().is_none());
}

#[tokio::test]
async fn article_stances_upsert_per_pair() {
    let dir = tempdir().unwrap();
    let store = SqliteProfileStore::new(dir.path().join("profiles.sqlite")).unwrap();

    let stance = ArticleStance {
        article_id: "a1".to_string(),
        politician_id: "p1".to_string(),
        stance: Stance::Support,
        strength: 4,
    };
    store.put_article_stance(&stance).await.unwrap();
    store
        .put_article_stance(&ArticleStance {
            politician_id: "p2".to_string(),
            stance: Stance::Oppose,
            strength: 2,
            ..stance.clone()
        })
        .await
        .unwrap();
    // Second write for the same pair replaces the first.
    store
        .put_article_stance(&ArticleStance {
            strength: 5,
            ..stance.clone()
        })
        .await
        .unwrap();

    let stances = store.stances_for_article("a1").await.unwrap();
    assert_eq!(stances.len(), 2);
    assert_eq!(stances[0].politician_id, "p1");
    assert_eq!(stances[0].strength, 5);
    assert_eq!(stances[1].stance, Stance::Oppose);
    assert!(store.stances_for_article("a2").await.unwrap().is_empty());
}

#[tokio::test]
async fn agreement_records_round_trip() {
    let dir = tempdir().unwrap();
    let store = SqliteProfileStore::new(dir.path().join("profiles.sqlite")).unwrap();

    let mut record = PolicyAgreementRecord::zero("u1", "p1");
    record.record(true, 1.2);
    store.put_agreement(&record).await.unwrap();
    assert_eq!(store.get_agreement("u1", "p1").await.unwrap().unwrap(), record);

    record.record(false, -0.8);
    store.put_agreement(&record).await.unwrap();
    let got = store.get_agreement("u1", "p1").await.unwrap().unwrap();
    assert_eq!(got.total_compared, 2);
    assert_eq!(got.agreement_rate, 50.0);

    assert!(store.get_agreement("u1", "p2").await.unwrap().is_none());
}

#[tokio::test]
async fn rankings_replace_wholesale() {
    let dir = tempdir().unwrap();
    let store = SqliteProfileStore::new(dir.path().join("profiles.sqlite")).unwrap();

    let entry = |pol: &str, rank: u32| PersonalRankingEntry {
        user_id: "u1".to_string(),
        politician_id: pol.to_string(),
        ideology_match: 70.0,
        policy_agreement: 0.0,
        overall_compatibility: 70.0,
        personal_rank: rank,
    };

    store
        .upsert_rankings("u1", &[entry("p1", 1), entry("p2", 2)])
        .await
        .unwrap();
    assert_eq!(store.rankings_for("u1").await.unwrap().len(), 2);

    // A later pass without p2 must not leave its stale row behind.
    store.upsert_rankings("u1", &[entry("p1", 1)]).await.unwrap();
    let rows = store.rankings_for("u1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].politician_id, "p1");
    assert!(store.get_ranking("u1", "p2").await.unwrap().is_none());
}

#[tokio::test]
async fn questionnaire_answers_round_trip() {
    let dir = tempdir().unwrap();
    let store = SqliteProfileStore::new(dir.path().join("profiles.sqlite")).unwrap();

    let legacy = LegacyAnswers {
        immigration: 2,
        healthcare: 4,
        housing: 5,
        economy: 1,
        environment: 3,
        social_issues: 4,
        justice: 2,
        education: 5,
    };
    store.save_legacy_answers("u1", &legacy).await.unwrap();
    assert_eq!(store.get_legacy_answers("u1").await.unwrap().unwrap(), legacy);
    assert!(store.get_enhanced_answers("u1").await.unwrap().is_none());

    let enhanced = EnhancedAnswers {
        values: IdeologyVector {
            economic: -6.0,
            technocratic: 9.0,
            ..IdeologyVector::ZERO
        },
    };
    store.save_enhanced_answers("u1", &enhanced).await.unwrap();
    assert_eq!(
        store.get_enhanced_answers("u1").await.unwrap().unwrap(),
        enhanced
    );
}
