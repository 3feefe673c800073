//! End-to-end pipeline coverage: raw records through normalize, classify,
//! persist and rank, without any network.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use fundscout_core::RawRecord;
use fundscout_engine::{Classifier, MatchEngine, Normalizer};
use fundscout_storage::{InMemoryRepository, OpportunityFilter, Repository};
use uuid::Uuid;

fn record(fields: &[(&str, &str)]) -> RawRecord {
    let mut raw = RawRecord::new("grants-portal");
    for (key, value) in fields {
        raw.set(key, *value);
    }
    raw
}

#[tokio::test]
async fn records_flow_from_raw_to_ranked_matches() {
    let repo = Arc::new(InMemoryRepository::new());
    let normalizer = Normalizer::new();
    let classifier = Classifier::builtin();
    let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

    let raws = [
        record(&[
            ("title", "AI Grant for Climate Research"),
            ("organization", "NSF"),
            ("description", "<p>Funding for machine learning applied to climate.</p>"),
            ("url", "https://grants.example.gov/NSF-25-571"),
            ("deadline", "2025-12-01"),
            ("funding_amount", "$500,000"),
        ]),
        record(&[
            ("title", "Lunar Surface Technology Challenge"),
            ("organization", "NASA"),
            ("description", "Prize competition for lunar surface robotics."),
            ("url", "https://nasa.example.gov/lunar"),
        ]),
        // missing organization, must drop instead of persisting
        record(&[("title", "Orphan Notice"), ("url", "https://x.test/orphan")]),
    ];

    let mut persisted = 0;
    for raw in &raws {
        let Ok(mut opp) = normalizer.normalize(raw, Utc::now()) else {
            continue;
        };
        let classification = classifier.classify(&opp, today);
        opp.category = classification.category;
        opp.kind = classification.kind;
        opp.relevance_score = classification.relevance_score;
        opp.keywords = classification.keywords;
        repo.save_opportunity(opp).await.unwrap();
        persisted += 1;
    }
    assert_eq!(persisted, 2);

    let corpus = repo
        .query_opportunities(&OpportunityFilter::default())
        .await
        .unwrap();
    assert_eq!(corpus.len(), 2);

    let ai_grant = corpus
        .iter()
        .find(|o| o.organization == "NSF")
        .expect("nsf grant persisted");
    assert_eq!(ai_grant.category.as_str(), "ai-ml");
    assert_eq!(ai_grant.funding_amount, Some(500_000));
    assert_eq!(ai_grant.deadline, NaiveDate::from_ymd_opt(2025, 12, 1));
    assert!(ai_grant.relevance_score > 0.5);

    let matches = MatchEngine::builtin().rank(
        Uuid::new_v4(),
        "machine learning researcher focused on climate models",
        &corpus,
        10,
    );
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].fingerprint, ai_grant.fingerprint());
    assert!(matches[0].score > matches[1].score);
}

#[tokio::test]
async fn rediscovery_enriches_instead_of_duplicating() {
    let repo = Arc::new(InMemoryRepository::new());
    let normalizer = Normalizer::new();

    let sparse = record(&[
        ("title", "Space Grant 2025"),
        ("organization", "NASA"),
        ("url", "https://nasa.example.gov/space-grant"),
    ]);
    let complete = record(&[
        ("title", "Space Grant 2025"),
        ("organization", "NASA"),
        ("url", "https://mirror.example.org/space-grant"),
        ("description", "Graduate fellowships in space technology."),
        ("funding_amount", "$80K"),
    ]);

    for raw in [&sparse, &complete] {
        let opp = normalizer.normalize(raw, Utc::now()).unwrap();
        repo.save_opportunity(opp).await.unwrap();
    }

    let corpus = repo
        .query_opportunities(&OpportunityFilter::default())
        .await
        .unwrap();
    assert_eq!(corpus.len(), 1);
    // the merge kept the more complete rendition
    assert_eq!(corpus[0].funding_amount, Some(80_000));
}
