//! TF-IDF matching of a free-text query (profile or proposal) against the
//! opportunity corpus.
//!
//! The vocabulary is built per query over the query plus the candidate set,
//! so scores are comparable within one ranking but not across rankings.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use fundscout_core::{Match, MatchComponents, Opportunity};
use uuid::Uuid;

use crate::classify::Classifier;
use crate::config::MatchWeights;
use crate::text::tokenize;

/// Fewer meaningful query tokens than this and text similarity is zeroed
/// rather than reported as noise.
const MIN_QUERY_TOKENS: usize = 3;

pub struct MatchEngine {
    weights: MatchWeights,
    classifier: Classifier,
}

impl MatchEngine {
    pub fn new(weights: MatchWeights, classifier: Classifier) -> Self {
        Self {
            weights,
            classifier,
        }
    }

    pub fn builtin() -> Self {
        Self::new(MatchWeights::default(), Classifier::builtin())
    }

    /// Rank candidates against the query, best first. Deterministic for a
    /// given corpus regardless of candidate order: ties break by recency,
    /// then fingerprint.
    pub fn rank(
        &self,
        query_id: Uuid,
        query_text: &str,
        candidates: &[Opportunity],
        top_n: usize,
    ) -> Vec<Match> {
        if candidates.is_empty() || top_n == 0 {
            return Vec::new();
        }

        let query_tokens = tokenize(query_text);
        let query_category = self.classifier.classify_text(query_text);
        let query_keywords: BTreeSet<&str> = query_tokens.iter().map(String::as_str).collect();

        let corpus: Vec<Vec<String>> = candidates
            .iter()
            .map(|opp| tokenize(&opp.matching_text()))
            .collect();
        let idf = inverse_document_frequencies(&query_tokens, &corpus);
        let query_vector = tfidf_vector(&query_tokens, &idf);

        let computed_at = Utc::now();
        let mut matches: Vec<Match> = candidates
            .iter()
            .zip(&corpus)
            .map(|(opp, tokens)| {
                let text_similarity = if query_tokens.len() < MIN_QUERY_TOKENS {
                    0.0
                } else {
                    cosine_similarity(&query_vector, &tfidf_vector(tokens, &idf))
                };

                let keyword_overlap = if opp.keywords.is_empty() {
                    0.0
                } else {
                    let shared = opp
                        .keywords
                        .iter()
                        .filter(|k| query_keywords.contains(k.as_str()))
                        .count();
                    shared as f64 / opp.keywords.len() as f64
                };

                let category_match = if opp.category == query_category { 1.0 } else { 0.0 };

                let score = (text_similarity * self.weights.text_similarity
                    + keyword_overlap * self.weights.keyword_overlap
                    + category_match * self.weights.category_match)
                    .clamp(0.0, 1.0);

                Match {
                    query_id,
                    fingerprint: opp.fingerprint(),
                    score,
                    components: MatchComponents {
                        text_similarity,
                        keyword_overlap,
                        category_match,
                    },
                    computed_at,
                }
            })
            .collect();

        let recency: HashMap<_, _> = candidates
            .iter()
            .map(|opp| (opp.fingerprint(), opp.discovered_at))
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| recency[&b.fingerprint].cmp(&recency[&a.fingerprint]))
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        matches.truncate(top_n);
        matches
    }
}

/// Smoothed IDF over the query document plus every candidate document.
fn inverse_document_frequencies(
    query_tokens: &[String],
    corpus: &[Vec<String>],
) -> HashMap<String, f64> {
    let mut document_counts: HashMap<String, usize> = HashMap::new();
    let documents = std::iter::once(query_tokens).chain(corpus.iter().map(Vec::as_slice));
    let mut total = 0usize;
    for document in documents {
        total += 1;
        let unique: BTreeSet<&String> = document.iter().collect();
        for token in unique {
            *document_counts.entry(token.clone()).or_default() += 1;
        }
    }
    document_counts
        .into_iter()
        .map(|(token, df)| {
            let idf = (total as f64 / (1.0 + df as f64)).ln() + 1.0;
            (token, idf)
        })
        .collect()
}

fn tfidf_vector(tokens: &[String], idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    if tokens.is_empty() {
        return HashMap::new();
    }
    let mut counts: HashMap<&String, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token).or_default() += 1;
    }
    let total = tokens.len() as f64;
    counts
        .into_iter()
        .map(|(token, count)| {
            let tf = count as f64 / total;
            let weight = idf.get(token).copied().unwrap_or(1.0);
            (token.clone(), tf * weight)
        })
        .collect()
}

fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(token, &wa)| b.get(token).map(|wb| wa * wb))
        .sum();
    let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use fundscout_core::{Category, OpportunityKind};

    fn opportunity(title: &str, description: &str, category: Category) -> Opportunity {
        let keywords = crate::classify::extract_keywords(
            &format!("{title} {description}"),
            10,
        );
        Opportunity {
            source_id: title.to_lowercase().replace(' ', "-"),
            source_name: "grants-portal".into(),
            title: title.into(),
            organization: "NSF".into(),
            description: description.into(),
            url: format!("https://example.org/{}", title.len()),
            category,
            kind: OpportunityKind::Grant,
            funding_amount: None,
            deadline: None,
            keywords,
            relevance_score: 0.5,
            discovered_at: Utc::now(),
            archived: false,
            raw_payload: serde_json::Value::Null,
        }
    }

    fn corpus() -> Vec<Opportunity> {
        vec![
            opportunity(
                "Quantum Computing Research Grant",
                "Support for quantum computing and quantum communication research teams.",
                Category::Quantum,
            ),
            opportunity(
                "Marine Biology Field Award",
                "Coastal ecosystems and marine species population studies.",
                Category::Other,
            ),
            opportunity(
                "AI for Science Fellowship",
                "Machine learning methods for scientific discovery.",
                Category::AiMl,
            ),
        ]
    }

    #[test]
    fn quantum_query_ranks_the_quantum_grant_first() {
        let engine = MatchEngine::builtin();
        let matches = engine.rank(
            Uuid::new_v4(),
            "quantum computing researcher with 5 years experience",
            &corpus(),
            10,
        );
        assert_eq!(matches.len(), 3);
        let best = corpus()
            .iter()
            .find(|o| o.title.starts_with("Quantum"))
            .unwrap()
            .fingerprint();
        assert_eq!(matches[0].fingerprint, best);
        for m in &matches {
            assert!((0.0..=1.0).contains(&m.score));
            assert!((0.0..=1.0).contains(&m.components.text_similarity));
        }
        assert!(matches[0].score > matches[1].score);
    }

    #[test]
    fn ranking_ignores_candidate_order() {
        let engine = MatchEngine::builtin();
        let query_id = Uuid::new_v4();
        let forward = corpus();
        let mut reversed = corpus();
        reversed.reverse();

        let a = engine.rank(query_id, "quantum computing researcher", &forward, 10);
        let b = engine.rank(query_id, "quantum computing researcher", &reversed, 10);
        let order_a: Vec<_> = a.iter().map(|m| m.fingerprint.clone()).collect();
        let order_b: Vec<_> = b.iter().map(|m| m.fingerprint.clone()).collect();
        assert_eq!(order_a, order_b);
    }

    #[test]
    fn short_queries_zero_out_text_similarity() {
        let engine = MatchEngine::builtin();
        // "quantum" alone survives tokenization; too short to trust tf-idf
        let matches = engine.rank(Uuid::new_v4(), "quantum", &corpus(), 10);
        assert!(matches.iter().all(|m| m.components.text_similarity == 0.0));
        // category and keywords still rank the quantum grant on top
        assert!(matches[0].score > 0.0);
    }

    #[test]
    fn empty_corpus_and_top_n_cap() {
        let engine = MatchEngine::builtin();
        assert!(engine.rank(Uuid::new_v4(), "anything at all", &[], 10).is_empty());
        let matches = engine.rank(Uuid::new_v4(), "quantum computing research", &corpus(), 1);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn equal_scores_fall_back_to_recency_then_fingerprint() {
        let engine = MatchEngine::builtin();
        let mut older = opportunity("Alpha Grant", "", Category::Other);
        older.keywords.clear();
        older.discovered_at = Utc::now() - Duration::days(2);
        let mut newer = opportunity("Beta Grant", "", Category::Other);
        newer.keywords.clear();
        newer.discovered_at = Utc::now();

        let matches = engine.rank(
            Uuid::new_v4(),
            "unrelated marine plankton text",
            &[older.clone(), newer.clone()],
            10,
        );
        assert_eq!(matches[0].score, matches[1].score);
        assert_eq!(matches[0].fingerprint, newer.fingerprint());
    }
}
