//! Category assignment, heuristic relevance scoring and keyword extraction.
//!
//! The lexicon is versioned configuration data (`rules/lexicon.yaml`); the
//! classifier itself is a pure computation over one opportunity.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use fundscout_core::{Category, Opportunity, OpportunityKind};
use serde::Deserialize;

use crate::config::RelevanceWeights;
use crate::text::tokenize;

pub const DEFAULT_LEXICON_YAML: &str = include_str!("../rules/lexicon.yaml");

/// Terms whose presence marks an opportunity as funding-bearing.
const FUNDING_TERMS: &[&str] = &[
    "grant", "funding", "award", "prize", "fellowship", "stipend", "sbir", "solicitation",
];

/// Description length (in characters) treated as fully complete.
const COMPLETE_DESCRIPTION_CHARS: usize = 400;

/// Matched lexicon terms treated as full keyword density.
const DENSE_KEYWORD_HITS: usize = 4;

const TOP_KEYWORDS: usize = 10;

#[derive(Debug, Clone, Deserialize)]
struct LexiconFile {
    #[allow(dead_code)]
    version: u32,
    categories: Vec<CategoryRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct CategoryRule {
    category: Category,
    keywords: Vec<KeywordRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct KeywordRule {
    term: String,
    #[serde(default = "default_weight")]
    weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone)]
pub struct Lexicon {
    categories: Vec<(Category, Vec<(String, f64)>)>,
}

impl Lexicon {
    pub fn builtin() -> Self {
        serde_yaml::from_str::<LexiconFile>(DEFAULT_LEXICON_YAML)
            .expect("embedded lexicon.yaml is valid")
            .into()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let file: LexiconFile =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(file.into())
    }
}

impl From<LexiconFile> for Lexicon {
    fn from(file: LexiconFile) -> Self {
        Self {
            categories: file
                .categories
                .into_iter()
                .map(|rule| {
                    (
                        rule.category,
                        rule.keywords
                            .into_iter()
                            .map(|k| (k.term.to_lowercase(), k.weight))
                            .collect(),
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: Category,
    pub kind: OpportunityKind,
    pub relevance_score: f64,
    pub keywords: BTreeSet<String>,
}

pub struct Classifier {
    lexicon: Lexicon,
    weights: RelevanceWeights,
}

impl Classifier {
    pub fn new(lexicon: Lexicon, weights: RelevanceWeights) -> Self {
        Self { lexicon, weights }
    }

    pub fn builtin() -> Self {
        Self::new(Lexicon::builtin(), RelevanceWeights::default())
    }

    /// Assign category, relevance and keywords. Pure; `today` anchors the
    /// future-deadline signal so runs and tests are reproducible.
    pub fn classify(&self, opportunity: &Opportunity, today: NaiveDate) -> Classification {
        let text = opportunity.matching_text().to_lowercase();

        let (category, matched_terms) = self.best_category(&text);
        let kind = determine_kind(&text);
        let relevance_score = self.relevance(opportunity, &text, matched_terms, today);
        let keywords = extract_keywords(&opportunity.matching_text(), TOP_KEYWORDS);

        Classification {
            category,
            kind,
            relevance_score,
            keywords,
        }
    }

    /// Category of a free-text query, classified with the same lexicon the
    /// corpus was classified with.
    pub fn classify_text(&self, text: &str) -> Category {
        let (category, _) = self.best_category(&text.to_lowercase());
        category
    }

    /// Highest weighted hit-count wins; first-listed category wins exact
    /// ties; Other only when every lexicon scores zero.
    fn best_category(&self, text: &str) -> (Category, usize) {
        let mut best = (Category::Other, 0.0f64, 0usize);
        for (category, terms) in &self.lexicon.categories {
            let mut score = 0.0;
            let mut hits = 0;
            for (term, weight) in terms {
                if contains_term(text, term) {
                    score += weight;
                    hits += 1;
                }
            }
            if score > best.1 {
                best = (*category, score, hits);
            }
        }
        (best.0, best.2)
    }

    fn relevance(
        &self,
        opportunity: &Opportunity,
        text: &str,
        matched_terms: usize,
        today: NaiveDate,
    ) -> f64 {
        let w = self.weights;

        let funding_signal = if opportunity.funding_amount.is_some()
            || FUNDING_TERMS.iter().any(|t| contains_term(text, t))
        {
            1.0
        } else {
            0.0
        };

        let deadline_signal = match opportunity.deadline {
            Some(deadline) if deadline >= today => 1.0,
            _ => 0.0,
        };

        let completeness_signal = (opportunity.description.len() as f64
            / COMPLETE_DESCRIPTION_CHARS as f64)
            .min(1.0);

        let density_signal = (matched_terms as f64 / DENSE_KEYWORD_HITS as f64).min(1.0);

        let total_weight =
            w.funding_terms + w.future_deadline + w.completeness + w.keyword_density;
        if total_weight <= 0.0 {
            return 0.0;
        }

        let score = (funding_signal * w.funding_terms
            + deadline_signal * w.future_deadline
            + completeness_signal * w.completeness
            + density_signal * w.keyword_density)
            / total_weight;
        score.clamp(0.0, 1.0)
    }
}

/// Boundary-aware term containment: `ai` matches "AI grant" but not
/// "maintain". Multi-word terms match across single spaces.
fn contains_term(text: &str, term: &str) -> bool {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(pos) = text[start..].find(term) {
        let begin = start + pos;
        let end = begin + term.len();
        let left_ok = begin == 0 || !bytes[begin - 1].is_ascii_alphanumeric();
        let right_ok = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if left_ok && right_ok {
            return true;
        }
        start = begin + 1;
    }
    false
}

/// Coarse opportunity type from text markers.
pub fn determine_kind(text: &str) -> OpportunityKind {
    if ["grant", "funding", "award"].iter().any(|t| contains_term(text, t)) {
        OpportunityKind::Grant
    } else if ["competition", "challenge", "prize"].iter().any(|t| contains_term(text, t)) {
        OpportunityKind::Competition
    } else if ["conference", "paper", "abstract"].iter().any(|t| contains_term(text, t)) {
        OpportunityKind::Conference
    } else if ["collaboration", "partnership"].iter().any(|t| contains_term(text, t)) {
        OpportunityKind::Collaboration
    } else {
        OpportunityKind::Other
    }
}

/// Top-N frequent meaningful terms; frequency desc, then alphabetical so the
/// extraction is deterministic.
pub fn extract_keywords(text: &str, top_n: usize) -> BTreeSet<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_default() += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(top_n).map(|(t, _)| t).collect()
}
