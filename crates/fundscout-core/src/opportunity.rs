//! Canonical opportunity representation and the fingerprint dedup key.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Closed category set. Classification assigns exactly one primary category;
/// `Other` is only chosen when every category lexicon scores zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    AiMl,
    SpaceTechnology,
    Biotech,
    Energy,
    Cybersecurity,
    Healthcare,
    Quantum,
    Climate,
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::AiMl,
        Category::SpaceTechnology,
        Category::Biotech,
        Category::Energy,
        Category::Cybersecurity,
        Category::Healthcare,
        Category::Quantum,
        Category::Climate,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::AiMl => "ai-ml",
            Category::SpaceTechnology => "space-technology",
            Category::Biotech => "biotech",
            Category::Energy => "energy",
            Category::Cybersecurity => "cybersecurity",
            Category::Healthcare => "healthcare",
            Category::Quantum => "quantum",
            Category::Climate => "climate",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse opportunity type inferred from text, carried as metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OpportunityKind {
    Grant,
    Competition,
    Conference,
    Collaboration,
    #[default]
    Other,
}

/// Dedup key: sha256 over (normalized title, normalized organization,
/// deadline rounded to the day). Exact-match only; near-duplicates with
/// materially different titles stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(title: &str, organization: &str, deadline: Option<NaiveDate>) -> Self {
        let day = deadline
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "none".to_string());
        let input = format!(
            "{}|{}|{}",
            normalize_fragment(title),
            normalize_fragment(organization),
            day
        );
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-insensitive alphanumeric collapse used for fingerprint fragments.
pub fn normalize_fragment(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// One discoverable funding/submission target, normalized into the canonical
/// schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub source_id: String,
    pub source_name: String,
    pub title: String,
    pub organization: String,
    pub description: String,
    pub url: String,
    pub category: Category,
    pub kind: OpportunityKind,
    /// USD-normalized lower bound. None when absent or ambiguous.
    pub funding_amount: Option<u64>,
    /// None when absent or unparseable under the accepted format whitelist.
    pub deadline: Option<NaiveDate>,
    pub keywords: BTreeSet<String>,
    /// Heuristic quality signal in [0,1], independent of any user.
    pub relevance_score: f64,
    pub discovered_at: DateTime<Utc>,
    pub archived: bool,
    /// Opaque source payload kept for audit.
    pub raw_payload: serde_json::Value,
}

impl Opportunity {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.title, &self.organization, self.deadline)
    }

    /// Text surface used by the classifier and the match engine.
    pub fn matching_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// Completeness rank used by the upsert tie-break: records carrying a
    /// deadline and a funding amount win over sparser ones.
    fn completeness(&self) -> u8 {
        u8::from(self.deadline.is_some()) + u8::from(self.funding_amount.is_some())
    }

    /// Resolve two discoveries of the same fingerprint. Prefers the more
    /// complete record, then the most recently discovered; the survivor keeps
    /// the newest `discovered_at` so refreshes always advance the timestamp.
    pub fn merge_duplicate(existing: Opportunity, incoming: Opportunity) -> Opportunity {
        let newest_seen = existing.discovered_at.max(incoming.discovered_at);
        let mut winner = match incoming.completeness().cmp(&existing.completeness()) {
            std::cmp::Ordering::Greater => incoming,
            std::cmp::Ordering::Less => existing,
            std::cmp::Ordering::Equal => {
                if incoming.discovered_at >= existing.discovered_at {
                    incoming
                } else {
                    existing
                }
            }
        };
        winner.discovered_at = newest_seen;
        winner
    }
}

/// A scored pairing between a query document and one opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub query_id: Uuid,
    pub fingerprint: Fingerprint,
    pub score: f64,
    pub components: MatchComponents,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchComponents {
    pub text_similarity: f64,
    pub keyword_overlap: f64,
    pub category_match: f64,
}
