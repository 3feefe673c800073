//! Exact-fingerprint deduplication against the repository, plus a log-only
//! near-duplicate advisor.
//!
//! Merging happens only on exact fingerprint equality; the advisor surfaces
//! likely near-misses (retitled reposts, trailing years) for operators but
//! never collapses records on its own.

use anyhow::Result;
use fundscout_core::{Fingerprint, Opportunity};
use fundscout_storage::Repository;
use strsim::jaro_winkler;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    /// Exact duplicate check. Returns the stored fingerprint when the
    /// candidate collides with an existing opportunity.
    pub async fn find_duplicate(
        &self,
        candidate: &Opportunity,
        repository: &dyn Repository,
    ) -> Result<Option<Fingerprint>> {
        let fingerprint = candidate.fingerprint();
        Ok(repository
            .find_by_fingerprint(&fingerprint)
            .await?
            .map(|_| fingerprint))
    }
}

/// Similarity threshold above which two distinct fingerprints get flagged.
const NEAR_DUPLICATE_THRESHOLD: f64 = 0.93;

/// Flags same-organization title pairs that are nearly identical but carry
/// different fingerprints. Advisory only.
#[derive(Debug, Clone, Copy)]
pub struct DedupAdvisor {
    threshold: f64,
}

impl Default for DedupAdvisor {
    fn default() -> Self {
        Self {
            threshold: NEAR_DUPLICATE_THRESHOLD,
        }
    }
}

impl DedupAdvisor {
    pub fn is_near_duplicate(&self, a: &Opportunity, b: &Opportunity) -> bool {
        if a.fingerprint() == b.fingerprint() {
            return false;
        }
        if !a.organization.eq_ignore_ascii_case(&b.organization) {
            return false;
        }
        jaro_winkler(&a.title.to_lowercase(), &b.title.to_lowercase()) >= self.threshold
    }

    /// Scan a freshly-persisted opportunity against recent peers and log any
    /// near-miss for operator review.
    pub fn advise(&self, fresh: &Opportunity, peers: &[Opportunity]) {
        for peer in peers {
            if self.is_near_duplicate(fresh, peer) {
                info!(
                    source = %fresh.source_name,
                    title = %fresh.title,
                    peer_title = %peer.title,
                    organization = %fresh.organization,
                    "near-duplicate titles with distinct fingerprints"
                );
            }
        }
    }
}
