//! Persistence contract for discovered records.
//!
//! Writes are serialized per-fingerprint: `save_opportunity` is an atomic
//! check-and-set, so concurrent discovery of the same opportunity from two
//! sources resolves through the merge policy, never through a race. Reads are
//! snapshot-consistent clones; a ranking call never observes a torn write.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fundscout_core::{Category, Fingerprint, Opportunity, Profile};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("profile {0} not found")]
    ProfileNotFound(Uuid),
    #[error("profile {id} has no version {version}")]
    ProfileVersionNotFound { id: Uuid, version: u32 },
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Query filters for the opportunity corpus. All fields conjunctive.
#[derive(Debug, Clone, Default)]
pub struct OpportunityFilter {
    pub category: Option<Category>,
    pub min_score: Option<f64>,
    pub source: Option<String>,
    pub discovered_after: Option<DateTime<Utc>>,
    pub include_archived: bool,
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Upsert keyed by fingerprint. A second discovery of the same
    /// fingerprint merges into the existing record instead of inserting.
    async fn save_opportunity(&self, opportunity: Opportunity)
        -> Result<Fingerprint, RepositoryError>;

    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Opportunity>, RepositoryError>;

    async fn query_opportunities(
        &self,
        filter: &OpportunityFilter,
    ) -> Result<Vec<Opportunity>, RepositoryError>;

    /// Stores a new version; prior versions are retained for audit.
    async fn save_profile(&self, profile: Profile) -> Result<Uuid, RepositoryError>;

    /// Latest version of the profile.
    async fn load_profile(&self, profile_id: Uuid) -> Result<Profile, RepositoryError>;

    async fn load_profile_version(
        &self,
        profile_id: Uuid,
        version: u32,
    ) -> Result<Profile, RepositoryError>;

    /// Flags opportunities whose deadline has passed. Archived records are
    /// retained, never hard-deleted. Returns the number newly archived.
    async fn archive_expired(&self, today: NaiveDate) -> Result<usize, RepositoryError>;
}

#[derive(Default)]
struct Corpus {
    opportunities: HashMap<Fingerprint, Opportunity>,
    profiles: HashMap<Uuid, Vec<Profile>>,
}

/// In-memory repository. The storage engine behind the trait is deliberately
/// swappable; this implementation also round-trips to a JSON snapshot file.
#[derive(Default)]
pub struct InMemoryRepository {
    corpus: RwLock<Corpus>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    opportunities: Vec<Opportunity>,
    profiles: Vec<Profile>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn opportunity_count(&self) -> usize {
        self.corpus.read().await.opportunities.len()
    }

    /// Write the full corpus to a JSON snapshot, opportunities keyed by
    /// fingerprint order for stable diffs.
    pub async fn flush_to(&self, path: impl AsRef<Path>) -> Result<(), RepositoryError> {
        let corpus = self.corpus.read().await;
        let mut opportunities: Vec<Opportunity> = corpus.opportunities.values().cloned().collect();
        opportunities.sort_by(|a, b| a.fingerprint().cmp(&b.fingerprint()));
        let profiles = corpus
            .profiles
            .values()
            .flat_map(|versions| versions.iter().cloned())
            .collect();
        drop(corpus);

        let snapshot = Snapshot {
            opportunities,
            profiles,
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path.as_ref(), bytes).await?;
        Ok(())
    }

    pub async fn load_from(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let bytes = fs::read(path.as_ref()).await?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        let repo = Self::new();
        {
            let mut corpus = repo.corpus.write().await;
            for opportunity in snapshot.opportunities {
                corpus
                    .opportunities
                    .insert(opportunity.fingerprint(), opportunity);
            }
            for profile in snapshot.profiles {
                corpus
                    .profiles
                    .entry(profile.profile_id)
                    .or_default()
                    .push(profile);
            }
            for versions in corpus.profiles.values_mut() {
                versions.sort_by_key(|p| p.version);
            }
        }
        Ok(repo)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save_opportunity(
        &self,
        opportunity: Opportunity,
    ) -> Result<Fingerprint, RepositoryError> {
        let fingerprint = opportunity.fingerprint();
        let mut corpus = self.corpus.write().await;
        let merged = match corpus.opportunities.remove(&fingerprint) {
            Some(existing) => Opportunity::merge_duplicate(existing, opportunity),
            None => opportunity,
        };
        corpus.opportunities.insert(fingerprint.clone(), merged);
        Ok(fingerprint)
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<Opportunity>, RepositoryError> {
        Ok(self.corpus.read().await.opportunities.get(fingerprint).cloned())
    }

    async fn query_opportunities(
        &self,
        filter: &OpportunityFilter,
    ) -> Result<Vec<Opportunity>, RepositoryError> {
        let corpus = self.corpus.read().await;
        let mut results: Vec<Opportunity> = corpus
            .opportunities
            .values()
            .filter(|o| filter.include_archived || !o.archived)
            .filter(|o| filter.category.map_or(true, |c| o.category == c))
            .filter(|o| filter.min_score.map_or(true, |s| o.relevance_score >= s))
            .filter(|o| {
                filter
                    .source
                    .as_deref()
                    .map_or(true, |s| o.source_name == s)
            })
            .filter(|o| {
                filter
                    .discovered_after
                    .map_or(true, |t| o.discovered_at > t)
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| {
            b.discovered_at
                .cmp(&a.discovered_at)
                .then_with(|| a.fingerprint().cmp(&b.fingerprint()))
        });
        Ok(results)
    }

    async fn save_profile(&self, mut profile: Profile) -> Result<Uuid, RepositoryError> {
        let mut corpus = self.corpus.write().await;
        let versions = corpus.profiles.entry(profile.profile_id).or_default();
        profile.version = versions.last().map(|p| p.version + 1).unwrap_or(1);
        let id = profile.profile_id;
        versions.push(profile);
        Ok(id)
    }

    async fn load_profile(&self, profile_id: Uuid) -> Result<Profile, RepositoryError> {
        self.corpus
            .read()
            .await
            .profiles
            .get(&profile_id)
            .and_then(|versions| versions.last().cloned())
            .ok_or(RepositoryError::ProfileNotFound(profile_id))
    }

    async fn load_profile_version(
        &self,
        profile_id: Uuid,
        version: u32,
    ) -> Result<Profile, RepositoryError> {
        let corpus = self.corpus.read().await;
        let versions = corpus
            .profiles
            .get(&profile_id)
            .ok_or(RepositoryError::ProfileNotFound(profile_id))?;
        versions
            .iter()
            .find(|p| p.version == version)
            .cloned()
            .ok_or(RepositoryError::ProfileVersionNotFound {
                id: profile_id,
                version,
            })
    }

    async fn archive_expired(&self, today: NaiveDate) -> Result<usize, RepositoryError> {
        let mut corpus = self.corpus.write().await;
        let mut archived = 0usize;
        for opportunity in corpus.opportunities.values_mut() {
            if !opportunity.archived && opportunity.deadline.is_some_and(|d| d < today) {
                opportunity.archived = true;
                archived += 1;
            }
        }
        Ok(archived)
    }
}
