//! User background profile, versioned per upload.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: String,
    pub organization: String,
    pub years: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub degree: String,
    pub institution: String,
}

/// Owned by exactly one user. Each save creates a new version; prior
/// versions are retained for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub profile_id: Uuid,
    pub version: u32,
    pub skills: BTreeSet<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub research_interests: BTreeSet<String>,
    /// Source text kept for re-matching.
    pub raw_text: String,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            profile_id: Uuid::new_v4(),
            version: 1,
            skills: BTreeSet::new(),
            experience: Vec::new(),
            education: Vec::new(),
            research_interests: BTreeSet::new(),
            raw_text: raw_text.into(),
            created_at: Utc::now(),
        }
    }

    /// Text surface handed to the match engine: structured fields first so
    /// sparse profiles still carry their strongest signals, raw text last.
    pub fn matching_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.extend(self.skills.iter().cloned());
        parts.extend(
            self.experience
                .iter()
                .map(|e| format!("{} {}", e.title, e.organization)),
        );
        parts.extend(
            self.education
                .iter()
                .map(|e| format!("{} {}", e.degree, e.institution)),
        );
        parts.extend(self.research_interests.iter().cloned());
        parts.push(self.raw_text.clone());
        parts.join(" ")
    }
}
