//! Run configuration, the source registry file and versioned scoring
//! weights.
//!
//! Weights and lexicons are configuration data, not code: defaults ship
//! embedded, and any of them can be overridden from YAML without a rebuild.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use fundscout_adapters::{SourceKind, SourceSetup};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WEIGHTS_YAML: &str = include_str!("../rules/weights.yaml");

/// Final-score weights for the match engine. A configuration surface, not
/// business logic; tune via `rules/weights.yaml`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    pub text_similarity: f64,
    pub keyword_overlap: f64,
    pub category_match: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            text_similarity: 0.6,
            keyword_overlap: 0.25,
            category_match: 0.15,
        }
    }
}

/// Component weights for the user-independent relevance heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceWeights {
    pub funding_terms: f64,
    pub future_deadline: f64,
    pub completeness: f64,
    pub keyword_density: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            funding_terms: 0.3,
            future_deadline: 0.25,
            completeness: 0.2,
            keyword_density: 0.25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsFile {
    #[allow(dead_code)]
    pub version: u32,
    #[serde(default)]
    pub relevance: RelevanceWeights,
    #[serde(rename = "match", default)]
    pub match_weights: MatchWeights,
}

impl WeightsFile {
    pub fn builtin() -> Self {
        serde_yaml::from_str(DEFAULT_WEIGHTS_YAML).expect("embedded weights.yaml is valid")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    #[allow(dead_code)]
    pub version: u32,
    pub sources: Vec<SourceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub source_name: String,
    pub enabled: bool,
    pub kind: SourceKind,
    pub endpoint: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_min_host_interval_ms")]
    pub min_host_interval_ms: u64,
}

fn default_max_items() -> usize {
    25
}

fn default_min_host_interval_ms() -> u64 {
    500
}

impl SourceRegistry {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Enabled sources, optionally restricted to an explicit selection,
    /// with max_items capped by the run configuration.
    pub fn setups(
        &self,
        selection: Option<&BTreeSet<String>>,
        max_per_source: usize,
    ) -> Vec<SourceSetup> {
        self.sources
            .iter()
            .filter(|s| s.enabled)
            .filter(|s| selection.is_none_or(|sel| sel.contains(&s.source_name)))
            .map(|s| SourceSetup {
                source_name: s.source_name.clone(),
                kind: s.kind,
                endpoint: s.endpoint.clone(),
                organization: s.organization.clone(),
                max_items: s.max_items.min(max_per_source),
                min_host_interval: Duration::from_millis(s.min_host_interval_ms),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// None enables every registry-enabled source.
    pub sources: Option<BTreeSet<String>>,
    /// Optional filter terms; when non-empty, records must mention one.
    pub keywords: BTreeSet<String>,
    pub max_per_source: usize,
    pub concurrency: usize,
    pub run_timeout: Duration,
    pub per_source_timeout: Duration,
    pub match_weights: MatchWeights,
    pub relevance_weights: RelevanceWeights,
    pub reports_dir: PathBuf,
    pub user_agent: String,
    pub http_timeout: Duration,
    pub scheduler_enabled: bool,
    pub discovery_cron: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let weights = WeightsFile::builtin();
        Self {
            sources: None,
            keywords: BTreeSet::new(),
            max_per_source: 25,
            concurrency: 4,
            run_timeout: Duration::from_secs(600),
            per_source_timeout: Duration::from_secs(120),
            match_weights: weights.match_weights,
            relevance_weights: weights.relevance,
            reports_dir: PathBuf::from("./reports"),
            user_agent: "fundscout/0.1".to_string(),
            http_timeout: Duration::from_secs(20),
            scheduler_enabled: false,
            discovery_cron: "0 0 6 * * *".to_string(),
        }
    }
}

impl DiscoveryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_per_source: env_parse("FUNDSCOUT_MAX_PER_SOURCE", defaults.max_per_source),
            concurrency: env_parse("FUNDSCOUT_CONCURRENCY", defaults.concurrency),
            run_timeout: Duration::from_secs(env_parse(
                "FUNDSCOUT_RUN_TIMEOUT_SECS",
                defaults.run_timeout.as_secs(),
            )),
            per_source_timeout: Duration::from_secs(env_parse(
                "FUNDSCOUT_SOURCE_TIMEOUT_SECS",
                defaults.per_source_timeout.as_secs(),
            )),
            reports_dir: std::env::var("FUNDSCOUT_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_dir),
            user_agent: std::env::var("FUNDSCOUT_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout: Duration::from_secs(env_parse(
                "FUNDSCOUT_HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )),
            scheduler_enabled: std::env::var("FUNDSCOUT_SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            discovery_cron: std::env::var("FUNDSCOUT_DISCOVERY_CRON")
                .unwrap_or(defaults.discovery_cron),
            ..defaults
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}
