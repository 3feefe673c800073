//! Discovery, classification and matching pipeline for fundscout.

pub mod classify;
pub mod config;
pub mod dedup;
pub mod matching;
pub mod normalize;
pub mod orchestrator;
pub mod profile_text;
pub mod scheduler;
pub mod text;

pub use classify::{Classification, Classifier};
pub use config::{DiscoveryConfig, MatchWeights, SourceRegistry};
pub use dedup::{DedupAdvisor, Deduplicator};
pub use matching::MatchEngine;
pub use normalize::Normalizer;
pub use orchestrator::{
    CancelHandle, Discovery, DiscoverySession, ProgressEvent, RunState, RunSummary, SourceOutcome,
    SourceState,
};
pub use profile_text::parse_profile_text;

pub const CRATE_NAME: &str = "fundscout-engine";
