//! Error taxonomy shared across the pipeline.
//!
//! Per-item and per-source failures are absorbed and counted by the
//! orchestrator; only run-infrastructure errors propagate to the caller.

use thiserror::Error;

/// Whole-source failure. Marks the source Errored for the run; never aborts
/// other sources.
// `source_name`, not `source`: thiserror reserves the `source` field name
// for the error-source chain.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source {source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },
    #[error("source {source_name} timed out after {seconds}s")]
    Timeout { source_name: String, seconds: u64 },
}

impl SourceError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn source_name(&self) -> &str {
        match self {
            Self::Unavailable { source_name, .. } | Self::Timeout { source_name, .. } => {
                source_name
            }
        }
    }
}

/// Why the normalizer dropped a single record. Counted, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingTitle,
    MissingOrganization,
    MissingUrl,
    EmptyRecord,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingTitle => "missing-title",
            Self::MissingOrganization => "missing-organization",
            Self::MissingUrl => "missing-url",
            Self::EmptyRecord => "empty-record",
        }
    }
}

/// Profile ingestion failure from the text-extraction collaborator.
/// Surfaced to the caller at run level, not pipeline level.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported document format: {mime}")]
    UnsupportedFormat { mime: String },
    #[error("corrupt document: {detail}")]
    CorruptDocument { detail: String },
}
