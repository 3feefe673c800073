//! Core domain model and error taxonomy for fundscout.

pub mod error;
pub mod opportunity;
pub mod profile;
pub mod record;

pub use error::{DropReason, ExtractError, SourceError};
pub use opportunity::{Category, Fingerprint, Match, MatchComponents, Opportunity, OpportunityKind};
pub use profile::{EducationEntry, ExperienceEntry, Profile};
pub use record::RawRecord;

pub const CRATE_NAME: &str = "fundscout-core";
