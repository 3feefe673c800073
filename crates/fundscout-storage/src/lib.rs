//! Repository contract, HTTP fetch utilities and the text-extraction
//! collaborator for fundscout.

pub mod extract;
pub mod http;
pub mod repository;

pub use extract::{PlainTextExtractor, TextExtractor};
pub use http::{BackoffPolicy, FetchError, FetchedResponse, HttpClientConfig, HttpFetcher};
pub use repository::{InMemoryRepository, OpportunityFilter, Repository, RepositoryError};

pub const CRATE_NAME: &str = "fundscout-storage";
