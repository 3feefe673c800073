//! Source adapter contract + concrete per-source implementations.
//!
//! Each adapter owns one external source and is an isolated failure domain:
//! a malformed item is skipped and counted, while a whole-source failure
//! surfaces as `SourceError` for the orchestrator to record. Adapters only do
//! network I/O; persistence happens downstream.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fundscout_core::{RawRecord, SourceError};
use fundscout_storage::HttpFetcher;
use uuid::Uuid;

mod agency_html;
mod funding_feed;
mod grants_portal;

pub use agency_html::AgencyListingAdapter;
pub use funding_feed::FundingFeedAdapter;
pub use grants_portal::GrantsPortalAdapter;

pub const CRATE_NAME: &str = "fundscout-adapters";

/// Run-scoped context handed to every fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchContext {
    pub run_id: Uuid,
    pub fetched_at: DateTime<Utc>,
}

/// Rate-limit policy an adapter declares for its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub min_host_interval: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            min_host_interval: Duration::from_millis(500),
        }
    }
}

/// Raw records in fetch order plus the count of malformed items skipped.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    pub skipped: usize,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_name(&self) -> &str;
    fn rate_limit(&self) -> RateLimitPolicy;
    /// Discovery is bounded, not exhaustive.
    fn max_items(&self) -> usize;

    async fn fetch(
        &self,
        http: &HttpFetcher,
        ctx: &FetchContext,
    ) -> Result<FetchOutcome, SourceError>;
}

/// Source kinds recognized by the registry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    JsonApi,
    HtmlListing,
    RssFeed,
}

/// Wiring parameters for one configured source.
#[derive(Debug, Clone)]
pub struct SourceSetup {
    pub source_name: String,
    pub kind: SourceKind,
    pub endpoint: String,
    /// Organization fallback when the source does not carry one per item.
    pub organization: Option<String>,
    pub max_items: usize,
    pub min_host_interval: Duration,
}

pub fn adapter_for(setup: SourceSetup) -> Box<dyn SourceAdapter> {
    match setup.kind {
        SourceKind::JsonApi => Box::new(GrantsPortalAdapter::new(setup)),
        SourceKind::HtmlListing => Box::new(AgencyListingAdapter::new(setup)),
        SourceKind::RssFeed => Box::new(FundingFeedAdapter::new(setup)),
    }
}

pub(crate) fn decode_body(source: &str, body: &[u8]) -> Result<String, SourceError> {
    String::from_utf8(body.to_vec())
        .map_err(|e| SourceError::unavailable(source, format!("response not utf-8: {e}")))
}
