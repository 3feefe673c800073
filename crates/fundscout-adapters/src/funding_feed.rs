//! RSS/Atom adapter for funding announcement feeds.

use async_trait::async_trait;
use fundscout_core::{RawRecord, SourceError};
use fundscout_storage::HttpFetcher;
use tracing::warn;

use crate::{FetchContext, FetchOutcome, RateLimitPolicy, SourceAdapter, SourceSetup};

pub struct FundingFeedAdapter {
    setup: SourceSetup,
}

impl FundingFeedAdapter {
    pub fn new(setup: SourceSetup) -> Self {
        Self { setup }
    }

    pub fn parse_feed(&self, body: &[u8]) -> Result<FetchOutcome, SourceError> {
        let feed = feed_rs::parser::parse(body)
            .map_err(|e| SourceError::unavailable(&self.setup.source_name, format!("feed parse: {e}")))?;

        let feed_title = feed.title.as_ref().map(|t| t.content.clone());
        let mut outcome = FetchOutcome::default();

        for entry in feed.entries.into_iter().take(self.setup.max_items) {
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty());
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()));

            let (Some(title), Some(url)) = (title, url) else {
                outcome.skipped += 1;
                warn!(source = %self.setup.source_name, "skipping feed entry without title/link");
                continue;
            };

            let mut record = RawRecord::new(&self.setup.source_name);
            record.set("title", title);
            record.set("url", url);
            if let Some(org) = self
                .setup
                .organization
                .clone()
                .or_else(|| feed_title.clone())
            {
                record.set("organization", org);
            }
            if let Some(summary) = entry.summary.as_ref().map(|s| s.content.clone()) {
                record.set("description", summary);
            }
            if let Some(published) = entry.published.or(entry.updated) {
                record.set("published_at", published.to_rfc3339());
            }
            record.set("source_id", entry.id.clone());
            outcome.records.push(record);
        }

        Ok(outcome)
    }
}

#[async_trait]
impl SourceAdapter for FundingFeedAdapter {
    fn source_name(&self) -> &str {
        &self.setup.source_name
    }

    fn rate_limit(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            min_host_interval: self.setup.min_host_interval,
        }
    }

    fn max_items(&self) -> usize {
        self.setup.max_items
    }

    async fn fetch(
        &self,
        http: &HttpFetcher,
        ctx: &FetchContext,
    ) -> Result<FetchOutcome, SourceError> {
        let response = http
            .fetch_bytes(
                ctx.run_id,
                &self.setup.source_name,
                &self.setup.endpoint,
                self.setup.min_host_interval,
            )
            .await
            .map_err(|e| SourceError::unavailable(&self.setup.source_name, e))?;
        self.parse_feed(&response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn adapter() -> FundingFeedAdapter {
        FundingFeedAdapter::new(SourceSetup {
            source_name: "research-funding-feed".into(),
            kind: crate::SourceKind::RssFeed,
            endpoint: "https://funding.example.org/feed.xml".into(),
            organization: None,
            max_items: 10,
            min_host_interval: Duration::from_secs(2),
        })
    }

    const FIXTURE: &[u8] = include_bytes!("../fixtures/funding_feed.xml");

    #[test]
    fn parses_entries_and_uses_feed_title_as_org_fallback() {
        let outcome = adapter().parse_feed(FIXTURE).unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.skipped, 1);

        let first = &outcome.records[0];
        assert_eq!(
            first.str_field("title"),
            Some("Wellcome Trust Biotech Fellowship Deadline Announced")
        );
        assert_eq!(first.str_field("organization"), Some("Research Funding Watch"));
        assert!(first.str_field("description").unwrap().contains("genomics"));
    }

    #[test]
    fn broken_xml_is_whole_source_failure() {
        let err = adapter().parse_feed(b"not a feed").unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }
}
