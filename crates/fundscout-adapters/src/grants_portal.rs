//! JSON API adapter for grants-portal style sources.
//!
//! Expected body shape: `{"opportunities": [{...}, ...]}` with loosely-typed
//! items. Field aliases cover the common portal schemas (grants.gov-like
//! `close_date`/`award_ceiling`, SBIR-like `agency`/`synopsis`).

use async_trait::async_trait;
use fundscout_core::{RawRecord, SourceError};
use fundscout_storage::HttpFetcher;
use serde_json::Value;
use tracing::warn;

use crate::{decode_body, FetchContext, FetchOutcome, RateLimitPolicy, SourceAdapter, SourceSetup};

pub struct GrantsPortalAdapter {
    setup: SourceSetup,
}

impl GrantsPortalAdapter {
    pub fn new(setup: SourceSetup) -> Self {
        Self { setup }
    }

    /// Pure parse over the response body; network-free for tests.
    pub fn parse_listing(&self, body: &str) -> Result<FetchOutcome, SourceError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| SourceError::unavailable(&self.setup.source_name, format!("invalid JSON: {e}")))?;
        let items = value
            .get("opportunities")
            .or_else(|| value.get("items"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SourceError::unavailable(&self.setup.source_name, "missing opportunities array")
            })?;

        let mut outcome = FetchOutcome::default();
        for item in items.iter().take(self.setup.max_items) {
            match self.item_to_record(item) {
                Some(record) => outcome.records.push(record),
                None => {
                    outcome.skipped += 1;
                    warn!(source = %self.setup.source_name, "skipping malformed portal item");
                }
            }
        }
        Ok(outcome)
    }

    fn item_to_record(&self, item: &Value) -> Option<RawRecord> {
        let object = item.as_object()?;
        let mut record = RawRecord::new(&self.setup.source_name);

        let title = pick_str(object, &["title", "opportunity_title", "name"])?;
        record.set("title", title);

        if let Some(org) = pick_str(object, &["organization", "agency", "sponsor"])
            .or(self.setup.organization.as_deref())
        {
            record.set("organization", org);
        }
        if let Some(description) = pick_str(object, &["description", "synopsis", "summary"]) {
            record.set("description", description);
        }
        if let Some(url) = pick_str(object, &["url", "link", "opportunity_url"]) {
            record.set("url", url);
        }
        if let Some(deadline) = pick_str(object, &["deadline", "close_date", "due_date"]) {
            record.set("deadline", deadline);
        }
        if let Some(amount) = pick_amount(object) {
            record.set("funding_amount", amount);
        }
        if let Some(id) = pick_str(object, &["id", "opportunity_id", "opportunity_number"]) {
            record.set("source_id", id);
        }
        record.set("raw", item.clone());
        Some(record)
    }
}

fn pick_str<'a>(object: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| object.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Portals carry amounts either as numbers or currency strings; pass both
/// through as text and let the normalizer apply its whitelist.
fn pick_amount(object: &serde_json::Map<String, Value>) -> Option<String> {
    for key in ["funding_amount", "award_ceiling", "award_floor", "amount"] {
        match object.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(format!("${n}")),
            _ => {}
        }
    }
    None
}

#[async_trait]
impl SourceAdapter for GrantsPortalAdapter {
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
        let body = decode_body(&self.setup.source_name, &response.body)?;
        self.parse_listing(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn adapter() -> GrantsPortalAdapter {
        GrantsPortalAdapter::new(SourceSetup {
            source_name: "grants-portal".into(),
            kind: crate::SourceKind::JsonApi,
            endpoint: "https://grants.example.gov/api/opportunities".into(),
            organization: Some("US Government".into()),
            max_items: 10,
            min_host_interval: Duration::from_millis(500),
        })
    }

    const FIXTURE: &str = include_str!("../fixtures/grants_portal.json");

    #[test]
    fn parses_portal_items_into_raw_records() {
        let outcome = adapter().parse_listing(FIXTURE).unwrap();
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.skipped, 1);

        let first = &outcome.records[0];
        assert_eq!(first.str_field("title"), Some("AI Grant for Climate Research"));
        assert_eq!(first.str_field("organization"), Some("NSF"));
        assert_eq!(first.str_field("deadline"), Some("2025-12-01"));

        // numeric award ceilings come through as currency text
        let second = &outcome.records[1];
        assert_eq!(second.str_field("funding_amount"), Some("$750000"));
    }

    #[test]
    fn org_falls_back_to_configured_default() {
        let outcome = adapter().parse_listing(FIXTURE).unwrap();
        let third = &outcome.records[2];
        assert_eq!(third.str_field("organization"), Some("US Government"));
    }

    #[test]
    fn max_items_caps_the_listing() {
        let mut a = adapter();
        a.setup.max_items = 1;
        let outcome = a.parse_listing(FIXTURE).unwrap();
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn invalid_json_is_a_whole_source_failure() {
        let err = adapter().parse_listing("<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }
}
