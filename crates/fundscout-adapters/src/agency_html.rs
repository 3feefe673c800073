//! HTML listing adapter for agency announcement pages.
//!
//! Works over a small selector vocabulary (`article` / `.opportunity` rows
//! with heading, link, summary and optional `.deadline` / `.amount` cells)
//! rather than per-page scraping rules; sources with wilder markup get their
//! own adapter instead of branches here.

use async_trait::async_trait;
use fundscout_core::{RawRecord, SourceError};
use fundscout_storage::HttpFetcher;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::{decode_body, FetchContext, FetchOutcome, RateLimitPolicy, SourceAdapter, SourceSetup};

pub struct AgencyListingAdapter {
    setup: SourceSetup,
}

impl AgencyListingAdapter {
    pub fn new(setup: SourceSetup) -> Self {
        Self { setup }
    }

    pub fn parse_listing(&self, body: &str) -> Result<FetchOutcome, SourceError> {
        let document = Html::parse_document(body);
        let row_selector = parse_selector(&self.setup.source_name, "article, li.opportunity, div.opportunity")?;

        let rows: Vec<ElementRef> = document.select(&row_selector).collect();
        if rows.is_empty() {
            return Err(SourceError::unavailable(
                &self.setup.source_name,
                "no opportunity rows in listing page",
            ));
        }

        let mut outcome = FetchOutcome::default();
        for row in rows.into_iter().take(self.setup.max_items) {
            match self.row_to_record(&row) {
                Some(record) => outcome.records.push(record),
                None => {
                    outcome.skipped += 1;
                    warn!(source = %self.setup.source_name, "skipping listing row without title");
                }
            }
        }
        Ok(outcome)
    }

    fn row_to_record(&self, row: &ElementRef) -> Option<RawRecord> {
        let title = first_text(row, "h1, h2, h3, .title")
            .or_else(|| first_text(row, "a"))?;

        let mut record = RawRecord::new(&self.setup.source_name);
        record.set("title", title);

        if let Some(org) = first_text(row, ".organization, .sponsor").or_else(|| self.setup.organization.clone()) {
            record.set("organization", org);
        }
        if let Some(description) = first_text(row, ".summary, .description, p") {
            record.set("description", description);
        }
        if let Some(href) = first_attr(row, "a[href]", "href") {
            record.set("url", resolve_url(&self.setup.endpoint, &href));
        }
        if let Some(deadline) = first_text(row, ".deadline, .due, time") {
            record.set("deadline", deadline);
        }
        if let Some(amount) = first_text(row, ".amount, .funding") {
            record.set("funding_amount", amount);
        }
        record.set("raw", row.html());
        Some(record)
    }
}

fn parse_selector(source: &str, selector: &str) -> Result<Selector, SourceError> {
    Selector::parse(selector)
        .map_err(|e| SourceError::unavailable(source, format!("bad selector {selector}: {e}")))
}

fn first_text(row: &ElementRef, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    row.select(&sel)
        .next()
        .map(|n| n.text().collect::<String>())
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

fn first_attr(row: &ElementRef, selector: &str, attr: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    row.select(&sel)
        .next()
        .and_then(|n| n.value().attr(attr))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolve relative hrefs against the listing endpoint.
fn resolve_url(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match reqwest::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

#[async_trait]
impl SourceAdapter for AgencyListingAdapter {
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
