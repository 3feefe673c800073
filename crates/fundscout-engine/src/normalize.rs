//! Normalization of raw source records into the canonical schema.
//!
//! Pure functions only. Dates and amounts parse against a fixed whitelist and
//! fail closed: an ambiguous or unrecognized value becomes `None` and is
//! logged as a data-quality signal, never guessed.

use chrono::{DateTime, NaiveDate, Utc};
use fundscout_core::{Category, DropReason, Opportunity, OpportunityKind, RawRecord};
use tracing::debug;

use crate::text::clean_text;

#[derive(Debug, Default, Clone, Copy)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Map a raw record into an (as yet unclassified) opportunity.
    /// Returns the drop reason when a mandatory field is missing.
    pub fn normalize(
        &self,
        raw: &RawRecord,
        discovered_at: DateTime<Utc>,
    ) -> Result<Opportunity, DropReason> {
        if raw.fields.is_empty() {
            return Err(DropReason::EmptyRecord);
        }
        let title = raw
            .str_field("title")
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .ok_or(DropReason::MissingTitle)?;
        let organization = raw
            .str_field("organization")
            .map(clean_text)
            .filter(|o| !o.is_empty())
            .ok_or(DropReason::MissingOrganization)?;
        let url = raw
            .str_field("url")
            .map(str::to_string)
            .ok_or(DropReason::MissingUrl)?;

        let description = raw.str_field("description").map(clean_text).unwrap_or_default();

        let deadline = raw.str_field("deadline").and_then(|text| {
            let parsed = parse_deadline(text);
            if parsed.is_none() {
                debug!(source = %raw.source_name, value = text, "unparseable deadline, keeping null");
            }
            parsed
        });

        let funding_amount = raw.str_field("funding_amount").and_then(|text| {
            let parsed = parse_funding_amount(text);
            if parsed.is_none() {
                debug!(source = %raw.source_name, value = text, "unparseable amount, keeping null");
            }
            parsed
        });

        let source_id = raw
            .str_field("source_id")
            .map(str::to_string)
            .unwrap_or_else(|| url.clone());

        Ok(Opportunity {
            source_id,
            source_name: raw.source_name.clone(),
            title,
            organization,
            description,
            url,
            category: Category::Other,
            kind: OpportunityKind::Other,
            funding_amount,
            deadline,
            keywords: Default::default(),
            relevance_score: 0.0,
            discovered_at,
            archived: false,
            raw_payload: raw.payload(),
        })
    }
}

/// Accepted deadline formats, in order of trial:
/// `2025-12-01` (ISO), `September 1, 2025` / `Sep 1, 2025` (with or without
/// comma), `1 September 2025`, and `12/01/2025` month-first; the slash form
/// is rejected as ambiguous whenever swapping month and day would also yield
/// a valid, different date.
pub fn parse_deadline(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%B %d, %Y", "%b %d, %Y", "%B %d %Y", "%b %d %Y", "%d %B %Y", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    if let Ok(month_first) = NaiveDate::parse_from_str(trimmed, "%m/%d/%Y") {
        let day_first = NaiveDate::parse_from_str(trimmed, "%d/%m/%Y").ok();
        return match day_first {
            Some(other) if other != month_first => None,
            _ => Some(month_first),
        };
    }
    if let Ok(day_first) = NaiveDate::parse_from_str(trimmed, "%d/%m/%Y") {
        // month-first failed, so the day field exceeds 12 and this is unambiguous
        return Some(day_first);
    }

    None
}

/// Parse a USD-denominated amount: `$5M`, `$500,000`, `$1.2 million`,
/// `$150K–$500K` (lower bound). Non-dollar currencies fail closed.
pub fn parse_funding_amount(text: &str) -> Option<u64> {
    let dollar = text.find('$')?;
    let rest = &text[dollar + 1..];

    let mut number = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            chars.next();
        } else if c == ',' {
            chars.next();
        } else {
            break;
        }
    }
    let base: f64 = number.parse().ok()?;

    let suffix: String = chars.collect::<String>();
    let suffix = suffix.trim_start();
    let multiplier = if let Some(first) = suffix.chars().next() {
        match first.to_ascii_lowercase() {
            'k' => 1e3,
            'm' => 1e6,
            'b' => 1e9,
            _ => word_multiplier(suffix),
        }
    } else {
        1.0
    };

    let value = base * multiplier;
    if value.is_finite() && value >= 0.0 {
        Some(value.round() as u64)
    } else {
        None
    }
}

fn word_multiplier(suffix: &str) -> f64 {
    let lower = suffix.to_ascii_lowercase();
    if lower.starts_with("thousand") {
        1e3
    } else if lower.starts_with("million") {
        1e6
    } else if lower.starts_with("billion") {
        1e9
    } else {
        1.0
    }
}
