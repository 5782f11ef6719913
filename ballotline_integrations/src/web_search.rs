//! Generic web-search fallback adapter.
//!
//! Registered at the lowest trust weight for every state, so it only wins
//! arbitration when nothing better answered. It speaks the same `Adapter`
//! contract as authoritative sources and gets no special-cased logic:
//! whatever it claims flows through the normal confidence × trust scoring.

use std::time::Duration;

use async_trait::async_trait;
use ballotline_core::{
    Adapter, AdapterQuery, Error, FactField, FactPayload, FactValue, Result, TextContent,
    VotingType,
};
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::USER_AGENT_VALUE;

const SOURCE_ID: &str = "web_search";
/// Search snippets are circumstantial evidence, nothing more.
const DATE_CONFIDENCE: f64 = 0.35;
const TEXT_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: String,
}

/// All valid ISO dates mentioned in a blob of text.
fn extract_dates(pattern: &Regex, text: &str) -> Vec<NaiveDate> {
    pattern
        .find_iter(text)
        .filter_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
        .collect()
}

/// The date mentioned most often, earliest date winning ties.
///
/// Deterministic for a fixed mention multiset regardless of order.
fn most_mentioned_date(mut dates: Vec<NaiveDate>) -> Option<NaiveDate> {
    dates.sort();
    let mut best: Option<(NaiveDate, usize)> = None;
    let mut i = 0;
    while i < dates.len() {
        let date = dates[i];
        let mut count = 0;
        while i < dates.len() && dates[i] == date {
            count += 1;
            i += 1;
        }
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((date, count)),
        }
    }
    best.map(|(date, _)| date)
}

/// Best-effort search over a configurable search API endpoint returning
/// `{"results": [{"title", "url", "snippet"}]}`.
pub struct WebSearchAdapter {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    iso_date: Regex,
}

impl WebSearchAdapter {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        let iso_date = Regex::new(r"\b\d{4}-\d{2}-\d{2}\b")
            .map_err(|e| Error::backend("compile iso date pattern", e))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            iso_date,
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn search(&self, q: &str) -> Result<Vec<SearchResult>> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .query(&[("q", q)]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }
        let resp = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::source_unavailable(SOURCE_ID, e.to_string()))?;
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::backend("decode search response", e))?;
        Ok(body.results)
    }
}

#[async_trait]
impl Adapter for WebSearchAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, query: &AdapterQuery) -> Result<Vec<FactValue>> {
        match query {
            AdapterQuery::Domain {
                jurisdiction,
                domain: ballotline_core::FactDomain::ElectionDates,
                as_of,
            } => {
                let q = format!(
                    "{} general election date {}",
                    jurisdiction.state,
                    as_of.year()
                );
                let results = self.search(&q).await?;
                let mentions: Vec<NaiveDate> = results
                    .iter()
                    .flat_map(|r| {
                        let mut found = extract_dates(&self.iso_date, &r.title);
                        found.extend(extract_dates(&self.iso_date, &r.snippet));
                        found
                    })
                    .filter(|date| *date >= *as_of)
                    .collect();
                let date = most_mentioned_date(mentions).ok_or_else(|| {
                    Error::NotFound(format!("no upcoming election date found for '{q}'"))
                })?;
                Ok(vec![FactValue::new(
                    FactField::ElectionDay,
                    FactPayload::Date(date),
                    SOURCE_ID,
                    Utc::now(),
                    DATE_CONFIDENCE,
                )?])
            }
            AdapterQuery::Instructional {
                state, voting_type, ..
            } => {
                let channel = match voting_type {
                    VotingType::ElectionDay => "vote in person on election day",
                    VotingType::EarlyInPerson => "vote early in person",
                    VotingType::MailIn => "vote by mail",
                };
                let q = format!("how to {channel} in {state}");
                let results = self.search(&q).await?;
                let top = results
                    .into_iter()
                    .find(|r| !r.snippet.trim().is_empty())
                    .ok_or_else(|| Error::NotFound(format!("no search results for '{q}'")))?;
                Ok(vec![FactValue::new(
                    FactField::InstructionalContent,
                    FactPayload::Text(TextContent::new(
                        Some(top.title),
                        Some(top.url),
                        top.snippet,
                    )?),
                    SOURCE_ID,
                    Utc::now(),
                    TEXT_CONFIDENCE,
                )?])
            }
            _ => Err(Error::NotFound(
                "web search answers election dates and instructional queries".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn pattern() -> Regex {
        Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap()
    }

    #[test]
    fn extracts_only_valid_iso_dates() {
        let text = "Election day is 2026-11-03 (was 2026-13-40, see 2026-11-03).";
        let dates = extract_dates(&pattern(), text);
        assert_eq!(dates, vec![d(2026, 11, 3), d(2026, 11, 3)]);
    }

    #[test]
    fn most_mentioned_date_is_order_independent() {
        let a = vec![d(2026, 11, 4), d(2026, 11, 3), d(2026, 11, 3)];
        let b = vec![d(2026, 11, 3), d(2026, 11, 4), d(2026, 11, 3)];
        assert_eq!(most_mentioned_date(a), Some(d(2026, 11, 3)));
        assert_eq!(most_mentioned_date(b), Some(d(2026, 11, 3)));

        // Equal counts: the earlier date wins.
        let tied = vec![d(2026, 11, 4), d(2026, 11, 3)];
        assert_eq!(most_mentioned_date(tied), Some(d(2026, 11, 3)));

        assert_eq!(most_mentioned_date(vec![]), None);
    }

    #[test]
    fn parses_search_response() {
        let raw = r#"{
            "results": [
                {"title": "Illinois 2026 election", "url": "https://example.org/il",
                 "snippet": "The general election is on 2026-11-03."}
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert!(parsed.results[0].snippet.contains("2026-11-03"));
    }
}
