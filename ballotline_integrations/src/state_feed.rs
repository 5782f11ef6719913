//! Per-state election feed adapter.
//!
//! Several states publish machine-readable election calendars; this adapter
//! speaks a small JSON schema those feeds are normalized into:
//!
//! ```json
//! {
//!   "state": "IL",
//!   "updated_at": "2026-02-20T09:00:00Z",
//!   "elections": [{
//!     "election_day": "2026-11-03",
//!     "early_voting_start": "2026-10-19",
//!     "early_voting_end": "2026-10-30",
//!     "mail_request_deadline": "2026-10-29",
//!     "mail_send_deadline": "2026-11-03",
//!     "mail_received_deadline": "2026-11-17",
//!     "races": [{"name": "Governor", "candidates": [{"name": "A", "party": "X"}]}],
//!     "ballot_questions": [{"question": "Q?", "answers": ["Yes", "No"]}]
//!   }],
//!   "polling_locations": [{
//!     "id": "precinct-7", "address": "700 Monroe St", "latitude": 39.79,
//!     "longitude": -89.65, "opens_at": "06:00:00", "closes_at": "19:00:00",
//!     "date": "2026-11-03"
//!   }]
//! }
//! ```
//!
//! The feed's own `updated_at` is carried as `fetched_at` on every claim, so
//! a feed a state stopped maintaining ages out through the normal staleness
//! filter instead of being trusted forever.

use std::time::Duration;

use async_trait::async_trait;
use ballotline_core::{
    Adapter, AdapterQuery, BallotQuestion, Candidate, Error, FactDomain, FactField, FactPayload,
    FactValue, GeoPoint, PollingLocation, Race, Result,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::USER_AGENT_VALUE;

/// Official state data: the most trusted claim a feed can make.
const CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone, Deserialize)]
struct FeedDocument {
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    elections: Vec<FeedElection>,
    #[serde(default)]
    polling_locations: Vec<FeedPollingLocation>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedElection {
    election_day: NaiveDate,
    #[serde(default)]
    early_voting_start: Option<NaiveDate>,
    #[serde(default)]
    early_voting_end: Option<NaiveDate>,
    #[serde(default)]
    mail_request_deadline: Option<NaiveDate>,
    #[serde(default)]
    mail_send_deadline: Option<NaiveDate>,
    #[serde(default)]
    mail_received_deadline: Option<NaiveDate>,
    #[serde(default)]
    races: Vec<FeedRace>,
    #[serde(default)]
    ballot_questions: Vec<FeedQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedRace {
    name: String,
    #[serde(default)]
    candidates: Vec<FeedCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedCandidate {
    name: String,
    #[serde(default)]
    party: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedQuestion {
    question: String,
    answers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedPollingLocation {
    id: String,
    address: String,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    opens_at: Option<NaiveTime>,
    #[serde(default)]
    closes_at: Option<NaiveTime>,
    date: NaiveDate,
}

fn next_election(doc: &FeedDocument, as_of: NaiveDate) -> Option<&FeedElection> {
    doc.elections
        .iter()
        .filter(|e| e.election_day >= as_of)
        .min_by_key(|e| e.election_day)
}

/// Claims the feed supports for one domain query.
fn claims_for_domain(
    source_id: &str,
    doc: &FeedDocument,
    domain: FactDomain,
    as_of: NaiveDate,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<FactValue>> {
    match domain {
        FactDomain::ElectionDates => {
            let election = next_election(doc, as_of).ok_or_else(|| {
                Error::NotFound(format!("no election on or after {as_of} in feed"))
            })?;
            let dates: [(FactField, Option<NaiveDate>); 6] = [
                (FactField::ElectionDay, Some(election.election_day)),
                (FactField::EarlyVotingStart, election.early_voting_start),
                (FactField::EarlyVotingEnd, election.early_voting_end),
                (FactField::MailRequestDeadline, election.mail_request_deadline),
                (FactField::MailSendDeadline, election.mail_send_deadline),
                (
                    FactField::MailReceivedDeadline,
                    election.mail_received_deadline,
                ),
            ];
            dates
                .into_iter()
                .filter_map(|(field, date)| {
                    date.map(|date| {
                        FactValue::new(
                            field,
                            FactPayload::Date(date),
                            source_id,
                            fetched_at,
                            CONFIDENCE,
                        )
                    })
                })
                .collect()
        }
        FactDomain::Races => {
            let election = next_election(doc, as_of).ok_or_else(|| {
                Error::NotFound(format!("no election on or after {as_of} in feed"))
            })?;
            let races = election
                .races
                .iter()
                .map(|r| {
                    Race::new(
                        r.name.clone(),
                        r.candidates
                            .iter()
                            .map(|c| Candidate {
                                name: c.name.clone(),
                                party: c.party.clone(),
                            })
                            .collect(),
                    )
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(vec![FactValue::new(
                FactField::Races,
                FactPayload::Races(races),
                source_id,
                fetched_at,
                CONFIDENCE,
            )?])
        }
        FactDomain::BallotQuestions => {
            let election = next_election(doc, as_of).ok_or_else(|| {
                Error::NotFound(format!("no election on or after {as_of} in feed"))
            })?;
            let questions = election
                .ballot_questions
                .iter()
                .map(|q| BallotQuestion::new(q.question.clone(), q.answers.clone()))
                .collect::<Result<Vec<_>>>()?;
            Ok(vec![FactValue::new(
                FactField::BallotQuestions,
                FactPayload::Questions(questions),
                source_id,
                fetched_at,
                CONFIDENCE,
            )?])
        }
        FactDomain::PollingLocations => {
            let locations = doc
                .polling_locations
                .iter()
                .filter(|l| l.date == as_of)
                .map(|l| {
                    let coordinates = match (l.latitude, l.longitude) {
                        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
                        _ => None,
                    };
                    PollingLocation::new(
                        l.id.clone(),
                        l.address.clone(),
                        coordinates,
                        l.opens_at,
                        l.closes_at,
                        l.date,
                    )
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(vec![FactValue::new(
                FactField::PollingLocations,
                FactPayload::Locations(locations),
                source_id,
                fetched_at,
                CONFIDENCE,
            )?])
        }
        _ => Err(Error::NotFound(format!(
            "state feed does not serve domain '{domain}'"
        ))),
    }
}

/// Adapter over one state's normalized election feed.
pub struct StateFeedAdapter {
    client: Client,
    source_id: String,
    state: String,
    base_url: String,
}

impl StateFeedAdapter {
    pub fn new(state: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        let state = state.into().to_ascii_uppercase();
        Self {
            client,
            source_id: format!("state_feed:{}", state.to_ascii_lowercase()),
            state,
            base_url: base_url.into(),
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn load(&self) -> Result<FeedDocument> {
        let url = format!(
            "{}/{}/elections.json",
            self.base_url.trim_end_matches('/'),
            self.state.to_ascii_lowercase()
        );
        let resp = self
            .client
            .get(&url)
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::source_unavailable(self.source_id.clone(), e.to_string()))?;
        resp.json()
            .await
            .map_err(|e| Error::backend("decode state feed document", e))
    }
}

#[async_trait]
impl Adapter for StateFeedAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, query: &AdapterQuery) -> Result<Vec<FactValue>> {
        let AdapterQuery::Domain {
            jurisdiction,
            domain,
            as_of,
        } = query
        else {
            return Err(Error::NotFound(
                "state feed serves domain queries only".to_string(),
            ));
        };
        if jurisdiction.state != self.state {
            return Err(Error::NotFound(format!(
                "feed covers '{}', not '{}'",
                self.state, jurisdiction.state
            )));
        }
        let doc = self.load().await?;
        let fetched_at = doc.updated_at.unwrap_or_else(Utc::now);
        claims_for_domain(&self.source_id, &doc, *domain, *as_of, fetched_at)
    }
}
