//! Google Civic Information API adapter.
//!
//! `electionQuery` lists elections with OCD division ids; an election is
//! matched to a jurisdiction by the `ocd-division/country:us/state:{xx}`
//! prefix, earliest upcoming election day first. `voterInfoQuery` returns
//! the polling places assigned to a specific street address, which makes
//! this source authoritative for `AssignedPollingPlace` queries.

use std::time::Duration;

use async_trait::async_trait;
use ballotline_core::{
    Adapter, AdapterQuery, Error, FactField, FactPayload, FactValue, GeoPoint, PollingLocation,
    Result,
};
use chrono::{NaiveDate, Utc};
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::USER_AGENT_VALUE;

const SOURCE_ID: &str = "civic_info";
const DEFAULT_API_BASE: &str = "https://www.googleapis.com/civicinfo/v2";
/// Commercial aggregator: trusted, but not the state itself.
const CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone, Deserialize)]
struct ElectionsResponse {
    #[serde(default)]
    elections: Vec<CivicElection>,
}

#[derive(Debug, Clone, Deserialize)]
struct CivicElection {
    id: String,
    #[serde(rename = "electionDay")]
    election_day: NaiveDate,
    #[serde(rename = "ocdDivisionId", default)]
    ocd_division_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct VoterInfoResponse {
    #[serde(rename = "pollingLocations", default)]
    polling_locations: Vec<CivicPollingLocation>,
}

#[derive(Debug, Clone, Deserialize)]
struct CivicPollingLocation {
    #[serde(default)]
    address: CivicAddress,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CivicAddress {
    #[serde(rename = "locationName", default)]
    location_name: Option<String>,
    #[serde(default)]
    line1: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    zip: Option<String>,
}

impl CivicAddress {
    fn oneline(&self) -> String {
        [
            self.location_name.as_deref(),
            self.line1.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.zip.as_deref(),
        ]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// The earliest election on or after `on_or_after` whose OCD division sits
/// inside the state.
fn match_election<'a>(
    elections: &'a [CivicElection],
    state: &str,
    on_or_after: NaiveDate,
) -> Option<&'a CivicElection> {
    let prefix = format!("ocd-division/country:us/state:{}", state.to_ascii_lowercase());
    elections
        .iter()
        .filter(|e| e.ocd_division_id.starts_with(&prefix))
        .filter(|e| e.election_day >= on_or_after)
        .min_by(|a, b| {
            a.election_day
                .cmp(&b.election_day)
                .then_with(|| a.id.cmp(&b.id))
        })
}

pub struct CivicInfoAdapter {
    client: Client,
    api_base: String,
    api_key: String,
    official_only: bool,
}

impl CivicInfoAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            official_only: false,
        }
    }

    /// Limit voter-info results to data from official state sources.
    pub fn official_only(mut self, official_only: bool) -> Self {
        self.official_only = official_only;
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_elections(&self) -> Result<Vec<CivicElection>> {
        let url = format!("{}/elections", self.api_base);
        let resp = self
            .client
            .get(&url)
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::source_unavailable(SOURCE_ID, e.to_string()))?;
        let body: ElectionsResponse = resp
            .json()
            .await
            .map_err(|e| Error::backend("decode civic info elections", e))?;
        Ok(body.elections)
    }

    #[instrument(level = "debug", skip(self))]
    async fn voter_info(&self, address: &str, election_id: &str) -> Result<VoterInfoResponse> {
        let url = format!("{}/voterinfo", self.api_base);
        let official_only = self.official_only.to_string();
        let resp = self
            .client
            .get(&url)
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .query(&[
                ("key", self.api_key.as_str()),
                ("address", address),
                ("electionId", election_id),
                ("officialOnly", official_only.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::source_unavailable(SOURCE_ID, e.to_string()))?;
        resp.json()
            .await
            .map_err(|e| Error::backend("decode civic info voterinfo", e))
    }
}

#[async_trait]
impl Adapter for CivicInfoAdapter {
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
                let elections = self.list_elections().await?;
                let matched = match_election(&elections, &jurisdiction.state, *as_of)
                    .ok_or_else(|| {
                        Error::NotFound(format!(
                            "no election for state '{}' on or after {as_of}",
                            jurisdiction.state
                        ))
                    })?;
                Ok(vec![FactValue::new(
                    FactField::ElectionDay,
                    FactPayload::Date(matched.election_day),
                    SOURCE_ID,
                    Utc::now(),
                    CONFIDENCE,
                )?])
            }
            AdapterQuery::AssignedPollingPlace {
                jurisdiction,
                date,
                address,
            } => {
                let elections = self.list_elections().await?;
                let matched = match_election(&elections, &jurisdiction.state, *date)
                    .ok_or_else(|| {
                        Error::NotFound(format!(
                            "no election for state '{}' covering {date}",
                            jurisdiction.state
                        ))
                    })?;
                let info = self.voter_info(address, &matched.id).await?;
                if info.polling_locations.is_empty() {
                    return Err(Error::NotFound(format!(
                        "no assigned polling place for '{address}'"
                    )));
                }
                let locations = info
                    .polling_locations
                    .into_iter()
                    .map(|loc| {
                        let coordinates = match (loc.latitude, loc.longitude) {
                            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
                            _ => None,
                        };
                        let oneline = loc.address.oneline();
                        PollingLocation::new(
                            oneline.clone(),
                            oneline,
                            coordinates,
                            None,
                            None,
                            *date,
                        )
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(vec![FactValue::new(
                    FactField::PollingLocations,
                    FactPayload::Locations(locations),
                    SOURCE_ID,
                    Utc::now(),
                    0.99,
                )?])
            }
            _ => Err(Error::NotFound(
                "civic info serves election dates and assigned polling places".to_string(),
            )),
        }
    }
}
