//! US Census Bureau geocoder.
//!
//! One service backs both source traits: `onelineaddress` turns free-text
//! addresses into coordinates, and `geographies/coordinates` returns the
//! enclosing districts. Boundary versioning maps the as-of date onto a
//! Census vintage, so a lookup for last cycle's date hits last cycle's
//! boundaries instead of a mutated current table.

use std::time::Duration;

use async_trait::async_trait;
use ballotline_core::{
    DistrictBoundary, DistrictBoundaryAdapter, Error, GeoPoint, GeocodeAdapter, Result,
};
use chrono::NaiveDate;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::USER_AGENT_VALUE;

const SOURCE_ID: &str = "census_geocoder";
const DEFAULT_API_BASE: &str = "https://geocoding.geo.census.gov/geocoder";
const DEFAULT_BENCHMARK: &str = "Public_AR_Current";

/// A boundary vintage effective from a given date onward.
#[derive(Debug, Clone)]
pub struct VintageWindow {
    pub effective_from: NaiveDate,
    pub vintage: String,
}

#[derive(Debug, Clone)]
pub struct CensusGeocoderConfig {
    pub api_base: String,
    pub benchmark: String,
    /// Vintages ordered by effective date; the latest window at or before
    /// the as-of date is used.
    pub vintages: Vec<VintageWindow>,
}

impl Default for CensusGeocoderConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            benchmark: DEFAULT_BENCHMARK.to_string(),
            vintages: vec![VintageWindow {
                effective_from: NaiveDate::from_ymd_opt(2020, 1, 1)
                    .unwrap_or(NaiveDate::MIN),
                vintage: "Current_Current".to_string(),
            }],
        }
    }
}

impl CensusGeocoderConfig {
    /// The vintage whose window covers `as_of`.
    pub fn vintage_for(&self, as_of: NaiveDate) -> Option<&VintageWindow> {
        self.vintages
            .iter()
            .filter(|w| w.effective_from <= as_of)
            .max_by_key(|w| w.effective_from)
    }
}

#[derive(Debug, Deserialize)]
struct OnelineResponse {
    result: OnelineResult,
}

#[derive(Debug, Deserialize)]
struct OnelineResult {
    #[serde(rename = "addressMatches", default)]
    address_matches: Vec<AddressMatch>,
}

#[derive(Debug, Deserialize)]
struct AddressMatch {
    coordinates: Coordinates,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    /// Longitude.
    x: f64,
    /// Latitude.
    y: f64,
}

#[derive(Debug, Deserialize)]
struct GeographiesResponse {
    result: GeographiesResult,
}

#[derive(Debug, Deserialize)]
struct GeographiesResult {
    #[serde(default)]
    geographies: serde_json::Map<String, serde_json::Value>,
}

fn layer_field(
    geographies: &serde_json::Map<String, serde_json::Value>,
    layer: &str,
    field: &str,
) -> Option<String> {
    geographies
        .get(layer)?
        .as_array()?
        .first()?
        .get(field)?
        .as_str()
        .map(|s| s.to_string())
}

/// Primary IANA time zone per state/territory.
///
/// States spanning multiple zones use the zone covering the majority of the
/// population; sub-state precision is out of scope.
fn state_time_zone(state: &str) -> &'static str {
    match state {
        "HI" => "Pacific/Honolulu",
        "AK" => "America/Anchorage",
        "CA" | "NV" | "OR" | "WA" => "America/Los_Angeles",
        "AZ" => "America/Phoenix",
        "CO" | "ID" | "MT" | "NM" | "UT" | "WY" => "America/Denver",
        "AL" | "AR" | "IA" | "IL" | "KS" | "LA" | "MN" | "MO" | "MS" | "ND" | "NE" | "OK"
        | "SD" | "TN" | "TX" | "WI" => "America/Chicago",
        _ => "America/New_York",
    }
}

/// Geocoding plus versioned district boundaries via the Census geocoder.
pub struct CensusGeocoder {
    client: Client,
    config: CensusGeocoderConfig,
}

impl CensusGeocoder {
    pub fn new(config: CensusGeocoderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        Self { client, config }
    }
}

impl Default for CensusGeocoder {
    fn default() -> Self {
        Self::new(CensusGeocoderConfig::default())
    }
}

#[async_trait]
impl GeocodeAdapter for CensusGeocoder {
    #[instrument(level = "info", skip(self))]
    async fn geocode(&self, address: &str) -> Result<GeoPoint> {
        let url = format!("{}/locations/onelineaddress", self.config.api_base);
        let resp = self
            .client
            .get(&url)
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .query(&[
                ("address", address),
                ("benchmark", self.config.benchmark.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::source_unavailable(SOURCE_ID, e.to_string()))?;
        let body: OnelineResponse = resp
            .json()
            .await
            .map_err(|e| Error::backend("decode census oneline response", e))?;

        let hit = body
            .result
            .address_matches
            .into_iter()
            .next()
            .ok_or_else(|| Error::AddressNotResolvable(address.to_string()))?;
        GeoPoint::new(hit.coordinates.y, hit.coordinates.x)
    }
}

#[async_trait]
impl DistrictBoundaryAdapter for CensusGeocoder {
    #[instrument(level = "info", skip(self))]
    async fn lookup(&self, point: &GeoPoint, as_of: NaiveDate) -> Result<DistrictBoundary> {
        let window = self.config.vintage_for(as_of).ok_or_else(|| {
            Error::BoundaryUnavailable {
                state: "unknown".to_string(),
                as_of,
            }
        })?;

        let url = format!("{}/geographies/coordinates", self.config.api_base);
        let x = point.longitude.to_string();
        let y = point.latitude.to_string();
        let resp = self
            .client
            .get(&url)
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .query(&[
                ("x", x.as_str()),
                ("y", y.as_str()),
                ("benchmark", self.config.benchmark.as_str()),
                ("vintage", window.vintage.as_str()),
                ("layers", "all"),
                ("format", "json"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::source_unavailable(SOURCE_ID, e.to_string()))?;
        let body: GeographiesResponse = resp
            .json()
            .await
            .map_err(|e| Error::backend("decode census geographies response", e))?;

        let geographies = &body.result.geographies;
        let state = layer_field(geographies, "States", "STUSAB").ok_or_else(|| {
            Error::BoundaryUnavailable {
                state: "unknown".to_string(),
                as_of,
            }
        })?;
        let district = layer_field(geographies, "Voting Districts", "NAME")
            .or_else(|| layer_field(geographies, "County Subdivisions", "NAME"))
            .or_else(|| layer_field(geographies, "Counties", "NAME"))
            .ok_or_else(|| Error::BoundaryUnavailable {
                state: state.clone(),
                as_of,
            })?;

        Ok(DistrictBoundary {
            time_zone: state_time_zone(&state).to_string(),
            state,
            district,
            effective_from: window.effective_from,
            effective_to: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_oneline_address_response() {
        let raw = r#"{
            "result": {
                "addressMatches": [
                    {
                        "matchedAddress": "123 MAIN ST, SPRINGFIELD, IL, 62701",
                        "coordinates": {"x": -89.6437, "y": 39.8017}
                    }
                ]
            }
        }"#;
        let parsed: OnelineResponse = serde_json::from_str(raw).unwrap();
        let hit = &parsed.result.address_matches[0];
        assert!((hit.coordinates.y - 39.8017).abs() < 1e-9);
        assert!((hit.coordinates.x + 89.6437).abs() < 1e-9);
    }

    #[test]
    fn extracts_layers_from_geographies_response() {
        let raw = r#"{
            "result": {
                "geographies": {
                    "States": [{"STUSAB": "IL", "NAME": "Illinois"}],
                    "Voting Districts": [{"NAME": "Capital 07"}],
                    "Counties": [{"NAME": "Sangamon County"}]
                }
            }
        }"#;
        let parsed: GeographiesResponse = serde_json::from_str(raw).unwrap();
        let g = &parsed.result.geographies;
        assert_eq!(layer_field(g, "States", "STUSAB").as_deref(), Some("IL"));
        assert_eq!(
            layer_field(g, "Voting Districts", "NAME").as_deref(),
            Some("Capital 07")
        );
        assert_eq!(layer_field(g, "Missing Layer", "NAME"), None);
    }

    #[test]
    fn vintage_selection_follows_effective_dates() {
        let config = CensusGeocoderConfig {
            vintages: vec![
                VintageWindow {
                    effective_from: d(2012, 1, 1),
                    vintage: "Census2010_Current".to_string(),
                },
                VintageWindow {
                    effective_from: d(2022, 1, 1),
                    vintage: "Census2020_Current".to_string(),
                },
            ],
            ..CensusGeocoderConfig::default()
        };
        assert_eq!(
            config.vintage_for(d(2016, 11, 8)).unwrap().vintage,
            "Census2010_Current"
        );
        assert_eq!(
            config.vintage_for(d(2026, 11, 3)).unwrap().vintage,
            "Census2020_Current"
        );
        assert!(config.vintage_for(d(2010, 1, 1)).is_none());
    }

    #[test]
    fn state_zone_table_spot_checks() {
        assert_eq!(state_time_zone("IL"), "America/Chicago");
        assert_eq!(state_time_zone("RI"), "America/New_York");
        assert_eq!(state_time_zone("AZ"), "America/Phoenix");
        assert_eq!(state_time_zone("HI"), "Pacific/Honolulu");
    }
}
