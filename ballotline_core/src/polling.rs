use std::sync::Arc;

use chrono::NaiveDate;

use crate::adapter::AdapterQuery;
use crate::config::ResolverConfig;
use crate::models::{FactDomain, FactField, FactPayload, GeoPoint, Jurisdiction, PollingLocation};
use crate::registry::SourceRegistry;
use crate::time::TimeSource;
use crate::{Error, Result};

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Order candidates by geodesic distance from `origin`, ties by id
/// ascending. Candidates without coordinates sort last (still by id), so a
/// rankable location always beats an unrankable one.
///
/// Pure and total: the same candidate set always produces the same order,
/// whatever order adapters delivered it in.
pub fn rank_by_distance(origin: &GeoPoint, mut candidates: Vec<PollingLocation>) -> Vec<PollingLocation> {
    candidates.sort_by(|a, b| {
        let da = a
            .coordinates
            .map(|c| haversine_km(origin, &c))
            .unwrap_or(f64::INFINITY);
        let db = b
            .coordinates
            .map(|c| haversine_km(origin, &c))
            .unwrap_or(f64::INFINITY);
        da.partial_cmp(&db)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates
}

/// Resolves the polling place for a jurisdiction and date.
///
/// Prefers an authoritative assignment when any source knows one; otherwise
/// ranks the pooled candidate list by distance. Never invents a location:
/// an empty or entirely-stale pool is `NoPollingDataAvailable`.
pub struct PollingLocationResolver {
    registry: Arc<SourceRegistry>,
    time: Arc<dyn TimeSource>,
    config: ResolverConfig,
}

impl PollingLocationResolver {
    #[tracing::instrument(level = "debug", skip(registry, time))]
    pub fn new(
        registry: Arc<SourceRegistry>,
        time: Arc<dyn TimeSource>,
        config: ResolverConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            time,
            config,
        })
    }

    #[tracing::instrument(level = "info", skip(self), fields(key = %jurisdiction.cache_key()))]
    pub async fn resolve(
        &self,
        jurisdiction: &Jurisdiction,
        date: NaiveDate,
        address: &str,
        origin: &GeoPoint,
    ) -> Result<PollingLocation> {
        let handles = self
            .registry
            .lookup(jurisdiction, FactDomain::PollingLocations);

        // (a) Authoritative assignment, in trust order.
        for handle in &handles {
            let query = AdapterQuery::AssignedPollingPlace {
                jurisdiction: jurisdiction.clone(),
                date,
                address: address.to_string(),
            };
            let outcome =
                tokio::time::timeout(self.config.adapter_timeout, handle.adapter.fetch(&query))
                    .await;
            match outcome {
                Ok(Ok(values)) => {
                    if let Some(assigned) = values
                        .into_iter()
                        .filter_map(|v| match v.payload {
                            FactPayload::Locations(locations) => Some(locations),
                            _ => None,
                        })
                        .flatten()
                        .find(|loc| loc.valid_for_date == date)
                    {
                        tracing::debug!(source = %handle.source_id(), "authoritative assignment found");
                        return Ok(assigned);
                    }
                }
                Ok(Err(err)) => {
                    tracing::debug!(source = %handle.source_id(), error = %err, "assignment lookup failed; trying next source");
                }
                Err(_) => {
                    tracing::debug!(source = %handle.source_id(), "assignment lookup timed out; trying next source");
                }
            }
        }

        // (b) Candidate pool ranked by distance.
        let now = self.time.now();
        let max_age = chrono::Duration::from_std(
            self.config.staleness.max_age_for(FactField::PollingLocations),
        )
        .unwrap_or(chrono::Duration::MAX);

        let mut pool: Vec<PollingLocation> = Vec::new();
        let mut seen_ids: std::collections::HashSet<String> = std::collections::HashSet::new();
        for handle in &handles {
            let query = AdapterQuery::Domain {
                jurisdiction: jurisdiction.clone(),
                domain: FactDomain::PollingLocations,
                as_of: date,
            };
            let outcome =
                tokio::time::timeout(self.config.adapter_timeout, handle.adapter.fetch(&query))
                    .await;
            let values = match outcome {
                Ok(Ok(values)) => values,
                Ok(Err(err)) => {
                    tracing::debug!(source = %handle.source_id(), error = %err, "candidate fetch failed");
                    continue;
                }
                Err(_) => {
                    tracing::debug!(source = %handle.source_id(), "candidate fetch timed out");
                    continue;
                }
            };
            for value in values {
                if value.field != FactField::PollingLocations {
                    continue;
                }
                if now - value.fetched_at > max_age {
                    tracing::debug!(source = %value.source_id, "candidate list beyond max staleness; discarding");
                    continue;
                }
                if let FactPayload::Locations(locations) = value.payload {
                    for location in locations {
                        if location.valid_for_date != date {
                            continue;
                        }
                        // Trust order means the first sighting of an id is
                        // the most trusted one.
                        if seen_ids.insert(location.id.clone()) {
                            pool.push(location);
                        }
                    }
                }
            }
        }

        let ranked = rank_by_distance(origin, pool);
        ranked
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoPollingDataAvailable {
                jurisdiction: jurisdiction.cache_key(),
                date,
            })
    }
}
