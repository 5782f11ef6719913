use std::time::Duration;

use crate::models::{FactDomain, FactField};
use crate::{Error, Result};

/// TTLs per fact domain, derived from how volatile each domain is.
///
/// Deadlines change rarely; polling locations churn close to election day.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    pub election_dates: Duration,
    pub races: Duration,
    pub ballot_questions: Duration,
    pub instructional_content: Duration,
    pub polling_locations: Duration,
    /// TTL used for polling locations inside the near-election window.
    pub polling_locations_near_election: Duration,
    /// Days before election day at which polling data switches to the short TTL.
    pub near_election_window_days: i64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            election_dates: Duration::from_secs(7 * 24 * 3600),
            races: Duration::from_secs(3 * 24 * 3600),
            ballot_questions: Duration::from_secs(3 * 24 * 3600),
            instructional_content: Duration::from_secs(3 * 24 * 3600),
            polling_locations: Duration::from_secs(24 * 3600),
            polling_locations_near_election: Duration::from_secs(6 * 3600),
            near_election_window_days: 14,
        }
    }
}

impl TtlPolicy {
    /// TTL for a domain, given how many days remain until election day (when
    /// known).
    pub fn for_domain(&self, domain: FactDomain, days_until_election: Option<i64>) -> Duration {
        match domain {
            FactDomain::ElectionDates => self.election_dates,
            FactDomain::Races => self.races,
            FactDomain::BallotQuestions => self.ballot_questions,
            FactDomain::InstructionalContent => self.instructional_content,
            FactDomain::PollingLocations => match days_until_election {
                Some(days) if days <= self.near_election_window_days => {
                    self.polling_locations_near_election
                }
                _ => self.polling_locations,
            },
            // Geocoding and boundaries are resolved per request, not cached here.
            FactDomain::Geocoding | FactDomain::DistrictBoundaries => self.election_dates,
        }
    }
}

/// Maximum acceptable age of an adapter claim before arbitration discards it.
#[derive(Debug, Clone)]
pub struct StalenessPolicy {
    /// Deadline-type fields: stricter, a stale deadline is worse than none.
    pub deadline_fields: Duration,
    /// Races, ballot questions, instructional copy.
    pub informational: Duration,
    pub polling_locations: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            deadline_fields: Duration::from_secs(3 * 24 * 3600),
            informational: Duration::from_secs(14 * 24 * 3600),
            polling_locations: Duration::from_secs(2 * 24 * 3600),
        }
    }
}

impl StalenessPolicy {
    pub fn max_age_for(&self, field: FactField) -> Duration {
        if field.is_deadline() {
            self.deadline_fields
        } else if field == FactField::PollingLocations {
            self.polling_locations
        } else {
            self.informational
        }
    }
}

/// Engine-wide resolution settings.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Concurrency bound for the adapter fan-out within one resolution.
    pub max_concurrent_fetches: usize,
    /// Per-adapter-call timeout.
    pub adapter_timeout: Duration,
    pub ttl: TtlPolicy,
    pub staleness: StalenessPolicy,
    /// Dates differing by more than this many days count as a conflict.
    pub date_tolerance_days: i64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
            adapter_timeout: Duration::from_secs(10),
            ttl: TtlPolicy::default(),
            staleness: StalenessPolicy::default(),
            date_tolerance_days: 0,
        }
    }
}

impl ResolverConfig {
    #[tracing::instrument]
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetches == 0 {
            return Err(Error::InvalidInput(
                "max_concurrent_fetches must be > 0".to_string(),
            ));
        }
        if self.adapter_timeout.is_zero() {
            return Err(Error::InvalidInput(
                "adapter_timeout must be > 0".to_string(),
            ));
        }
        if self.date_tolerance_days < 0 {
            return Err(Error::InvalidInput(
                "date_tolerance_days must be >= 0".to_string(),
            ));
        }
        if self.ttl.near_election_window_days < 0 {
            return Err(Error::InvalidInput(
                "near_election_window_days must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// How fresh a caller needs the answer, and how long it will wait for one.
#[derive(Debug, Clone)]
pub struct FreshnessRequirement {
    /// Maximum acceptable age of a cached record; `None` accepts any
    /// unexpired entry.
    pub max_age: Option<Duration>,
    /// Wall-clock budget for one resolution fan-out; on expiry the engine
    /// degrades to a partial record built from whatever was collected.
    pub resolution_deadline: Duration,
}

impl Default for FreshnessRequirement {
    fn default() -> Self {
        Self {
            max_age: None,
            resolution_deadline: Duration::from_secs(30),
        }
    }
}
