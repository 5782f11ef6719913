use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DistrictBoundary, FactDomain, FactValue, GeoPoint, Jurisdiction, VotingType};
use crate::Result;

/// What an adapter is being asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterQuery {
    /// All facts the source knows for one domain of one jurisdiction.
    Domain {
        jurisdiction: Jurisdiction,
        domain: FactDomain,
        as_of: NaiveDate,
    },
    /// The single authoritative polling place assigned to an address, for
    /// sources that know the assignment. Sources that only know candidate
    /// lists answer `NotFound`.
    AssignedPollingPlace {
        jurisdiction: Jurisdiction,
        date: NaiveDate,
        address: String,
    },
    /// Instructional copy for a state and voting channel.
    Instructional {
        state: String,
        date: NaiveDate,
        voting_type: VotingType,
    },
}

/// A single data-source connector.
///
/// One implementation per source/capability (state feed, commercial API,
/// scraped page, generic search fallback); the engine treats them all
/// polymorphically through this contract. Adapters own no state beyond their
/// own request/response cycle.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable source identifier carried into provenance, e.g. "civic_info"
    /// or "state_feed:il".
    fn source_id(&self) -> &str;

    /// Fetch raw claims for the query. Failures surface as
    /// `SourceUnavailable` / `NotFound` / `Timeout`; the engine absorbs them
    /// and moves to the next source in trust order.
    async fn fetch(&self, query: &AdapterQuery) -> Result<Vec<FactValue>>;
}

/// Turns a free-text address into coordinates.
#[async_trait]
pub trait GeocodeAdapter: Send + Sync {
    /// `Error::AddressNotResolvable` when the address yields no match.
    async fn geocode(&self, address: &str) -> Result<GeoPoint>;
}

/// Versioned district-boundary lookup.
#[async_trait]
pub trait DistrictBoundaryAdapter: Send + Sync {
    /// The boundary containing `point` that is valid as of `as_of`.
    ///
    /// `Error::BoundaryUnavailable` when coordinates resolve but no boundary
    /// data covers that state/date.
    async fn lookup(&self, point: &GeoPoint, as_of: NaiveDate) -> Result<DistrictBoundary>;
}
