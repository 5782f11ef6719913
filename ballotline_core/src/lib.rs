//! Ballotline core: reconciling per-jurisdiction U.S. voting-logistics data
//! from many independent, inconsistent sources into one canonical record.
//!
//! The pieces, leaves first:
//! - adapter traits: one contract per data-source capability
//! - source registry: trust-weighted adapter selection per (jurisdiction, domain)
//! - arbitration: deterministic per-field winner selection with provenance
//! - cache: TTL-aware domain records keyed by jurisdiction + fact domain
//! - election resolution engine: concurrent fan-out, merge, write-through
//! - jurisdiction / polling location resolvers
//! - `VotingDataService`: the operation surface for the tool dispatch layer
//!
//! Concrete adapters (Civic Information API, state feeds, Census geocoder,
//! search fallback, page content) live in `ballotline_integrations`.

#![forbid(unsafe_code)]

pub mod adapter;
pub mod arbitration;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod jurisdiction;
pub mod models;
pub mod ops;
pub mod polling;
pub mod registry;
pub mod time;

pub use adapter::{Adapter, AdapterQuery, DistrictBoundaryAdapter, GeocodeAdapter};
pub use arbitration::{arbitrate_domain, arbitrate_field, Claim};
pub use cache::{CacheKey, ElectionCache, InMemoryCache};
pub use config::{FreshnessRequirement, ResolverConfig, StalenessPolicy, TtlPolicy};
pub use engine::ElectionResolutionEngine;
pub use error::{Error, Result};
pub use jurisdiction::JurisdictionResolver;
pub use models::{
    AlternativeClaim, ArbitratedField, BallotQuestion, CacheEntry, Candidate, DistrictBoundary,
    DomainFacts, Election, ElectionResolution, FactDomain, FactField, FactPayload, FactValue,
    FieldProvenance, GeoPoint, InstructionalContent, Jurisdiction, PollingLocation, Race,
    TextContent, VotingType,
};
pub use ops::VotingDataService;
pub use polling::{haversine_km, rank_by_distance, PollingLocationResolver};
pub use registry::{JurisdictionPattern, SourceHandle, SourceRegistry};
pub use time::{FixedTimeSource, SystemTimeSource, TimeSource};
