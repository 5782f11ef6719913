use std::sync::Arc;

use chrono::NaiveDate;

use crate::adapter::GeocodeAdapter;
use crate::config::FreshnessRequirement;
use crate::engine::ElectionResolutionEngine;
use crate::jurisdiction::JurisdictionResolver;
use crate::models::{
    ElectionResolution, InstructionalContent, Jurisdiction, PollingLocation, VotingType,
};
use crate::polling::PollingLocationResolver;
use crate::time::TimeSource;
use crate::Result;

/// The operation surface exposed to the tool dispatch layer.
///
/// Every operation returns a populated/partial record or a typed error;
/// "field unknown" is data on the record, never an error.
pub struct VotingDataService {
    jurisdictions: JurisdictionResolver,
    engine: Arc<ElectionResolutionEngine>,
    polling: PollingLocationResolver,
    geocoder: Arc<dyn GeocodeAdapter>,
    time: Arc<dyn TimeSource>,
}

impl VotingDataService {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(
        jurisdictions: JurisdictionResolver,
        engine: Arc<ElectionResolutionEngine>,
        polling: PollingLocationResolver,
        geocoder: Arc<dyn GeocodeAdapter>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            jurisdictions,
            engine,
            polling,
            geocoder,
            time,
        }
    }

    /// Canonical "today" for deadline math and defaulted as-of dates.
    pub fn today(&self) -> NaiveDate {
        self.time.today()
    }

    /// Normalize a free-text address into a jurisdiction, valid as of
    /// `as_of` (defaults to today). Failure here is fatal for any further
    /// question about the address.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn resolve_jurisdiction(
        &self,
        address: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<Jurisdiction> {
        let as_of = as_of.unwrap_or_else(|| self.time.today());
        self.jurisdictions.resolve(address, as_of).await
    }

    /// Resolve the reconciled election record for a jurisdiction.
    #[tracing::instrument(level = "info", skip(self, freshness), fields(key = %jurisdiction.cache_key()))]
    pub async fn resolve_election(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
        freshness: &FreshnessRequirement,
    ) -> Result<ElectionResolution> {
        self.engine.resolve(jurisdiction, as_of, freshness).await
    }

    /// Resolve the polling place for a jurisdiction, date, and street
    /// address.
    #[tracing::instrument(level = "info", skip(self), fields(key = %jurisdiction.cache_key()))]
    pub async fn resolve_polling_location(
        &self,
        jurisdiction: &Jurisdiction,
        date: NaiveDate,
        address: &str,
    ) -> Result<PollingLocation> {
        let origin = self.geocoder.geocode(address).await?;
        self.polling
            .resolve(jurisdiction, date, address, &origin)
            .await
    }

    /// How-to-vote copy for a state and voting channel.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn instructional_content(
        &self,
        state: &str,
        date: NaiveDate,
        voting_type: VotingType,
    ) -> Result<InstructionalContent> {
        self.engine.instructional(state, date, voting_type).await
    }
}
