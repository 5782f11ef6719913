use std::sync::Arc;

use chrono::NaiveDate;

use crate::adapter::{DistrictBoundaryAdapter, GeocodeAdapter};
use crate::models::Jurisdiction;
use crate::{Error, Result};

/// Turns a free-text address into a normalized jurisdiction.
///
/// Geocodes first, then looks up the district boundary valid as of the
/// request date. The two failure modes stay distinct: an address that cannot
/// be geocoded is `AddressNotResolvable`; coordinates with no boundary
/// coverage for that state/date are `BoundaryUnavailable`.
pub struct JurisdictionResolver {
    geocoder: Arc<dyn GeocodeAdapter>,
    boundaries: Arc<dyn DistrictBoundaryAdapter>,
}

impl JurisdictionResolver {
    #[tracing::instrument(level = "debug", skip(geocoder, boundaries))]
    pub fn new(
        geocoder: Arc<dyn GeocodeAdapter>,
        boundaries: Arc<dyn DistrictBoundaryAdapter>,
    ) -> Self {
        Self {
            geocoder,
            boundaries,
        }
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn resolve(&self, address: &str, as_of: NaiveDate) -> Result<Jurisdiction> {
        if address.trim().is_empty() {
            return Err(Error::InvalidInput("address is empty".to_string()));
        }
        let point = self.geocoder.geocode(address).await?;
        let boundary = self.boundaries.lookup(&point, as_of).await?;
        if !boundary.covers(as_of) {
            return Err(Error::BoundaryUnavailable {
                state: boundary.state,
                as_of,
            });
        }
        Jurisdiction::new(boundary.state, boundary.district, boundary.time_zone, as_of)
    }
}
