use std::error::Error as StdError;

use chrono::NaiveDate;

use crate::models::FactDomain;

/// Common error type for `ballotline_core`.
///
/// Adapter implementations (HTTP feeds, geocoders, etc.) should preserve the
/// underlying error chain where possible via `Error::backend`.
///
/// "Field unknown" and "field conflicted" are data, not errors; they are
/// carried on the resolved record itself.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("address not resolvable: {0}")]
    AddressNotResolvable(String),

    #[error("no district boundary data for state '{state}' as of {as_of}")]
    BoundaryUnavailable { state: String, as_of: NaiveDate },

    #[error("source '{source_id}' unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("all sources failed for domain '{domain}'")]
    AllSourcesFailed { domain: FactDomain },

    #[error("no polling data available for '{jurisdiction}' on {date}")]
    NoPollingDataAvailable {
        jurisdiction: String,
        date: NaiveDate,
    },

    #[error("source '{source_id}' timed out")]
    Timeout { source_id: String },

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

impl Error {
    #[tracing::instrument(level = "debug", name = "ballotline.error.backend", skip(source))]
    pub fn backend(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn source_unavailable(
        source_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
