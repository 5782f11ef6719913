use std::sync::Arc;

use crate::adapter::Adapter;
use crate::models::{FactDomain, Jurisdiction};
use crate::{Error, Result};

/// Which jurisdictions a registration applies to.
///
/// `state: None` matches every jurisdiction; the generic web-search fallback
/// registers this way and participates in the same trust-ordered list at its
/// (lowest) weight rather than through special-cased logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JurisdictionPattern {
    pub state: Option<String>,
}

impl JurisdictionPattern {
    #[tracing::instrument(level = "debug")]
    pub fn for_state(state: impl Into<String> + std::fmt::Debug) -> Result<Self> {
        let state = state.into().trim().to_ascii_uppercase();
        if state.len() != 2 || !state.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::InvalidInput(format!(
                "pattern state must be a two-letter code, got '{state}'"
            )));
        }
        Ok(Self { state: Some(state) })
    }

    pub fn any() -> Self {
        Self { state: None }
    }

    pub fn matches_state(&self, state: &str) -> bool {
        match &self.state {
            Some(s) => s.eq_ignore_ascii_case(state),
            None => true,
        }
    }
}

/// An adapter plus its static trust weight, as returned by lookup.
#[derive(Clone)]
pub struct SourceHandle {
    pub adapter: Arc<dyn Adapter>,
    pub trust_weight: f64,
}

impl SourceHandle {
    pub fn source_id(&self) -> &str {
        self.adapter.source_id()
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("source_id", &self.source_id())
            .field("trust_weight", &self.trust_weight)
            .finish()
    }
}

struct Registration {
    pattern: JurisdictionPattern,
    domain: FactDomain,
    handle: SourceHandle,
}

/// Maps (jurisdiction, fact domain) to an ordered list of candidate adapters.
///
/// Registration is construction-time and config-driven; lookups never mutate,
/// so there is no concurrent-write hazard here.
#[derive(Default)]
pub struct SourceRegistry {
    registrations: Vec<Registration>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(level = "debug", skip(self, adapter))]
    pub fn register(
        &mut self,
        pattern: JurisdictionPattern,
        domain: FactDomain,
        adapter: Arc<dyn Adapter>,
        trust_weight: f64,
    ) -> Result<()> {
        if !trust_weight.is_finite() || !(0.0..=1.0).contains(&trust_weight) {
            return Err(Error::InvalidInput(format!(
                "trust_weight must be finite and in [0,1], got {trust_weight}"
            )));
        }
        if adapter.source_id().trim().is_empty() {
            return Err(Error::InvalidInput("adapter source_id is empty".to_string()));
        }
        self.registrations.push(Registration {
            pattern,
            domain,
            handle: SourceHandle {
                adapter,
                trust_weight,
            },
        });
        Ok(())
    }

    /// Candidate adapters for a jurisdiction and domain, ordered by
    /// descending trust weight, ties by source id ascending.
    ///
    /// Returns empty — never errors — when nothing matches.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn lookup(&self, jurisdiction: &Jurisdiction, domain: FactDomain) -> Vec<SourceHandle> {
        self.lookup_state(&jurisdiction.state, domain)
    }

    /// State-level lookup, for facts that are state-wide rather than
    /// district-scoped (instructional content).
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn lookup_state(&self, state: &str, domain: FactDomain) -> Vec<SourceHandle> {
        let mut handles: Vec<SourceHandle> = self
            .registrations
            .iter()
            .filter(|r| r.domain == domain && r.pattern.matches_state(state))
            .map(|r| r.handle.clone())
            .collect();
        handles.sort_by(|a, b| {
            b.trust_weight
                .partial_cmp(&a.trust_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_id().cmp(b.source_id()))
        });
        handles
    }
}
