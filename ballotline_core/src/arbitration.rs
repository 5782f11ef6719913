use chrono::{DateTime, Utc};

use crate::config::StalenessPolicy;
use crate::models::{
    AlternativeClaim, ArbitratedField, DomainFacts, FactDomain, FactField, FactPayload, FactValue,
    FieldProvenance,
};
use crate::{Error, Result};

/// One adapter claim paired with the static trust weight of the source that
/// produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub value: FactValue,
    pub trust_weight: f64,
}

impl Claim {
    #[tracing::instrument(level = "debug", skip(value))]
    pub fn new(value: FactValue, trust_weight: f64) -> Result<Self> {
        if !trust_weight.is_finite() || !(0.0..=1.0).contains(&trust_weight) {
            return Err(Error::InvalidInput(format!(
                "trust_weight must be finite and in [0,1], got {trust_weight}"
            )));
        }
        Ok(Self {
            value,
            trust_weight,
        })
    }

    fn score(&self) -> f64 {
        self.value.confidence * self.trust_weight
    }
}

/// Whether two surviving payloads disagree beyond the field tolerance.
///
/// Dates compare by day distance; everything else is exact.
fn payloads_disagree(a: &FactPayload, b: &FactPayload, date_tolerance_days: i64) -> bool {
    match (a, b) {
        (FactPayload::Date(x), FactPayload::Date(y)) => {
            (*x - *y).num_days().abs() > date_tolerance_days
        }
        _ => a != b,
    }
}

/// Select one winner among the claims for a single field.
///
/// Claims older than `now - max_age` are discarded. Among survivors the
/// highest `confidence × trust_weight` wins; ties break by most recent
/// `fetched_at`, then source id ascending — a total order, so the outcome is
/// independent of input order. Survivors disagreeing with the winner beyond
/// tolerance mark the field conflicted and are kept as alternatives.
///
/// Returns `None` when no claim survives: the field is unknown, which is the
/// caller's signal for a partial record, never a reason to guess.
#[tracing::instrument(level = "debug", skip(claims))]
pub fn arbitrate_field(
    field: FactField,
    claims: Vec<Claim>,
    now: DateTime<Utc>,
    max_age: std::time::Duration,
    date_tolerance_days: i64,
) -> Option<ArbitratedField> {
    let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
    let mut survivors: Vec<Claim> = claims
        .into_iter()
        .filter(|c| c.value.field == field)
        .filter(|c| now - c.value.fetched_at <= max_age)
        .collect();
    if survivors.is_empty() {
        return None;
    }

    survivors.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.value.fetched_at.cmp(&a.value.fetched_at))
            .then_with(|| a.value.source_id.cmp(&b.value.source_id))
    });

    let winner = survivors.remove(0);
    let alternatives: Vec<AlternativeClaim> = survivors
        .into_iter()
        .filter(|c| payloads_disagree(&winner.value.payload, &c.value.payload, date_tolerance_days))
        .map(|c| AlternativeClaim {
            payload: c.value.payload,
            source_id: c.value.source_id,
            fetched_at: c.value.fetched_at,
            confidence: c.value.confidence,
            trust_weight: c.trust_weight,
        })
        .collect();

    let conflicted = !alternatives.is_empty();
    if conflicted {
        tracing::warn!(
            field = ?field,
            winner_source = %winner.value.source_id,
            alternatives = alternatives.len(),
            "sources disagree beyond tolerance; keeping winner, surfacing alternatives"
        );
    }

    Some(ArbitratedField {
        payload: winner.value.payload,
        provenance: FieldProvenance {
            source_id: winner.value.source_id,
            fetched_at: winner.value.fetched_at,
            confidence: winner.value.confidence,
            trust_weight: winner.trust_weight,
            conflicted,
            alternatives,
        },
    })
}

/// Arbitrate every field of one domain from a pooled claim set.
#[tracing::instrument(level = "debug", skip(claims, staleness))]
pub fn arbitrate_domain(
    domain: FactDomain,
    claims: Vec<Claim>,
    now: DateTime<Utc>,
    staleness: &StalenessPolicy,
    date_tolerance_days: i64,
) -> DomainFacts {
    let mut facts = DomainFacts::new(domain);
    let mut fields: Vec<FactField> = claims
        .iter()
        .map(|c| c.value.field)
        .filter(|f| f.domain() == domain)
        .collect();
    fields.sort();
    fields.dedup();

    for field in fields {
        let field_claims: Vec<Claim> = claims
            .iter()
            .filter(|c| c.value.field == field)
            .cloned()
            .collect();
        if let Some(arbitrated) = arbitrate_field(
            field,
            field_claims,
            now,
            staleness.max_age_for(field),
            date_tolerance_days,
        ) {
            facts.fields.insert(field, arbitrated);
        }
    }
    facts
}
