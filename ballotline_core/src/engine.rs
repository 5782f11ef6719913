use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use dashmap::DashMap;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use crate::adapter::AdapterQuery;
use crate::arbitration::{arbitrate_domain, Claim};
use crate::cache::{CacheKey, ElectionCache};
use crate::config::{FreshnessRequirement, ResolverConfig};
use crate::models::{
    CacheEntry, DomainFacts, Election, ElectionResolution, FactDomain, FactField, FactPayload,
    InstructionalContent, Jurisdiction, VotingType,
};
use crate::registry::{SourceHandle, SourceRegistry};
use crate::time::TimeSource;
use crate::{Error, Result};

/// The fact domains that make up an election record.
const ELECTION_DOMAINS: [FactDomain; 3] = [
    FactDomain::ElectionDates,
    FactDomain::Races,
    FactDomain::BallotQuestions,
];

/// The Election Resolution Engine.
///
/// Owns record construction and arbitration exclusively: it queries the
/// registry's adapters concurrently per fact domain, merges conflicting
/// claims into one record with per-field provenance, and writes through to
/// the cache with volatility-derived TTLs.
pub struct ElectionResolutionEngine {
    registry: Arc<SourceRegistry>,
    cache: Arc<dyn ElectionCache>,
    time: Arc<dyn TimeSource>,
    config: ResolverConfig,
    /// Per-jurisdiction-key locks backing the single-flight guarantee.
    /// Entries are retained for reuse; the key space is bounded by the
    /// jurisdictions actually served.
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl ElectionResolutionEngine {
    #[tracing::instrument(level = "debug", skip(registry, cache, time))]
    pub fn new(
        registry: Arc<SourceRegistry>,
        cache: Arc<dyn ElectionCache>,
        time: Arc<dyn TimeSource>,
        config: ResolverConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            cache,
            time,
            config,
            inflight: DashMap::new(),
        })
    }

    /// Resolve the election record for a jurisdiction.
    ///
    /// Idempotent within the freshness window. Concurrent calls for the same
    /// jurisdiction key join one in-flight resolution: the first caller holds
    /// the key lock through the fan-out, later callers acquire it afterwards
    /// and are served from the cache without new adapter calls.
    #[tracing::instrument(level = "info", skip(self, freshness), fields(key = %jurisdiction.cache_key()))]
    pub async fn resolve(
        &self,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
        freshness: &FreshnessRequirement,
    ) -> Result<ElectionResolution> {
        let lock = self
            .inflight
            .entry(jurisdiction.cache_key())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut facts_by_domain: BTreeMap<FactDomain, DomainFacts> = BTreeMap::new();
        let mut missing: Vec<FactDomain> = Vec::new();

        for domain in ELECTION_DOMAINS {
            let key = CacheKey::new(jurisdiction, domain);
            match self.cache.get(&key).await? {
                Some(entry) if self.entry_is_usable(&entry, freshness) => {
                    facts_by_domain.insert(domain, entry.facts);
                }
                _ => missing.push(domain),
            }
        }

        if !missing.is_empty() {
            let mut work: Vec<(FactDomain, SourceHandle, AdapterQuery)> = Vec::new();
            for &domain in &missing {
                let handles = self.registry.lookup(jurisdiction, domain);
                if handles.is_empty() {
                    tracing::warn!(%domain, "no adapters registered, not even a fallback");
                }
                for handle in handles {
                    let query = AdapterQuery::Domain {
                        jurisdiction: jurisdiction.clone(),
                        domain,
                        as_of,
                    };
                    work.push((domain, handle, query));
                }
            }

            let collected = self
                .fan_out(work, freshness.resolution_deadline)
                .await;
            let resolved_at = self.time.now();

            for &domain in &missing {
                let claims = match collected.get(&domain) {
                    Some(claims) if !claims.is_empty() => claims.clone(),
                    _ => {
                        let condition = Error::AllSourcesFailed { domain };
                        tracing::warn!(%condition, "fields of this domain remain unknown");
                        continue;
                    }
                };
                let facts = arbitrate_domain(
                    domain,
                    claims,
                    resolved_at,
                    &self.config.staleness,
                    self.config.date_tolerance_days,
                );
                if facts.fields.is_empty() {
                    continue;
                }
                let ttl = self
                    .config
                    .ttl
                    .for_domain(domain, self.days_until_election(&facts_by_domain, &facts));
                self.cache
                    .put(
                        CacheKey::new(jurisdiction, domain),
                        CacheEntry::new(facts.clone(), resolved_at, ttl),
                    )
                    .await?;
                facts_by_domain.insert(domain, facts);
            }
        }

        let election = assemble(jurisdiction, facts_by_domain);
        if let Err(violation) = election.check_date_ordering() {
            // Individually plausible claims from different sources can be
            // inconsistent in combination. Serve the record, flag the dates
            // entry so the next read re-resolves.
            tracing::warn!(%violation, "merged dates violate ordering; marking entry conflicted");
            self.cache
                .mark_conflicted(&CacheKey::new(jurisdiction, FactDomain::ElectionDates))
                .await?;
        }
        Ok(ElectionResolution::from_election(election))
    }

    /// Resolve instructional copy for a state and voting channel through the
    /// same arbitration path as any other fact.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn instructional(
        &self,
        state: &str,
        date: NaiveDate,
        voting_type: VotingType,
    ) -> Result<InstructionalContent> {
        let state = state.trim().to_ascii_uppercase();
        if state.len() != 2 || !state.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::InvalidInput(format!(
                "state must be a two-letter code, got '{state}'"
            )));
        }

        let key = CacheKey::state_scoped(
            &state,
            voting_type.as_str(),
            FactDomain::InstructionalContent,
        );
        let lock = self
            .inflight
            .entry(key.jurisdiction.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let freshness = FreshnessRequirement::default();
        if let Some(entry) = self.cache.get(&key).await? {
            if self.entry_is_usable(&entry, &freshness) {
                if let Some(content) = extract_instructional(&state, voting_type, &entry.facts) {
                    return Ok(content);
                }
            }
        }

        let work: Vec<(FactDomain, SourceHandle, AdapterQuery)> = self
            .registry
            .lookup_state(&state, FactDomain::InstructionalContent)
            .into_iter()
            .map(|handle| {
                (
                    FactDomain::InstructionalContent,
                    handle,
                    AdapterQuery::Instructional {
                        state: state.clone(),
                        date,
                        voting_type,
                    },
                )
            })
            .collect();
        let collected = self.fan_out(work, freshness.resolution_deadline).await;
        let resolved_at = self.time.now();

        let claims = collected
            .get(&FactDomain::InstructionalContent)
            .cloned()
            .unwrap_or_default();
        let facts = arbitrate_domain(
            FactDomain::InstructionalContent,
            claims,
            resolved_at,
            &self.config.staleness,
            self.config.date_tolerance_days,
        );
        let content = extract_instructional(&state, voting_type, &facts).ok_or(
            Error::AllSourcesFailed {
                domain: FactDomain::InstructionalContent,
            },
        )?;

        let ttl = self
            .config
            .ttl
            .for_domain(FactDomain::InstructionalContent, None);
        self.cache
            .put(key, CacheEntry::new(facts, resolved_at, ttl))
            .await?;
        Ok(content)
    }

    fn entry_is_usable(&self, entry: &CacheEntry, freshness: &FreshnessRequirement) -> bool {
        let now = self.time.now();
        if entry.conflicted || entry.is_expired(now) {
            return false;
        }
        match freshness.max_age {
            Some(max_age) => {
                let max_age =
                    chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
                entry.age(now) <= max_age
            }
            None => true,
        }
    }

    fn days_until_election(
        &self,
        resolved: &BTreeMap<FactDomain, DomainFacts>,
        pending: &DomainFacts,
    ) -> Option<i64> {
        let dates = if pending.domain == FactDomain::ElectionDates {
            Some(pending)
        } else {
            resolved.get(&FactDomain::ElectionDates)
        }?;
        match dates.fields.get(&FactField::ElectionDay).map(|f| &f.payload) {
            Some(FactPayload::Date(day)) => {
                Some((*day - self.time.today()).num_days())
            }
            _ => None,
        }
    }

    /// Invoke every (handle, query) pair concurrently, bounded by the
    /// configured concurrency limit and per-call timeout, all under one
    /// overall deadline. Single-adapter failures are absorbed here; whatever
    /// was collected when the deadline elapses is what arbitration gets.
    #[tracing::instrument(level = "debug", skip_all, fields(run_id = %Uuid::new_v4(), calls = work.len()))]
    async fn fan_out(
        &self,
        work: Vec<(FactDomain, SourceHandle, AdapterQuery)>,
        deadline: Duration,
    ) -> BTreeMap<FactDomain, Vec<Claim>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches));
        let per_call_timeout = self.config.adapter_timeout;
        let mut tasks = FuturesUnordered::new();

        for (domain, handle, query) in work {
            let semaphore = semaphore.clone();
            let adapter = handle.adapter.clone();
            let trust_weight = handle.trust_weight;
            let source_id = handle.source_id().to_string();
            tasks.push(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            domain,
                            source_id.clone(),
                            trust_weight,
                            Err(Error::source_unavailable(source_id, "fan-out cancelled")),
                        );
                    }
                };
                let outcome = tokio::time::timeout(per_call_timeout, adapter.fetch(&query)).await;
                let result = match outcome {
                    Ok(Ok(values)) => Ok(values),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(Error::Timeout {
                        source_id: source_id.clone(),
                    }),
                };
                (domain, source_id, trust_weight, result)
            });
        }

        let mut collected: BTreeMap<FactDomain, Vec<Claim>> = BTreeMap::new();
        let drain = async {
            while let Some((domain, source_id, trust_weight, result)) = tasks.next().await {
                match result {
                    Ok(values) => {
                        for value in values {
                            if value.field.domain() != domain {
                                tracing::debug!(
                                    %source_id,
                                    field = ?value.field,
                                    %domain,
                                    "claim outside queried domain; dropping"
                                );
                                continue;
                            }
                            match Claim::new(value, trust_weight) {
                                Ok(claim) => {
                                    collected.entry(domain).or_default().push(claim);
                                }
                                Err(err) => {
                                    tracing::debug!(%source_id, error = %err, "invalid claim dropped");
                                }
                            }
                        }
                    }
                    Err(err) => {
                        tracing::debug!(%source_id, %domain, error = %err, "adapter failed; remaining sources continue");
                    }
                }
            }
        };
        if tokio::time::timeout(deadline, drain).await.is_err() {
            tracing::warn!(
                "resolution deadline elapsed; cancelling outstanding calls and degrading to collected claims"
            );
        }
        collected
    }
}

fn assemble(
    jurisdiction: &Jurisdiction,
    facts_by_domain: BTreeMap<FactDomain, DomainFacts>,
) -> Election {
    let mut election = Election::empty(jurisdiction.clone());
    for facts in facts_by_domain.into_values() {
        for (field, arbitrated) in facts.fields {
            election
                .field_provenance
                .insert(field, arbitrated.provenance);
            match (field, arbitrated.payload) {
                (FactField::ElectionDay, FactPayload::Date(d)) => election.election_day = Some(d),
                (FactField::EarlyVotingStart, FactPayload::Date(d)) => {
                    election.early_voting_start = Some(d)
                }
                (FactField::EarlyVotingEnd, FactPayload::Date(d)) => {
                    election.early_voting_end = Some(d)
                }
                (FactField::MailRequestDeadline, FactPayload::Date(d)) => {
                    election.mail_request_deadline = Some(d)
                }
                (FactField::MailSendDeadline, FactPayload::Date(d)) => {
                    election.mail_send_deadline = Some(d)
                }
                (FactField::MailReceivedDeadline, FactPayload::Date(d)) => {
                    election.mail_received_deadline = Some(d)
                }
                (FactField::Races, FactPayload::Races(races)) => election.races = Some(races),
                (FactField::BallotQuestions, FactPayload::Questions(questions)) => {
                    election.ballot_questions = Some(questions)
                }
                // Polling and instructional facts live outside the election
                // record; payload/field mismatches cannot pass FactValue
                // validation.
                _ => {}
            }
        }
    }
    election
}

fn extract_instructional(
    state: &str,
    voting_type: VotingType,
    facts: &DomainFacts,
) -> Option<InstructionalContent> {
    let arbitrated = facts.fields.get(&FactField::InstructionalContent)?;
    match &arbitrated.payload {
        FactPayload::Text(content) => Some(InstructionalContent {
            state: state.to_string(),
            voting_type,
            content: content.clone(),
            source_id: arbitrated.provenance.source_id.clone(),
            fetched_at: arbitrated.provenance.fetched_at,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Adapter;
    use crate::cache::InMemoryCache;
    use crate::models::{BallotQuestion, FactValue, Race, TextContent};
    use crate::registry::JurisdictionPattern;
    use crate::time::FixedTimeSource;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn jurisdiction() -> Jurisdiction {
        Jurisdiction::new("IL", "SPRINGFIELD-07", "America/Chicago", d(2026, 3, 1)).unwrap()
    }

    fn clock() -> Arc<FixedTimeSource> {
        Arc::new(FixedTimeSource::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ))
    }

    /// Serves a full set of date claims plus races; counts fetches.
    struct FullFeed {
        source_id: &'static str,
        calls: AtomicUsize,
        now: chrono::DateTime<Utc>,
    }

    impl FullFeed {
        fn new(source_id: &'static str, now: chrono::DateTime<Utc>) -> Self {
            Self {
                source_id,
                calls: AtomicUsize::new(0),
                now,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Adapter for FullFeed {
        fn source_id(&self) -> &str {
            self.source_id
        }

        async fn fetch(&self, query: &AdapterQuery) -> Result<Vec<FactValue>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let AdapterQuery::Domain { domain, .. } = query else {
                return Err(Error::NotFound("unsupported query".to_string()));
            };
            let claims = match domain {
                FactDomain::ElectionDates => vec![
                    (FactField::ElectionDay, d(2026, 11, 3)),
                    (FactField::EarlyVotingStart, d(2026, 10, 19)),
                    (FactField::EarlyVotingEnd, d(2026, 10, 30)),
                    (FactField::MailRequestDeadline, d(2026, 10, 20)),
                    (FactField::MailSendDeadline, d(2026, 10, 27)),
                    (FactField::MailReceivedDeadline, d(2026, 11, 10)),
                ]
                .into_iter()
                .map(|(field, date)| {
                    FactValue::new(field, FactPayload::Date(date), self.source_id, self.now, 0.95)
                })
                .collect::<Result<Vec<_>>>()?,
                FactDomain::Races => vec![FactValue::new(
                    FactField::Races,
                    FactPayload::Races(vec![Race::new("Governor", vec![])?]),
                    self.source_id,
                    self.now,
                    0.9,
                )?],
                FactDomain::BallotQuestions => vec![FactValue::new(
                    FactField::BallotQuestions,
                    FactPayload::Questions(vec![BallotQuestion::new(
                        "Shall the township issue road bonds?",
                        vec!["Yes".to_string(), "No".to_string()],
                    )?]),
                    self.source_id,
                    self.now,
                    0.85,
                )?],
                _ => return Err(Error::NotFound("unsupported domain".to_string())),
            };
            Ok(claims)
        }
    }

    /// Always fails; counts fetches.
    struct DownFeed {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Adapter for DownFeed {
        fn source_id(&self) -> &str {
            "down_feed"
        }

        async fn fetch(&self, _query: &AdapterQuery) -> Result<Vec<FactValue>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::source_unavailable("down_feed", "http 503"))
        }
    }

    /// Sleeps past any deadline, then answers.
    struct SlowFeed;

    #[async_trait]
    impl Adapter for SlowFeed {
        fn source_id(&self) -> &str {
            "slow_feed"
        }

        async fn fetch(&self, _query: &AdapterQuery) -> Result<Vec<FactValue>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![FactValue::new(
                FactField::ElectionDay,
                FactPayload::Date(d(2026, 11, 3)),
                "slow_feed",
                Utc::now(),
                1.0,
            )?])
        }
    }

    fn engine_with(
        registry: SourceRegistry,
        time: Arc<FixedTimeSource>,
    ) -> ElectionResolutionEngine {
        ElectionResolutionEngine::new(
            Arc::new(registry),
            Arc::new(InMemoryCache::new()),
            time,
            ResolverConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn degrades_to_partial_when_one_domain_has_no_sources() {
        let time = clock();
        let feed = Arc::new(FullFeed::new("il_feed", time.now()));
        let questions_down = Arc::new(DownFeed {
            calls: AtomicUsize::new(0),
        });

        let mut registry = SourceRegistry::new();
        for domain in [FactDomain::ElectionDates, FactDomain::Races] {
            registry
                .register(
                    JurisdictionPattern::for_state("IL").unwrap(),
                    domain,
                    feed.clone(),
                    0.9,
                )
                .unwrap();
        }
        registry
            .register(
                JurisdictionPattern::for_state("IL").unwrap(),
                FactDomain::BallotQuestions,
                questions_down.clone(),
                0.8,
            )
            .unwrap();

        let engine = engine_with(registry, time);
        let resolution = engine
            .resolve(&jurisdiction(), d(2026, 3, 1), &FreshnessRequirement::default())
            .await
            .unwrap();

        assert!(resolution.is_partial());
        let ElectionResolution::Partial {
            election,
            unknown_fields,
        } = &resolution
        else {
            panic!("expected partial");
        };
        assert_eq!(unknown_fields, &vec![FactField::BallotQuestions]);
        assert_eq!(election.election_day, Some(d(2026, 11, 3)));
        assert!(election.races.is_some());
        assert!(election.check_date_ordering().is_ok());
    }

    #[tokio::test]
    async fn second_resolve_within_ttl_is_served_from_cache() {
        let time = clock();
        let feed = Arc::new(FullFeed::new("il_feed", time.now()));
        let mut registry = SourceRegistry::new();
        for domain in ELECTION_DOMAINS {
            registry
                .register(
                    JurisdictionPattern::for_state("IL").unwrap(),
                    domain,
                    feed.clone(),
                    0.9,
                )
                .unwrap();
        }
        let engine = engine_with(registry, time);

        let first = engine
            .resolve(&jurisdiction(), d(2026, 3, 1), &FreshnessRequirement::default())
            .await
            .unwrap();
        let calls_after_first = feed.call_count();
        assert!(calls_after_first > 0);

        let second = engine
            .resolve(&jurisdiction(), d(2026, 3, 1), &FreshnessRequirement::default())
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(feed.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn expired_entries_are_refreshed() {
        let time = clock();
        let feed = Arc::new(FullFeed::new("il_feed", time.now()));
        let mut registry = SourceRegistry::new();
        registry
            .register(
                JurisdictionPattern::for_state("IL").unwrap(),
                FactDomain::ElectionDates,
                feed.clone(),
                0.9,
            )
            .unwrap();
        let engine = engine_with(registry, time.clone());

        engine
            .resolve(&jurisdiction(), d(2026, 3, 1), &FreshnessRequirement::default())
            .await
            .unwrap();
        let calls_after_first = feed.call_count();

        // Push the clock past the dates TTL; the next read must re-fetch.
        time.advance(chrono::Duration::days(8));
        engine
            .resolve(&jurisdiction(), d(2026, 3, 1), &FreshnessRequirement::default())
            .await
            .unwrap();
        assert!(feed.call_count() > calls_after_first);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_resolves_share_one_fan_out() {
        let time = clock();
        let feed = Arc::new(FullFeed::new("il_feed", time.now()));
        let mut registry = SourceRegistry::new();
        for domain in ELECTION_DOMAINS {
            registry
                .register(
                    JurisdictionPattern::for_state("IL").unwrap(),
                    domain,
                    feed.clone(),
                    0.9,
                )
                .unwrap();
        }
        let engine = Arc::new(engine_with(registry, time));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .resolve(&jurisdiction(), d(2026, 3, 1), &FreshnessRequirement::default())
                    .await
            }));
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        // One fan-out: one fetch per registered domain, no matter how many
        // callers raced.
        assert_eq!(feed.call_count(), ELECTION_DOMAINS.len());
        for result in &results[1..] {
            assert_eq!(result, &results[0]);
        }
    }

    #[tokio::test]
    async fn overall_deadline_degrades_instead_of_hanging() {
        let time = clock();
        let mut registry = SourceRegistry::new();
        registry
            .register(
                JurisdictionPattern::for_state("IL").unwrap(),
                FactDomain::ElectionDates,
                Arc::new(SlowFeed),
                0.9,
            )
            .unwrap();
        let engine = engine_with(registry, time);

        let freshness = FreshnessRequirement {
            max_age: None,
            resolution_deadline: Duration::from_millis(50),
        };
        let started = std::time::Instant::now();
        let resolution = engine
            .resolve(&jurisdiction(), d(2026, 3, 1), &freshness)
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(resolution.is_partial());
        assert_eq!(resolution.election().election_day, None);
    }

    #[tokio::test]
    async fn instructional_content_is_arbitrated_and_cached() {
        struct Pamphlet {
            calls: AtomicUsize,
            now: chrono::DateTime<Utc>,
        }

        #[async_trait]
        impl Adapter for Pamphlet {
            fn source_id(&self) -> &str {
                "il_pamphlet"
            }

            async fn fetch(&self, query: &AdapterQuery) -> Result<Vec<FactValue>> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let AdapterQuery::Instructional { .. } = query else {
                    return Err(Error::NotFound("unsupported query".to_string()));
                };
                Ok(vec![FactValue::new(
                    FactField::InstructionalContent,
                    FactPayload::Text(TextContent::new(
                        Some("Voting by mail in Illinois".to_string()),
                        Some("https://elections.il.gov/mail".to_string()),
                        "Request your ballot by mail no later than five days before the election.",
                    )?),
                    "il_pamphlet",
                    self.now,
                    0.9,
                )?])
            }
        }

        let time = clock();
        let pamphlet = Arc::new(Pamphlet {
            calls: AtomicUsize::new(0),
            now: time.now(),
        });
        let mut registry = SourceRegistry::new();
        registry
            .register(
                JurisdictionPattern::for_state("IL").unwrap(),
                FactDomain::InstructionalContent,
                pamphlet.clone(),
                0.9,
            )
            .unwrap();
        let engine = engine_with(registry, time);

        let first = engine
            .instructional("il", d(2026, 3, 1), VotingType::MailIn)
            .await
            .unwrap();
        assert_eq!(first.state, "IL");
        assert_eq!(first.source_id, "il_pamphlet");
        assert!(first.content.body.contains("ballot by mail"));

        let second = engine
            .instructional("IL", d(2026, 3, 1), VotingType::MailIn)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(pamphlet.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_instructional_sources_failing_is_a_typed_error() {
        let time = clock();
        let mut registry = SourceRegistry::new();
        registry
            .register(
                JurisdictionPattern::any(),
                FactDomain::InstructionalContent,
                Arc::new(DownFeed {
                    calls: AtomicUsize::new(0),
                }),
                0.2,
            )
            .unwrap();
        let engine = engine_with(registry, time);

        let err = engine
            .instructional("RI", d(2026, 3, 1), VotingType::ElectionDay)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::AllSourcesFailed {
                domain: FactDomain::InstructionalContent
            }
        ));
    }

    #[tokio::test]
    async fn conflicting_sources_mark_provenance_and_keep_winner() {
        struct DateOnly {
            source_id: &'static str,
            date: NaiveDate,
            now: chrono::DateTime<Utc>,
        }

        #[async_trait]
        impl Adapter for DateOnly {
            fn source_id(&self) -> &str {
                self.source_id
            }

            async fn fetch(&self, _query: &AdapterQuery) -> Result<Vec<FactValue>> {
                Ok(vec![FactValue::new(
                    FactField::ElectionDay,
                    FactPayload::Date(self.date),
                    self.source_id,
                    self.now,
                    1.0,
                )?])
            }
        }

        let time = clock();
        let mut registry = SourceRegistry::new();
        registry
            .register(
                JurisdictionPattern::for_state("IL").unwrap(),
                FactDomain::ElectionDates,
                Arc::new(DateOnly {
                    source_id: "official",
                    date: d(2026, 11, 3),
                    now: time.now(),
                }),
                0.9,
            )
            .unwrap();
        registry
            .register(
                JurisdictionPattern::for_state("IL").unwrap(),
                FactDomain::ElectionDates,
                Arc::new(DateOnly {
                    source_id: "web_search",
                    date: d(2026, 11, 4),
                    now: time.now(),
                }),
                0.5,
            )
            .unwrap();
        let engine = engine_with(registry, time);

        let resolution = engine
            .resolve(&jurisdiction(), d(2026, 3, 1), &FreshnessRequirement::default())
            .await
            .unwrap();
        let election = resolution.election();
        assert_eq!(election.election_day, Some(d(2026, 11, 3)));
        let provenance = election
            .field_provenance
            .get(&FactField::ElectionDay)
            .unwrap();
        assert!(provenance.conflicted);
        assert_eq!(provenance.source_id, "official");
        assert_eq!(provenance.alternatives.len(), 1);
        assert_eq!(provenance.alternatives[0].source_id, "web_search");
    }
}
