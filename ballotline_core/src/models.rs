use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A state + district/precinct pair, valid as of a specific date.
///
/// District boundaries can change between election cycles, so a resolved
/// jurisdiction is always stamped with the as-of date used to resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    /// Two-letter USPS state code, uppercased.
    pub state: String,
    pub district_or_precinct: String,
    /// IANA time zone name, e.g. "America/Chicago".
    pub time_zone: String,
    pub as_of: NaiveDate,
}

impl Jurisdiction {
    #[tracing::instrument(level = "debug")]
    pub fn new(
        state: impl Into<String> + std::fmt::Debug,
        district_or_precinct: impl Into<String> + std::fmt::Debug,
        time_zone: impl Into<String> + std::fmt::Debug,
        as_of: NaiveDate,
    ) -> Result<Self> {
        let state = state.into().trim().to_ascii_uppercase();
        if state.len() != 2 || !state.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::InvalidInput(format!(
                "state must be a two-letter code, got '{state}'"
            )));
        }
        let district_or_precinct = district_or_precinct.into();
        if district_or_precinct.trim().is_empty() {
            return Err(Error::InvalidInput(
                "district_or_precinct is empty".to_string(),
            ));
        }
        let time_zone = time_zone.into();
        if time_zone.trim().is_empty() {
            return Err(Error::InvalidInput("time_zone is empty".to_string()));
        }
        Ok(Self {
            state,
            district_or_precinct,
            time_zone,
            as_of,
        })
    }

    /// Stable key used by the cache and the single-flight map.
    ///
    /// The as-of date is deliberately excluded: a boundary change shows up as
    /// a different district, not a different key for the same district.
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.state, self.district_or_precinct)
    }
}

/// Every individually arbitrated field on a resolved election record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FactField {
    ElectionDay,
    EarlyVotingStart,
    EarlyVotingEnd,
    MailRequestDeadline,
    MailSendDeadline,
    MailReceivedDeadline,
    Races,
    BallotQuestions,
    InstructionalContent,
    PollingLocations,
}

impl FactField {
    /// The registry/cache granularity this field belongs to.
    pub fn domain(&self) -> FactDomain {
        match self {
            FactField::ElectionDay
            | FactField::EarlyVotingStart
            | FactField::EarlyVotingEnd
            | FactField::MailRequestDeadline
            | FactField::MailSendDeadline
            | FactField::MailReceivedDeadline => FactDomain::ElectionDates,
            FactField::Races => FactDomain::Races,
            FactField::BallotQuestions => FactDomain::BallotQuestions,
            FactField::InstructionalContent => FactDomain::InstructionalContent,
            FactField::PollingLocations => FactDomain::PollingLocations,
        }
    }

    /// Deadline-type fields get stricter staleness limits than informational
    /// content.
    pub fn is_deadline(&self) -> bool {
        matches!(
            self,
            FactField::ElectionDay
                | FactField::EarlyVotingStart
                | FactField::EarlyVotingEnd
                | FactField::MailRequestDeadline
                | FactField::MailSendDeadline
                | FactField::MailReceivedDeadline
        )
    }
}

/// One fact domain: the unit of source registration and cache storage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FactDomain {
    ElectionDates,
    Races,
    BallotQuestions,
    InstructionalContent,
    PollingLocations,
    Geocoding,
    DistrictBoundaries,
}

impl FactDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactDomain::ElectionDates => "election_dates",
            FactDomain::Races => "races",
            FactDomain::BallotQuestions => "ballot_questions",
            FactDomain::InstructionalContent => "instructional_content",
            FactDomain::PollingLocations => "polling_locations",
            FactDomain::Geocoding => "geocoding",
            FactDomain::DistrictBoundaries => "district_boundaries",
        }
    }
}

impl std::fmt::Display for FactDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate on a ballot race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub party: Option<String>,
}

/// A race (office contest) with its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    pub name: String,
    pub candidates: Vec<Candidate>,
}

impl Race {
    #[tracing::instrument(level = "debug", skip(candidates))]
    pub fn new(
        name: impl Into<String> + std::fmt::Debug,
        candidates: Vec<Candidate>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("race name is empty".to_string()));
        }
        Ok(Self { name, candidates })
    }
}

/// A ballot measure with its ordered, distinct answer options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotQuestion {
    pub question_text: String,
    pub allowed_answers: Vec<String>,
}

impl BallotQuestion {
    #[tracing::instrument(level = "debug", skip(allowed_answers))]
    pub fn new(
        question_text: impl Into<String> + std::fmt::Debug,
        allowed_answers: Vec<String>,
    ) -> Result<Self> {
        let question_text = question_text.into();
        if question_text.trim().is_empty() {
            return Err(Error::InvalidInput("question_text is empty".to_string()));
        }
        if allowed_answers.is_empty() {
            return Err(Error::InvalidInput(
                "allowed_answers must not be empty".to_string(),
            ));
        }
        for (idx, answer) in allowed_answers.iter().enumerate() {
            if answer.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "allowed_answers[{idx}] is empty"
                )));
            }
            if allowed_answers[..idx].contains(answer) {
                return Err(Error::InvalidInput(format!(
                    "allowed_answers contains duplicate '{answer}'"
                )));
            }
        }
        Ok(Self {
            question_text,
            allowed_answers,
        })
    }
}

/// WGS-84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[tracing::instrument(level = "debug")]
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidInput(format!(
                "latitude out of range: {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidInput(format!(
                "longitude out of range: {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// A polling place valid for one election date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingLocation {
    pub id: String,
    pub address: String,
    pub coordinates: Option<GeoPoint>,
    pub opens_at: Option<NaiveTime>,
    pub closes_at: Option<NaiveTime>,
    pub valid_for_date: NaiveDate,
}

impl PollingLocation {
    #[tracing::instrument(level = "debug")]
    pub fn new(
        id: impl Into<String> + std::fmt::Debug,
        address: impl Into<String> + std::fmt::Debug,
        coordinates: Option<GeoPoint>,
        opens_at: Option<NaiveTime>,
        closes_at: Option<NaiveTime>,
        valid_for_date: NaiveDate,
    ) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidInput("polling location id is empty".to_string()));
        }
        let address = address.into();
        if address.trim().is_empty() {
            return Err(Error::InvalidInput(
                "polling location address is empty".to_string(),
            ));
        }
        Ok(Self {
            id,
            address,
            coordinates,
            opens_at,
            closes_at,
            valid_for_date,
        })
    }
}

/// Normalized instructional copy pulled from a state page or feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub title: Option<String>,
    pub source_url: Option<String>,
    pub body: String,
}

impl TextContent {
    #[tracing::instrument(level = "debug", skip(body))]
    pub fn new(
        title: Option<String>,
        source_url: Option<String>,
        body: impl Into<String> + std::fmt::Debug,
    ) -> Result<Self> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(Error::InvalidInput("text content body is empty".to_string()));
        }
        Ok(Self {
            title,
            source_url,
            body,
        })
    }
}

/// The value half of a claim; kind must match the claimed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FactPayload {
    Date(NaiveDate),
    Races(Vec<Race>),
    Questions(Vec<BallotQuestion>),
    Text(TextContent),
    Locations(Vec<PollingLocation>),
}

impl FactPayload {
    fn matches(&self, field: FactField) -> bool {
        match (self, field) {
            (FactPayload::Date(_), f) if f.is_deadline() => true,
            (FactPayload::Races(_), FactField::Races) => true,
            (FactPayload::Questions(_), FactField::BallotQuestions) => true,
            (FactPayload::Text(_), FactField::InstructionalContent) => true,
            (FactPayload::Locations(_), FactField::PollingLocations) => true,
            _ => false,
        }
    }
}

/// One claim about one field, as returned by an adapter.
///
/// Every scalar field on `Election` is conceptually one of these, not a bare
/// value; bare values only exist after arbitration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactValue {
    pub field: FactField,
    pub payload: FactPayload,
    pub source_id: String,
    pub fetched_at: DateTime<Utc>,
    /// Source-reported confidence in [0,1].
    pub confidence: f64,
}

impl FactValue {
    #[tracing::instrument(level = "debug", skip(payload))]
    pub fn new(
        field: FactField,
        payload: FactPayload,
        source_id: impl Into<String> + std::fmt::Debug,
        fetched_at: DateTime<Utc>,
        confidence: f64,
    ) -> Result<Self> {
        let source_id = source_id.into();
        if source_id.trim().is_empty() {
            return Err(Error::InvalidInput("source_id is empty".to_string()));
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(Error::InvalidInput(format!(
                "confidence must be finite and in [0,1], got {confidence}"
            )));
        }
        if !payload.matches(field) {
            return Err(Error::InvalidInput(format!(
                "payload kind does not match field {field:?}"
            )));
        }
        Ok(Self {
            field,
            payload,
            source_id,
            fetched_at,
            confidence,
        })
    }
}

/// A losing claim kept alongside the winner instead of being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeClaim {
    pub payload: FactPayload,
    pub source_id: String,
    pub fetched_at: DateTime<Utc>,
    pub confidence: f64,
    pub trust_weight: f64,
}

/// Where a resolved field value came from, and how contested it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub source_id: String,
    pub fetched_at: DateTime<Utc>,
    pub confidence: f64,
    pub trust_weight: f64,
    /// True when surviving sources disagreed beyond the field tolerance.
    pub conflicted: bool,
    pub alternatives: Vec<AlternativeClaim>,
}

/// A field value that survived arbitration, with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitratedField {
    pub payload: FactPayload,
    pub provenance: FieldProvenance,
}

/// Arbitrated output for one (jurisdiction, domain) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainFacts {
    pub domain: FactDomain,
    pub fields: BTreeMap<FactField, ArbitratedField>,
}

impl DomainFacts {
    pub fn new(domain: FactDomain) -> Self {
        Self {
            domain,
            fields: BTreeMap::new(),
        }
    }

    pub fn is_conflicted(&self) -> bool {
        self.fields.values().any(|f| f.provenance.conflicted)
    }

    /// Highest winning-claim confidence across fields; used by the cache
    /// supersede rule.
    pub fn peak_confidence(&self) -> f64 {
        self.fields
            .values()
            .map(|f| f.provenance.confidence)
            .fold(0.0, f64::max)
    }
}

/// One cached record for a (jurisdiction, domain) key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub facts: DomainFacts,
    pub resolved_at: DateTime<Utc>,
    pub ttl: Duration,
    /// Set when sources disagreed beyond tolerance; conflicted entries are
    /// re-resolved on the next read instead of being served.
    pub conflicted: bool,
}

impl CacheEntry {
    #[tracing::instrument(level = "debug", skip(facts))]
    pub fn new(facts: DomainFacts, resolved_at: DateTime<Utc>, ttl: Duration) -> Self {
        let conflicted = facts.is_conflicted();
        Self {
            facts,
            resolved_at,
            ttl,
            conflicted,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        now >= self.resolved_at + ttl
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.resolved_at
    }
}

/// The canonical reconciled record for one jurisdiction.
///
/// Unknown fields are `None`, never defaulted to a guessed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    pub jurisdiction: Jurisdiction,
    pub election_day: Option<NaiveDate>,
    pub early_voting_start: Option<NaiveDate>,
    pub early_voting_end: Option<NaiveDate>,
    pub mail_request_deadline: Option<NaiveDate>,
    pub mail_send_deadline: Option<NaiveDate>,
    /// May legitimately fall after election day (post-marked ballots).
    pub mail_received_deadline: Option<NaiveDate>,
    pub races: Option<Vec<Race>>,
    pub ballot_questions: Option<Vec<BallotQuestion>>,
    pub field_provenance: BTreeMap<FactField, FieldProvenance>,
}

/// The fields a complete record must carry; anything here left unknown makes
/// the resolution partial.
pub const REQUIRED_FIELDS: [FactField; 8] = [
    FactField::ElectionDay,
    FactField::EarlyVotingStart,
    FactField::EarlyVotingEnd,
    FactField::MailRequestDeadline,
    FactField::MailSendDeadline,
    FactField::MailReceivedDeadline,
    FactField::Races,
    FactField::BallotQuestions,
];

impl Election {
    pub fn empty(jurisdiction: Jurisdiction) -> Self {
        Self {
            jurisdiction,
            election_day: None,
            early_voting_start: None,
            early_voting_end: None,
            mail_request_deadline: None,
            mail_send_deadline: None,
            mail_received_deadline: None,
            races: None,
            ballot_questions: None,
            field_provenance: BTreeMap::new(),
        }
    }

    fn date_field(&self, field: FactField) -> Option<NaiveDate> {
        match field {
            FactField::ElectionDay => self.election_day,
            FactField::EarlyVotingStart => self.early_voting_start,
            FactField::EarlyVotingEnd => self.early_voting_end,
            FactField::MailRequestDeadline => self.mail_request_deadline,
            FactField::MailSendDeadline => self.mail_send_deadline,
            FactField::MailReceivedDeadline => self.mail_received_deadline,
            _ => None,
        }
    }

    fn is_known(&self, field: FactField) -> bool {
        match field {
            FactField::Races => self.races.is_some(),
            FactField::BallotQuestions => self.ballot_questions.is_some(),
            f if f.is_deadline() => self.date_field(f).is_some(),
            _ => false,
        }
    }

    /// Required fields still unknown after resolution.
    pub fn unknown_fields(&self) -> Vec<FactField> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| !self.is_known(*f))
            .collect()
    }

    /// Ordering invariants between known dates.
    ///
    /// `mail_received_deadline` after election day is allowed (post-marked
    /// ballots) and is deliberately not checked.
    pub fn check_date_ordering(&self) -> Result<()> {
        let pairs: [(FactField, FactField); 6] = [
            (FactField::EarlyVotingStart, FactField::EarlyVotingEnd),
            (FactField::EarlyVotingEnd, FactField::ElectionDay),
            (FactField::EarlyVotingStart, FactField::ElectionDay),
            (FactField::MailRequestDeadline, FactField::MailSendDeadline),
            (FactField::MailSendDeadline, FactField::ElectionDay),
            (FactField::MailRequestDeadline, FactField::ElectionDay),
        ];
        for (earlier, later) in pairs {
            if let (Some(a), Some(b)) = (self.date_field(earlier), self.date_field(later)) {
                if a > b {
                    return Err(Error::InvalidInput(format!(
                        "{earlier:?} ({a}) is after {later:?} ({b})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The outcome of an election resolution: complete, or partial with the
/// unknown fields named explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ElectionResolution {
    Complete {
        election: Election,
    },
    Partial {
        election: Election,
        unknown_fields: Vec<FactField>,
    },
}

impl ElectionResolution {
    /// Classify an assembled record by its unknown required fields.
    pub fn from_election(election: Election) -> Self {
        let unknown = election.unknown_fields();
        if unknown.is_empty() {
            ElectionResolution::Complete { election }
        } else {
            ElectionResolution::Partial {
                election,
                unknown_fields: unknown,
            }
        }
    }

    pub fn election(&self) -> &Election {
        match self {
            ElectionResolution::Complete { election } => election,
            ElectionResolution::Partial { election, .. } => election,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, ElectionResolution::Partial { .. })
    }
}

/// Which voting channel instructional content is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingType {
    ElectionDay,
    EarlyInPerson,
    MailIn,
}

impl VotingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingType::ElectionDay => "election_day",
            VotingType::EarlyInPerson => "early_in_person",
            VotingType::MailIn => "mail_in",
        }
    }
}

/// Instructional copy resolved for a state and voting channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionalContent {
    pub state: String,
    pub voting_type: VotingType,
    pub content: TextContent,
    pub source_id: String,
    pub fetched_at: DateTime<Utc>,
}

/// A district boundary valid over an effective-date range.
///
/// Boundary data is versioned by effective date rather than kept as a single
/// mutable table; lookups pass the as-of date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictBoundary {
    pub state: String,
    pub district: String,
    pub time_zone: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl DistrictBoundary {
    pub fn covers(&self, as_of: NaiveDate) -> bool {
        as_of >= self.effective_from && self.effective_to.map_or(true, |end| as_of < end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn jurisdiction() -> Jurisdiction {
        Jurisdiction::new("il", "SPRINGFIELD-07", "America/Chicago", d(2026, 3, 1)).unwrap()
    }

    #[test]
    fn jurisdiction_uppercases_state_and_validates() {
        let j = jurisdiction();
        assert_eq!(j.state, "IL");
        assert_eq!(j.cache_key(), "IL/SPRINGFIELD-07");

        assert!(Jurisdiction::new("Illinois", "p1", "America/Chicago", d(2026, 3, 1)).is_err());
        assert!(Jurisdiction::new("IL", "", "America/Chicago", d(2026, 3, 1)).is_err());
    }

    #[test]
    fn ballot_question_rejects_duplicate_or_empty_answers() {
        assert!(BallotQuestion::new("Q", vec!["Yes".into(), "No".into()]).is_ok());
        assert!(BallotQuestion::new("Q", vec![]).is_err());
        assert!(BallotQuestion::new("Q", vec!["Yes".into(), "Yes".into()]).is_err());
        assert!(BallotQuestion::new("Q", vec!["Yes".into(), " ".into()]).is_err());
    }

    #[test]
    fn fact_value_rejects_mismatched_payload_kind() {
        let err = FactValue::new(
            FactField::Races,
            FactPayload::Date(d(2026, 11, 3)),
            "feed",
            Utc::now(),
            0.9,
        );
        assert!(err.is_err());

        let ok = FactValue::new(
            FactField::ElectionDay,
            FactPayload::Date(d(2026, 11, 3)),
            "feed",
            Utc::now(),
            0.9,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn fact_value_rejects_out_of_range_confidence() {
        for bad in [-0.1, 1.1, f64::NAN] {
            assert!(FactValue::new(
                FactField::ElectionDay,
                FactPayload::Date(d(2026, 11, 3)),
                "feed",
                Utc::now(),
                bad,
            )
            .is_err());
        }
    }

    #[test]
    fn date_ordering_invariants() {
        let mut e = Election::empty(jurisdiction());
        e.early_voting_start = Some(d(2026, 10, 19));
        e.early_voting_end = Some(d(2026, 10, 30));
        e.election_day = Some(d(2026, 11, 3));
        e.mail_request_deadline = Some(d(2026, 10, 20));
        e.mail_send_deadline = Some(d(2026, 10, 27));
        // Post-marked ballots may arrive after election day; not an error.
        e.mail_received_deadline = Some(d(2026, 11, 10));
        assert!(e.check_date_ordering().is_ok());

        e.early_voting_start = Some(d(2026, 11, 1));
        e.early_voting_end = Some(d(2026, 10, 30));
        assert!(e.check_date_ordering().is_err());
    }

    #[test]
    fn unknown_fields_drive_partial_classification() {
        let mut e = Election::empty(jurisdiction());
        e.election_day = Some(d(2026, 11, 3));
        let resolution = ElectionResolution::from_election(e.clone());
        assert!(resolution.is_partial());

        e.early_voting_start = Some(d(2026, 10, 19));
        e.early_voting_end = Some(d(2026, 10, 30));
        e.mail_request_deadline = Some(d(2026, 10, 20));
        e.mail_send_deadline = Some(d(2026, 10, 27));
        e.mail_received_deadline = Some(d(2026, 11, 3));
        e.races = Some(vec![]);
        e.ballot_questions = Some(vec![]);
        assert!(e.unknown_fields().is_empty());
        assert!(!ElectionResolution::from_election(e).is_partial());
    }

    #[test]
    fn cache_entry_expiry_is_clock_driven() {
        let resolved_at = Utc::now();
        let entry = CacheEntry::new(
            DomainFacts::new(FactDomain::ElectionDates),
            resolved_at,
            Duration::from_secs(3600),
        );
        assert!(!entry.is_expired(resolved_at));
        assert!(!entry.is_expired(resolved_at + chrono::Duration::minutes(59)));
        assert!(entry.is_expired(resolved_at + chrono::Duration::hours(1)));
    }

    #[test]
    fn fact_payload_serializes_with_adjacent_tag() {
        let payload = FactPayload::Date(d(2026, 11, 3));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "date");
        assert_eq!(json["value"], "2026-11-03");

        let races = FactPayload::Races(vec![Race::new("Governor", vec![]).unwrap()]);
        let json = serde_json::to_value(&races).unwrap();
        assert_eq!(json["kind"], "races");
        assert_eq!(json["value"][0]["name"], "Governor");

        let back: FactPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, races);
    }

    #[test]
    fn resolution_serializes_with_snake_case_tags_and_field_keys() {
        use chrono::TimeZone;

        let mut e = Election::empty(jurisdiction());
        e.election_day = Some(d(2026, 11, 3));
        e.field_provenance.insert(
            FactField::ElectionDay,
            FieldProvenance {
                source_id: "state_feed:il".to_string(),
                fetched_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
                confidence: 0.95,
                trust_weight: 0.9,
                conflicted: false,
                alternatives: vec![],
            },
        );
        let resolution = ElectionResolution::from_election(e);
        let json = serde_json::to_value(&resolution).unwrap();

        assert_eq!(json["status"], "partial");
        assert_eq!(json["election"]["election_day"], "2026-11-03");
        assert_eq!(
            json["election"]["field_provenance"]["election_day"]["source_id"],
            "state_feed:il"
        );
        assert!(json["unknown_fields"]
            .as_array()
            .unwrap()
            .contains(&serde_json::Value::String("races".to_string())));

        let back: ElectionResolution = serde_json::from_value(json).unwrap();
        assert_eq!(back, resolution);
    }

    #[test]
    fn boundary_coverage_is_half_open() {
        let b = DistrictBoundary {
            state: "IL".to_string(),
            district: "SPRINGFIELD-07".to_string(),
            time_zone: "America/Chicago".to_string(),
            effective_from: d(2022, 1, 1),
            effective_to: Some(d(2026, 1, 1)),
        };
        assert!(b.covers(d(2022, 1, 1)));
        assert!(b.covers(d(2025, 12, 31)));
        assert!(!b.covers(d(2026, 1, 1)));
        assert!(!b.covers(d(2021, 12, 31)));
    }
}
