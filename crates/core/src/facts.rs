#![forbid(unsafe_code)]

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    Positive,
    Negative,
}

impl Rating {
    pub fn opposite(self) -> Self {
        match self {
            Rating::Positive => Rating::Negative,
            Rating::Negative => Rating::Positive,
        }
    }
}

/// Provenance: `Ai` for machine-inferred facts, `Ni` for human-confirmed ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intelligence {
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "NI")]
    Ni,
}

/// Fixed processing order of analysis modules. Dispatch follows this order,
/// never registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Import,
    Lemmatization,
    Discovery,
    Terminology,
    Embedding,
    Gazetteer,
    Review,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Import,
        Phase::Lemmatization,
        Phase::Discovery,
        Phase::Terminology,
        Phase::Embedding,
        Phase::Gazetteer,
        Phase::Review,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Import => "import",
            Phase::Lemmatization => "lemmatization",
            Phase::Discovery => "discovery",
            Phase::Terminology => "terminology",
            Phase::Embedding => "embedding",
            Phase::Gazetteer => "gazetteer",
            Phase::Review => "review",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub rating: Rating,
    pub intelligence: Intelligence,
    pub confidence: f64,
    pub phase: Phase,
    pub timestamp_ms: i64,
}

impl Assertion {
    pub fn try_new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        rating: Rating,
        intelligence: Intelligence,
        confidence: f64,
        phase: Phase,
    ) -> Result<Self, SchemaError> {
        let assertion = Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            rating,
            intelligence,
            confidence,
            phase,
            timestamp_ms: now_ms(),
        };
        assertion.validate()?;
        Ok(assertion)
    }

    /// Confidence must lie in `[0, 1]`.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SchemaError::InvalidConfidence(self.confidence));
        }
        Ok(())
    }

    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        let nanos = i128::from(self.timestamp_ms) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    pub fn is_positive(&self) -> bool {
        self.rating == Rating::Positive
    }

    pub fn is_human(&self) -> bool {
        self.intelligence == Intelligence::Ni
    }

    pub fn concerns(&self, subject: &str, predicate: &str) -> bool {
        self.subject == subject && self.predicate == predicate
    }

    /// Retraction is a new fact with the opposite rating; history is never edited.
    pub fn retraction(&self, intelligence: Intelligence, confidence: f64) -> Result<Self, SchemaError> {
        Self::try_new(
            self.subject.clone(),
            self.predicate.clone(),
            self.object.clone(),
            self.rating.opposite(),
            intelligence,
            confidence,
            self.phase,
        )
    }
}

/// Picks the authoritative assertion among candidates about one subject/predicate.
///
/// The first positive human assertion wins outright. Otherwise the positive
/// machine assertion with the highest confidence wins, earliest first on ties.
/// Without any positive candidate there is no authoritative value.
pub fn resolve<'a, I>(candidates: I) -> Option<&'a Assertion>
where
    I: IntoIterator<Item = &'a Assertion>,
{
    let mut best: Option<&'a Assertion> = None;
    for candidate in candidates {
        if !candidate.is_positive() {
            continue;
        }
        if candidate.is_human() {
            return Some(candidate);
        }
        if best.is_none_or(|current| candidate.confidence > current.confidence) {
            best = Some(candidate);
        }
    }
    best
}

pub(crate) fn now_ms() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(nanos).unwrap_or(i64::MAX)
}
