//! Canonical, backend-agnostic advisory records.
//!
//! An [`Advisory`] owns every child record by value. Graphs are built
//! wholesale by [`crate::convert`], stored wholesale, and replaced wholesale;
//! nothing here is mutated field-by-field after conversion.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Stand-in for "not withdrawn": 1000-01-01T00:00:00Z.
///
/// Storage never has to deal with a nullable withdrawal column.
pub fn withdrawn_never() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1000, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// One vulnerability record for one package in one ecosystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    /// Feed-assigned identifier, e.g. `RUSTSEC-2016-0001`. Not unique across
    /// ecosystems.
    pub entry_id: String,
    pub published: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// [`withdrawn_never`] when the advisory was never withdrawn.
    pub withdrawn: DateTime<Utc>,
    pub aliases: Vec<Alias>,
    pub related: Vec<Related>,
    pub package: Package,
    pub summary: String,
    pub details: String,
    pub affects: Affects,
    pub references: Vec<Reference>,
    /// Opaque, ecosystem-dependent severity string.
    pub severity: String,
    pub ecosystem_specific: EcosystemSpecific,
    pub database_specific: DatabaseSpecific,
}

impl Advisory {
    /// Whether the feed marked this advisory as withdrawn.
    pub fn is_withdrawn(&self) -> bool {
        self.withdrawn != withdrawn_never()
    }

    /// The entry id followed by every alias.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.entry_id.as_str()).chain(self.aliases.iter().map(|a| a.alias.as_str()))
    }
}

/// Another identifier for the same advisory (CVE, GHSA, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub alias: String,
}

/// Identifier of a related, but distinct, advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Related {
    pub related: String,
}

/// The affected package. Exactly one per advisory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Package {
    /// Usually an [`crate::EcosystemType`] tag, but kept as free text.
    pub ecosystem: String,
    pub name: String,
    pub purl: String,
}

/// Affected ranges and explicitly enumerated versions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Affects {
    pub ranges: Vec<AffectedRange>,
    pub versions: Vec<AffectedVersion>,
}

/// One affected range, e.g. `SEMVER` or `GIT`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AffectedRange {
    pub range_type: String,
    pub repo: String,
    pub introduced: String,
    /// Empty when the range is still affected at HEAD.
    pub fixed: String,
}

impl AffectedRange {
    pub fn is_fixed(&self) -> bool {
        !self.fixed.is_empty()
    }
}

/// A single affected version string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedVersion {
    pub version: String,
}

/// A typed external link (`ADVISORY`, `FIX`, `PACKAGE`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub ref_type: String,
    pub url: String,
}

/// Presence marker for the feed's `ecosystem_specific` payload.
///
/// The payload shape varies per ecosystem and is not indexed, so only its
/// presence is kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EcosystemSpecific {}

/// Presence marker for the feed's `database_specific` payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DatabaseSpecific {}
