//! Feed records -> canonical advisories.
//!
//! [`convert`] is pure and fail-fast: the first unparseable timestamp aborts
//! the whole batch and nothing is returned, so a backend never ingests a
//! partially converted feed.

use chrono::{DateTime, Utc};

use crate::ecosystem::EcosystemType;
use crate::error::ConvertError;
use crate::feed::OsvJson;
use crate::model::{
    withdrawn_never, Advisory, AffectedRange, AffectedVersion, Affects, Alias, DatabaseSpecific,
    EcosystemSpecific, Package, Reference, Related,
};

/// Converts a batch of feed records published for `ecosystem`.
///
/// Output order follows input order. An empty batch converts to an empty
/// vector.
pub fn convert(ecosystem: EcosystemType, records: &[OsvJson]) -> Result<Vec<Advisory>, ConvertError> {
    records
        .iter()
        .map(|record| convert_one(ecosystem, record))
        .collect()
}

fn convert_one(ecosystem: EcosystemType, record: &OsvJson) -> Result<Advisory, ConvertError> {
    let published = parse_timestamp(ecosystem, &record.id, "published", &record.published)?;
    let modified = parse_timestamp(ecosystem, &record.id, "modified", &record.modified)?;
    let withdrawn = match record.withdrawn.as_deref() {
        Some(value) if !value.is_empty() => {
            parse_timestamp(ecosystem, &record.id, "withdrawn", value)?
        }
        _ => withdrawn_never(),
    };

    // Feeds occasionally omit the package ecosystem; the batch tag is what
    // replacement is scoped by, so fall back to it.
    let package_ecosystem = if record.package.ecosystem.is_empty() {
        ecosystem.as_str().to_string()
    } else {
        record.package.ecosystem.clone()
    };

    Ok(Advisory {
        entry_id: record.id.clone(),
        published,
        modified,
        withdrawn,
        aliases: record
            .aliases
            .iter()
            .map(|alias| Alias { alias: alias.clone() })
            .collect(),
        related: record
            .related
            .iter()
            .map(|related| Related { related: related.clone() })
            .collect(),
        package: Package {
            ecosystem: package_ecosystem,
            name: record.package.name.clone(),
            purl: record.package.purl.clone(),
        },
        summary: record.summary.clone(),
        details: record.details.clone(),
        affects: Affects {
            ranges: record
                .affects
                .ranges
                .iter()
                .map(|range| AffectedRange {
                    range_type: range.range_type.clone(),
                    repo: range.repo.clone(),
                    introduced: range.introduced.clone(),
                    fixed: range.fixed.clone(),
                })
                .collect(),
            versions: record
                .affects
                .versions
                .iter()
                .map(|version| AffectedVersion { version: version.clone() })
                .collect(),
        },
        references: record
            .references
            .iter()
            .map(|reference| Reference {
                ref_type: reference.ref_type.clone(),
                url: reference.url.clone(),
            })
            .collect(),
        severity: record.severity.clone(),
        ecosystem_specific: EcosystemSpecific::default(),
        database_specific: DatabaseSpecific::default(),
    })
}

fn parse_timestamp(
    ecosystem: EcosystemType,
    id: &str,
    field: &'static str,
    value: &str,
) -> Result<DateTime<Utc>, ConvertError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|source| ConvertError::InvalidTimestamp {
            ecosystem: ecosystem.to_string(),
            id: id.to_string(),
            field,
            value: value.to_string(),
            source,
        })
}
