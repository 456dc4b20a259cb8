//! Raw OSV feed records.
//!
//! [`OsvJson`] mirrors one `<ID>.json` file from an ecosystem's feed archive.
//! Every field is lenient: missing keys and explicit `null`s both decode to
//! the empty value, so the converter only has to validate timestamps.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConvertError;

/// One advisory exactly as published in a feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsvJson {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub published: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modified: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawn: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub aliases: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub related: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub package: PackageJson,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub affects: AffectsJson,
    #[serde(default, deserialize_with = "null_as_default")]
    pub references: Vec<ReferenceJson>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: String,
    #[serde(default)]
    pub ecosystem_specific: serde_json::Value,
    #[serde(default)]
    pub database_specific: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageJson {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ecosystem: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub purl: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffectsJson {
    #[serde(default, deserialize_with = "null_as_default")]
    pub ranges: Vec<RangeJson>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeJson {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub range_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repo: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub introduced: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fixed: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceJson {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub ref_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes a single feed file.
pub fn parse_feed_record(bytes: &[u8]) -> Result<OsvJson, ConvertError> {
    Ok(serde_json::from_slice(bytes)?)
}
