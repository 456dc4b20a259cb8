//! Supported advisory ecosystems.
//!
//! The tag strings are the exact directory names used by the upstream feed
//! bucket and the values written into `package.ecosystem`, so they double as
//! storage discriminators and must never change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One of the six ecosystems advisories are published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EcosystemType {
    #[serde(rename = "crates.io")]
    CratesIo,
    #[serde(rename = "DWF")]
    Dwf,
    #[serde(rename = "Go")]
    Go,
    #[serde(rename = "Linux")]
    Linux,
    #[serde(rename = "OSS-Fuzz")]
    OssFuzz,
    #[serde(rename = "PyPI")]
    PyPi,
}

impl EcosystemType {
    /// Every supported ecosystem, in tag order.
    pub const ALL: [EcosystemType; 6] = [
        EcosystemType::CratesIo,
        EcosystemType::Dwf,
        EcosystemType::Go,
        EcosystemType::Linux,
        EcosystemType::OssFuzz,
        EcosystemType::PyPi,
    ];

    /// The canonical tag string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EcosystemType::CratesIo => "crates.io",
            EcosystemType::Dwf => "DWF",
            EcosystemType::Go => "Go",
            EcosystemType::Linux => "Linux",
            EcosystemType::OssFuzz => "OSS-Fuzz",
            EcosystemType::PyPi => "PyPI",
        }
    }
}

impl fmt::Display for EcosystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EcosystemType {
    type Err = CoreError;

    /// Accepts the canonical tag or the lowercase command-line spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(eco) = EcosystemType::ALL.iter().find(|e| e.as_str() == s) {
            return Ok(*eco);
        }
        match s {
            "cratesio" | "crates-io" => Ok(EcosystemType::CratesIo),
            "dwf" => Ok(EcosystemType::Dwf),
            "go" => Ok(EcosystemType::Go),
            "linux" => Ok(EcosystemType::Linux),
            "oss-fuzz" | "ossfuzz" => Ok(EcosystemType::OssFuzz),
            "pypi" => Ok(EcosystemType::PyPi),
            _ => Err(CoreError::UnknownEcosystem { tag: s.to_string() }),
        }
    }
}
