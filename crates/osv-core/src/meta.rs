//! Fetch metadata and schema versioning.
//!
//! [`FetchMeta`] is written by a backend after every successful ingest and
//! read before every ingest or server start. A store whose recorded schema
//! version differs from [`LATEST_SCHEMA_VERSION`] is outdated and must not be
//! used until it is discarded and re-ingested.

use serde::{Deserialize, Serialize};

/// Schema version produced by this build.
pub const LATEST_SCHEMA_VERSION: u32 = 1;

/// Identity of the running build, injected into every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildStamp {
    pub revision: &'static str,
    pub schema_version: u32,
}

impl BuildStamp {
    /// The stamp of this binary. `OSV_REVISION` may be set at compile time
    /// to a VCS revision; otherwise the crate version is used.
    pub const CURRENT: BuildStamp = BuildStamp {
        revision: match option_env!("OSV_REVISION") {
            Some(revision) => revision,
            None => env!("CARGO_PKG_VERSION"),
        },
        schema_version: LATEST_SCHEMA_VERSION,
    };
}

impl Default for BuildStamp {
    fn default() -> Self {
        BuildStamp::CURRENT
    }
}

/// Marker of the last successful ingest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchMeta {
    /// Revision of the build that wrote the store.
    pub revision: String,
    pub schema_version: u32,
}

impl FetchMeta {
    /// A fresh marker carrying the given build's identity.
    pub fn for_stamp(stamp: &BuildStamp) -> Self {
        FetchMeta {
            revision: stamp.revision.to_string(),
            schema_version: stamp.schema_version,
        }
    }

    /// Whether the store was written with a schema this build cannot read.
    ///
    /// Newer versions are as incompatible as older ones.
    pub fn is_outdated(&self) -> bool {
        self.schema_version != LATEST_SCHEMA_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_zero_is_outdated() {
        let meta = FetchMeta {
            schema_version: 0,
            ..FetchMeta::default()
        };
        assert!(meta.is_outdated());
    }

    #[test]
    fn test_latest_schema_is_current() {
        let meta = FetchMeta {
            schema_version: LATEST_SCHEMA_VERSION,
            ..FetchMeta::default()
        };
        assert!(!meta.is_outdated());
    }

    #[test]
    fn test_newer_schema_is_outdated() {
        let meta = FetchMeta {
            schema_version: LATEST_SCHEMA_VERSION + 1,
            ..FetchMeta::default()
        };
        assert!(meta.is_outdated());
    }

    #[test]
    fn test_for_stamp_copies_build_identity() {
        let stamp = BuildStamp {
            revision: "abc123",
            schema_version: LATEST_SCHEMA_VERSION,
        };
        let meta = FetchMeta::for_stamp(&stamp);
        assert_eq!(meta.revision, "abc123");
        assert!(!meta.is_outdated());
        assert_eq!(BuildStamp::default(), BuildStamp::CURRENT);
    }
}
