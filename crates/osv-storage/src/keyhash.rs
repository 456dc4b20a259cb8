//! Key-hash implementation of [`VulnStore`].
//!
//! Advisories are denormalized into hashes: one hash per lookup key, one
//! field per ecosystem, each value a JSON-encoded [`Advisory`]. An advisory
//! is written under its package name, its entry id and each of its aliases,
//! all prefixed with [`HASH_KEY_PREFIX`].
//!
//! Ingest is a best-effort upsert. Entries from earlier ingests are never
//! removed, writes for different keys are not atomic, and the first failing
//! record stops the ingest with everything before it already written.
//!
//! The hash server itself sits behind [`HashClient`]: [`RedisHashClient`]
//! talks to Redis, [`MemoryHashClient`] keeps the hashes in process.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, info};

use osv_core::{Advisory, BuildStamp, EcosystemType, FetchMeta};

use crate::error::StorageError;
use crate::traits::{ecosystem_filter, VulnStore};

/// Prefix of every key written by [`KeyHashStore`].
pub const HASH_KEY_PREFIX: &str = "OSV#";

/// One `HSET key field value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashWrite<'a> {
    pub key: String,
    pub field: &'a str,
    pub value: &'a [u8],
}

/// The operations [`KeyHashStore`] needs from a hash server.
pub trait HashClient: Send + Sized {
    /// Dialect name reported by the owning store.
    const DIALECT: &'static str;

    /// Connects to the server at `location`.
    fn connect(location: &str) -> Result<Self, StorageError>;

    /// Sends all writes as one pipelined batch.
    fn hset_all(&self, writes: &[HashWrite<'_>]) -> Result<(), StorageError>;

    /// Returns every field of `key`; a missing key is an empty map.
    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, Vec<u8>>, StorageError>;
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, StorageError> {
    mutex.lock().map_err(|_| StorageError::Backend {
        reason: format!("{what} mutex poisoned"),
    })
}

// ---------------------------------------------------------------------------
// Redis
// ---------------------------------------------------------------------------

/// [`HashClient`] over a synchronous Redis connection.
pub struct RedisHashClient {
    conn: Mutex<redis::Connection>,
}

impl HashClient for RedisHashClient {
    const DIALECT: &'static str = "redis";

    fn connect(location: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(location)?;
        let mut conn = client.get_connection()?;
        let pong: String = redis::cmd("PING").query(&mut conn)?;
        debug!(location, reply = %pong, "connected to redis");
        Ok(RedisHashClient {
            conn: Mutex::new(conn),
        })
    }

    fn hset_all(&self, writes: &[HashWrite<'_>]) -> Result<(), StorageError> {
        let mut pipe = redis::pipe();
        for write in writes {
            pipe.cmd("HSET")
                .arg(&write.key)
                .arg(write.field)
                .arg(write.value)
                .ignore();
        }
        let mut conn = lock(&self.conn, "redis connection")?;
        pipe.query::<()>(&mut *conn)?;
        Ok(())
    }

    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, Vec<u8>>, StorageError> {
        let mut conn = lock(&self.conn, "redis connection")?;
        let fields = redis::cmd("HGETALL").arg(key).query(&mut *conn)?;
        Ok(fields)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// [`HashClient`] keeping hashes in a process-local map. The location passed
/// to `connect` is ignored; every connection starts empty.
#[derive(Debug, Default)]
pub struct MemoryHashClient {
    hashes: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryHashClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn key_count(&self) -> Result<usize, StorageError> {
        Ok(lock(&self.hashes, "memory hash")?.len())
    }
}

impl HashClient for MemoryHashClient {
    const DIALECT: &'static str = "memory";

    fn connect(_location: &str) -> Result<Self, StorageError> {
        Ok(Self::new())
    }

    fn hset_all(&self, writes: &[HashWrite<'_>]) -> Result<(), StorageError> {
        let mut hashes = lock(&self.hashes, "memory hash")?;
        for write in writes {
            hashes
                .entry(write.key.clone())
                .or_default()
                .insert(write.field.to_string(), write.value.to_vec());
        }
        Ok(())
    }

    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, Vec<u8>>, StorageError> {
        let hashes = lock(&self.hashes, "memory hash")?;
        Ok(hashes.get(key).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Denormalized [`VulnStore`] over any [`HashClient`].
pub struct KeyHashStore<C: HashClient> {
    client: Option<C>,
    stamp: BuildStamp,
}

impl<C: HashClient> KeyHashStore<C> {
    /// Creates an unconnected store stamped with the current build.
    pub fn new() -> Self {
        Self::with_stamp(BuildStamp::CURRENT)
    }

    pub fn with_stamp(stamp: BuildStamp) -> Self {
        KeyHashStore {
            client: None,
            stamp,
        }
    }

    /// Wraps an already connected client, stamped with the current build.
    pub fn with_client(client: C) -> Self {
        Self::with_client_and_stamp(client, BuildStamp::CURRENT)
    }

    /// Wraps an already connected client that reports `stamp` as its
    /// FetchMeta.
    pub fn with_client_and_stamp(client: C, stamp: BuildStamp) -> Self {
        KeyHashStore {
            client: Some(client),
            stamp,
        }
    }

    /// The underlying client, if connected.
    pub fn client(&self) -> Option<&C> {
        self.client.as_ref()
    }

    fn connected(&self) -> Result<&C, StorageError> {
        self.client
            .as_ref()
            .ok_or(StorageError::NotOpen { backend: C::DIALECT })
    }

    fn write_all(
        &self,
        ecosystem: EcosystemType,
        advisories: &[Advisory],
    ) -> Result<usize, StorageError> {
        let client = self.connected()?;
        let mut written = 0;
        for advisory in advisories {
            let value = serde_json::to_vec(advisory)?;
            let writes: Vec<HashWrite<'_>> = keys_for(advisory)
                .into_iter()
                .map(|key| HashWrite {
                    key,
                    field: ecosystem.as_str(),
                    value: &value,
                })
                .collect();
            client.hset_all(&writes)?;
            written += 1;
        }
        Ok(written)
    }

    fn find_by_key(
        &self,
        key: &str,
        ecosystem: Option<&str>,
    ) -> Result<Vec<Advisory>, StorageError> {
        let fields = self
            .connected()?
            .hgetall(&format!("{HASH_KEY_PREFIX}{key}"))?;
        let mut advisories = Vec::new();
        match ecosystem_filter(ecosystem) {
            Some(eco) => {
                if let Some(value) = fields.get(eco) {
                    advisories.push(serde_json::from_slice(value)?);
                }
            }
            None => {
                for value in fields.values() {
                    advisories.push(serde_json::from_slice(value)?);
                }
            }
        }
        Ok(advisories)
    }
}

impl<C: HashClient> Default for KeyHashStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Every key an advisory is reachable under, without duplicates.
fn keys_for(advisory: &Advisory) -> BTreeSet<String> {
    std::iter::once(advisory.package.name.as_str())
        .chain(advisory.identifiers())
        .map(|key| format!("{HASH_KEY_PREFIX}{key}"))
        .collect()
}

impl<C: HashClient> VulnStore for KeyHashStore<C> {
    fn name(&self) -> &'static str {
        C::DIALECT
    }

    fn open(&mut self, location: &str, _debug: bool) -> Result<(), StorageError> {
        let client = C::connect(location).map_err(|source| StorageError::Open {
            dialect: C::DIALECT,
            location: location.to_string(),
            source: Box::new(source),
        })?;
        self.client = Some(client);
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.client = None;
        Ok(())
    }

    fn migrate_schema(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn is_legacy_schema(&self) -> Result<bool, StorageError> {
        Ok(false)
    }

    fn fetch_meta(&self) -> Result<FetchMeta, StorageError> {
        Ok(FetchMeta::for_stamp(&self.stamp))
    }

    fn upsert_fetch_meta(&mut self, _meta: &FetchMeta) -> Result<(), StorageError> {
        Ok(())
    }

    fn ingest(
        &mut self,
        ecosystem: EcosystemType,
        advisories: &[Advisory],
    ) -> Result<(), StorageError> {
        match self.write_all(ecosystem, advisories) {
            Ok(written) => {
                info!(%ecosystem, written, backend = C::DIALECT, "ecosystem upserted");
                Ok(())
            }
            Err(source) => {
                error!(%ecosystem, error = %source, "ingest stopped");
                Err(StorageError::Ingest {
                    ecosystem: ecosystem.to_string(),
                    source: Box::new(source),
                })
            }
        }
    }

    fn find_by_id(
        &self,
        id: &str,
        ecosystem: Option<&str>,
    ) -> Result<Vec<Advisory>, StorageError> {
        self.find_by_key(id, ecosystem)
    }

    /// Package names share the `OSV#` key space with entry ids and aliases,
    /// so a name that equals some advisory's identifier also returns that
    /// advisory. This backend cannot tell the two apart.
    fn find_by_package(
        &self,
        name: &str,
        ecosystem: Option<&str>,
    ) -> Result<Vec<Advisory>, StorageError> {
        self.find_by_key(name, ecosystem)
    }
}
