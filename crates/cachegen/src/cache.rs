// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The versioned cache façade.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use cachegen_backend::{Backend, DynamicBackend, Error};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tick::Clock;

use crate::builder::CacheBuilder;
use crate::config::CacheConfig;
use crate::connector::Connector;
use crate::engine::Engine;
use crate::entry::{AheadGeneration, Entry, StoredEntry, TOMBSTONE_VERSION};
use crate::stats::{self, SizeStats};
use crate::storage_key::KeyNamespace;
use crate::telemetry::{CacheActivity, CacheOperation, CacheTelemetry};
use crate::versions::KeyVersionStore;

/// A key-value cache with generation-based group invalidation.
///
/// Every entry belongs to a *group*. Each group has a version stored in the backend;
/// entries remember the version they were written under. Flushing a group increments its
/// version, which invalidates all of the group's entries at once without touching them.
///
/// With stale serving enabled ([`CacheBuilder::allow_stale`]), the first reader of an
/// outdated entry claims its regeneration for a short window and gets a miss, while every
/// other reader keeps receiving the old value until the new one is written.
///
/// Backend failures never surface as errors: reads degrade to misses and writes report
/// `false`. Failures are logged through `tracing`.
///
/// A `Cache` caches group versions in memory for its whole lifetime and never
/// invalidates that cache. Create one per request or unit of work, not one per process.
///
/// # Examples
///
/// ```
/// use cachegen::{Cache, Entry};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let cache = Cache::builder(Clock::new_frozen()).memory().build();
///
/// cache.set("post:1", &Entry::new("Hello".to_owned()), None, "posts").await;
/// let entry = cache.get::<String>("post:1", "posts").await.unwrap();
/// assert_eq!(entry.content(), "Hello");
///
/// cache.flush("posts").await;
/// assert!(cache.get::<String>("post:1", "posts").await.is_none());
/// # });
/// ```
#[derive(Debug)]
pub struct Cache<B = DynamicBackend> {
    pub(crate) name: String,
    pub(crate) connector: Connector<B>,
    pub(crate) versions: KeyVersionStore,
    pub(crate) namespace: KeyNamespace,
    pub(crate) clock: Clock,
    pub(crate) allow_stale: bool,
    pub(crate) stale_claim_window: Duration,
    pub(crate) engine: Option<Engine>,
    pub(crate) telemetry: CacheTelemetry,
}

impl Cache<()> {
    /// Creates a new cache builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachegen::Cache;
    /// use tick::Clock;
    ///
    /// let cache = Cache::builder(Clock::new_frozen())
    ///     .memory()
    ///     .allow_stale(true)
    ///     .build();
    /// assert!(cache.available());
    /// ```
    #[must_use]
    pub fn builder(clock: Clock) -> CacheBuilder {
        CacheBuilder::new(clock)
    }

    /// Connects the engine named in `config` and builds a cache on top of it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the engine is unknown or not compiled in, or
    /// the configuration is invalid. Returns whatever the engine reports while
    /// connecting otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachegen::{Cache, CacheConfig};
    /// use tick::Clock;
    /// # futures::executor::block_on(async {
    ///
    /// let cache = Cache::connect(&CacheConfig::default(), Clock::new_frozen()).await?;
    /// assert!(cache.available());
    /// # Ok::<(), cachegen_backend::Error>(())
    /// # });
    /// ```
    pub async fn connect(config: &CacheConfig, clock: Clock) -> Result<Cache<DynamicBackend>, Error> {
        config.validate()?;
        let engine: Engine = config.engine.parse()?;
        let backend = engine.connect(config).await?;
        Ok(CacheBuilder::new(clock)
            .config(config)
            .backend(backend)
            .engine(engine)
            .build())
    }
}

impl<B> Cache<B> {
    /// Returns the name used in telemetry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cache's clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Returns the key namespace.
    #[must_use]
    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    /// Returns the backend connector.
    #[must_use]
    pub fn connector(&self) -> &Connector<B> {
        &self.connector
    }

    /// Returns whether stale entries are served during regeneration.
    #[must_use]
    pub fn allows_stale(&self) -> bool {
        self.allow_stale
    }

    /// Returns `false` when the configured engine is not compiled in.
    ///
    /// Caches built around an explicit backend are always available.
    #[must_use]
    pub fn available(&self) -> bool {
        self.engine.is_none_or(Engine::is_available)
    }

    /// Whole seconds since the UNIX epoch; times before it read as zero.
    fn unix_seconds(&self) -> u64 {
        self.clock
            .system_time()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }

    fn start(&self) -> Option<Instant> {
        self.telemetry.is_enabled().then(|| self.clock.instant())
    }

    fn record(&self, operation: CacheOperation, activity: CacheActivity, started: Option<Instant>) {
        if let Some(started) = started {
            let elapsed = self.clock.instant().saturating_duration_since(started);
            self.telemetry.record(&self.name, operation, activity, Some(elapsed));
        }
    }
}

impl<B: Backend> Cache<B> {
    /// Returns the current version of `group`.
    pub async fn version(&self, group: &str) -> u64 {
        self.versions.get_version(&self.connector, &self.namespace, group).await
    }

    /// Reads the entry stored under `key`.
    ///
    /// Returns `None` when the entry is absent, malformed, or outdated. Equivalent to the
    /// first element of [`get_with_old`](Self::get_with_old).
    pub async fn get<V: DeserializeOwned>(&self, key: &str, group: &str) -> Option<Entry<V>> {
        self.get_with_old(key, group).await.0
    }

    /// Reads the entry stored under `key` and reports whether this caller must regenerate it.
    ///
    /// - Current entries are returned as hits.
    /// - Entries tagged with a newer version than the one known here are returned as hits.
    ///   Unless the entry was generated ahead of a flush that has not happened yet, the
    ///   group's version is advanced to the entry's.
    /// - Outdated entries are misses unless stale serving is enabled. Then the first
    ///   caller to see one gets `(None, true)` and is expected to regenerate the value;
    ///   for the claim window every other caller gets `(Some(old entry), false)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachegen::{Cache, Entry};
    /// use tick::Clock;
    /// # futures::executor::block_on(async {
    ///
    /// let cache = Cache::builder(Clock::new_frozen()).memory().allow_stale(true).build();
    /// cache.set("front", &Entry::new(1), None, "pages").await;
    /// cache.flush("pages").await;
    ///
    /// let (entry, must_regenerate) = cache.get_with_old::<i32>("front", "pages").await;
    /// assert!(entry.is_none());
    /// assert!(must_regenerate);
    /// # });
    /// ```
    pub async fn get_with_old<V: DeserializeOwned>(&self, key: &str, group: &str) -> (Option<Entry<V>>, bool) {
        let started = self.start();
        let (entry, served_stale, activity) = self.lookup(key, group).await;
        self.record(CacheOperation::Get, activity, started);
        (entry, served_stale)
    }

    async fn lookup<V: DeserializeOwned>(&self, key: &str, group: &str) -> (Option<Entry<V>>, bool, CacheActivity) {
        let storage_key = self.namespace.item_key(key);
        let Some(raw) = self.connector.raw_get(&storage_key).await else {
            return (None, false, CacheActivity::Miss);
        };
        let mut stored = match StoredEntry::decode(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::debug!(key, error = %e, "ignoring malformed entry");
                return (None, false, CacheActivity::Miss);
            }
        };

        let current = self.version(group).await;
        let activity = match stored.key_version.cmp(&current) {
            Ordering::Equal => CacheActivity::Hit,
            Ordering::Greater => self.reconcile(group, &stored, current).await,
            Ordering::Less => {
                if !self.allow_stale {
                    return (None, false, CacheActivity::Miss);
                }

                let now = self.unix_seconds();
                if stored.expires_at.is_none_or(|at| at < now) {
                    stored.expires_at = Some(now.saturating_add(self.stale_claim_window.as_secs()));
                    self.write(&storage_key, &stored, None).await;
                    tracing::debug!(key, group, "claimed regeneration of outdated entry");
                    return (None, true, CacheActivity::StaleClaimed);
                }
                CacheActivity::StaleServed
            }
        };

        match stored.into_entry() {
            Ok(entry) => (Some(entry), false, activity),
            Err(e) => {
                tracing::debug!(key, error = %e, "cached content does not match the requested type");
                (None, false, CacheActivity::Miss)
            }
        }
    }

    async fn reconcile(&self, group: &str, stored: &StoredEntry, current: u64) -> CacheActivity {
        if stored.key_version_at_creation == Some(current) {
            return CacheActivity::Hit;
        }

        tracing::info!(
            group,
            from = current,
            to = stored.key_version,
            "group version behind cached entry, resynchronizing"
        );
        self.versions
            .set_version(&self.connector, &self.namespace, group, stored.key_version)
            .await;
        CacheActivity::Resynced
    }

    async fn write(&self, storage_key: &str, stored: &StoredEntry, ttl: Option<Duration>) -> bool {
        match stored.encode() {
            Ok(bytes) => self.connector.raw_set(storage_key, bytes, ttl).await,
            Err(e) => {
                tracing::warn!(key = storage_key, error = %e, "failed to encode entry");
                false
            }
        }
    }

    /// Stores `entry` under `key`.
    ///
    /// An entry without a version is stamped with the group's current version. A `ttl` of
    /// `None` or zero stores the entry without expiry. Returns whether the backend
    /// accepted the write.
    pub async fn set<V: Serialize>(&self, key: &str, entry: &Entry<V>, ttl: Option<Duration>, group: &str) -> bool {
        let started = self.start();
        let version = match entry.key_version() {
            Some(version) => version,
            None => self.version(group).await,
        };

        let written = match entry.to_stored(version) {
            Ok(stored) => {
                let ttl = ttl.filter(|ttl| !ttl.is_zero());
                self.write(&self.namespace.item_key(key), &stored, ttl).await
            }
            Err(e) => {
                tracing::warn!(key, group, error = %e, "failed to serialize cache content");
                false
            }
        };

        let activity = if written { CacheActivity::Inserted } else { CacheActivity::Error };
        self.record(CacheOperation::Set, activity, started);
        written
    }

    /// Same as [`set`](Self::set).
    pub async fn add<V: Serialize>(&self, key: &str, entry: &Entry<V>, ttl: Option<Duration>, group: &str) -> bool {
        self.set(key, entry, ttl, group).await
    }

    /// Same as [`set`](Self::set).
    pub async fn replace<V: Serialize>(&self, key: &str, entry: &Entry<V>, ttl: Option<Duration>, group: &str) -> bool {
        self.set(key, entry, ttl, group).await
    }

    /// Deletes the entry stored under `key`.
    ///
    /// With stale serving enabled an existing entry is not removed but rewritten as a
    /// tombstone (version 0), so the next reader claims its regeneration while others
    /// keep being served the old content. Otherwise the entry is removed.
    pub async fn delete(&self, key: &str, group: &str) -> bool {
        let started = self.start();
        let storage_key = self.namespace.item_key(key);

        if self.allow_stale {
            let existing = self
                .connector
                .raw_get(&storage_key)
                .await
                .and_then(|raw| StoredEntry::decode(&raw).ok());
            if let Some(mut stored) = existing {
                stored.key_version = TOMBSTONE_VERSION;
                stored.expires_at = None;
                let written = self.write(&storage_key, &stored, None).await;
                tracing::debug!(key, group, written, "soft-deleted entry");
                let activity = if written { CacheActivity::SoftDeleted } else { CacheActivity::Error };
                self.record(CacheOperation::Delete, activity, started);
                return written;
            }
        }

        let deleted = self.connector.raw_delete(&storage_key).await;
        tracing::debug!(key, group, deleted, "deleted entry");
        self.record(CacheOperation::Delete, CacheActivity::Deleted, started);
        deleted
    }

    /// Removes the entry stored under `key`, even when stale serving is enabled.
    pub async fn hard_delete(&self, key: &str, group: &str) -> bool {
        let started = self.start();
        let deleted = self.connector.raw_delete(&self.namespace.item_key(key)).await;
        tracing::debug!(key, group, deleted, "hard-deleted entry");
        self.record(CacheOperation::Delete, CacheActivity::Deleted, started);
        deleted
    }

    /// Invalidates every entry of `group` by advancing its version.
    ///
    /// Takes constant time regardless of how many entries the group holds. Always
    /// returns `true`: a failed backend write still takes effect for this instance.
    pub async fn flush(&self, group: &str) -> bool {
        let started = self.start();
        let version = self
            .versions
            .increment_version(&self.connector, &self.namespace, group)
            .await;
        tracing::info!(group, version, "flushed group");
        self.record(CacheOperation::Flush, CacheActivity::Flushed, started);
        true
    }

    /// Returns the versions to tag content with when generating it ahead of a flush.
    ///
    /// Entries written with [`Entry::with_ahead_generation`] are served as hits right away.
    /// Reading them does not advance the group's version; only
    /// [`flush_group_after_ahead_generation`](Self::flush_group_after_ahead_generation)
    /// does, which outdates every entry written under the previous version.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachegen::{Cache, Entry};
    /// use tick::Clock;
    /// # futures::executor::block_on(async {
    ///
    /// let cache = Cache::builder(Clock::new_frozen()).memory().build();
    /// let extension = cache.get_ahead_generation_extension("pages").await;
    /// assert_eq!(extension.key_version, 2);
    ///
    /// cache.set("front", &Entry::new("v2").with_ahead_generation(&extension), None, "pages").await;
    /// cache.flush_group_after_ahead_generation("pages", &extension).await;
    /// assert_eq!(cache.version("pages").await, 2);
    /// # });
    /// ```
    pub async fn get_ahead_generation_extension(&self, group: &str) -> AheadGeneration {
        let current = self.version(group).await;
        AheadGeneration {
            key_version: current.saturating_add(1),
            key_version_at_creation: current,
        }
    }

    /// Activates content generated with `extension` by moving the group to its version.
    ///
    /// Never moves the version backwards.
    pub async fn flush_group_after_ahead_generation(&self, group: &str, extension: &AheadGeneration) {
        let started = self.start();
        let current = self.version(group).await;
        if extension.key_version > current {
            self.versions
                .set_version(&self.connector, &self.namespace, group, extension.key_version)
                .await;
            tracing::info!(group, version = extension.key_version, "activated ahead generation");
        }
        self.record(CacheOperation::Flush, CacheActivity::Flushed, started);
    }

    /// Replaces the entry under `key` with `new` if its content still equals `old`'s.
    ///
    /// Only content is compared; versions are ignored. A `new` entry without a version
    /// keeps the stored entry's version.
    ///
    /// The swap is atomic on backends with native compare-and-swap. On other backends it
    /// is a read followed by a write: **not atomic**, a writer landing in between is
    /// silently overwritten.
    pub async fn set_if_maybe_equals<V: Serialize>(&self, key: &str, old: &Entry<V>, new: &Entry<V>) -> bool {
        let started = self.start();
        let activity = self.swap(key, old, new).await;
        self.record(CacheOperation::Cas, activity, started);
        activity == CacheActivity::Inserted
    }

    async fn swap<V: Serialize>(&self, key: &str, old: &Entry<V>, new: &Entry<V>) -> CacheActivity {
        let storage_key = self.namespace.item_key(key);
        let Some((raw, token)) = self.connector.raw_get_with_token(&storage_key).await else {
            return CacheActivity::Rejected;
        };
        let Ok(stored) = StoredEntry::decode(&raw) else {
            return CacheActivity::Rejected;
        };

        let expected = match serde_json::to_value(old.content()) {
            Ok(expected) => expected,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize expected content");
                return CacheActivity::Error;
            }
        };
        if stored.content != expected {
            return CacheActivity::Rejected;
        }

        let replacement = match new.to_stored(stored.key_version).and_then(|s| s.encode()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize replacement content");
                return CacheActivity::Error;
            }
        };

        if self.connector.raw_cas(&storage_key, &token, replacement, None).await {
            CacheActivity::Inserted
        } else {
            CacheActivity::Rejected
        }
    }

    /// Sums the size of this instance's keys by enumerating the backend.
    ///
    /// Stops early once `timeout_at` has passed and reports partial totals with
    /// [`SizeStats::timeout_occurred`] set. Sizes are unknown when the backend cannot be
    /// enumerated at all.
    pub async fn get_stats_size(&self, timeout_at: SystemTime) -> SizeStats {
        stats::collect(&self.connector, &self.namespace.key_prefix(), &self.clock, timeout_at).await
    }

    /// Returns the backend's native statistics, or `None` when they cannot be read.
    pub async fn get_statistics(&self) -> Option<BTreeMap<String, String>> {
        self.connector.statistics().await
    }
}
