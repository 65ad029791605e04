// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache builder.

use std::time::Duration;

use cachegen_backend::Backend;
#[cfg(feature = "memory")]
use cachegen_memory::InMemoryBackend;
use tick::Clock;

use crate::cache::Cache;
use crate::config::{CacheConfig, DEFAULT_CACHE_NAME, STALE_CLAIM_WINDOW};
use crate::connector::Connector;
use crate::engine::Engine;
use crate::storage_key::KeyNamespace;
use crate::telemetry::CacheTelemetry;
use crate::versions::{DEFAULT_VERSION, INITIAL_FLUSH_VERSION, KeyVersionStore};

/// Builder for [`Cache`].
///
/// Created by [`Cache::builder`]. A backend must be chosen with
/// [`backend`](Self::backend) or [`memory`](Self::memory) before the cache can be built.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use cachegen::{Cache, KeyNamespace};
/// use tick::Clock;
///
/// let cache = Cache::builder(Clock::new_frozen())
///     .memory()
///     .name("pages")
///     .namespace(KeyNamespace::new().host("example.com").module("pgcache"))
///     .allow_stale(true)
///     .stale_claim_window(Duration::from_secs(10))
///     .build();
/// assert_eq!(cache.name(), "pages");
/// ```
#[derive(Debug)]
pub struct CacheBuilder<B = ()> {
    name: String,
    backend: B,
    clock: Clock,
    namespace: KeyNamespace,
    allow_stale: bool,
    stale_claim_window: Duration,
    initial_flush_version: u64,
    engine: Option<Engine>,
    telemetry: CacheTelemetry,
}

impl CacheBuilder<()> {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            name: DEFAULT_CACHE_NAME.to_owned(),
            backend: (),
            clock,
            namespace: KeyNamespace::default(),
            allow_stale: false,
            stale_claim_window: STALE_CLAIM_WINDOW,
            initial_flush_version: INITIAL_FLUSH_VERSION,
            engine: None,
            telemetry: CacheTelemetry::default(),
        }
    }

    /// Uses the in-process backend.
    #[cfg(feature = "memory")]
    #[cfg_attr(docsrs, doc(cfg(feature = "memory")))]
    #[must_use]
    pub fn memory(self) -> CacheBuilder<InMemoryBackend> {
        let backend = InMemoryBackend::builder().name(self.name.clone()).build();
        self.backend(backend).engine(Engine::Memory)
    }
}

impl<B> CacheBuilder<B> {
    /// Uses `backend` for storage.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachegen::Cache;
    /// use tick::Clock;
    /// use cachegen_backend::testing::MockBackend;
    ///
    /// let mock = MockBackend::new();
    /// let cache = Cache::builder(Clock::new_frozen()).backend(mock.clone()).build();
    /// ```
    pub fn backend<B2: Backend>(self, backend: B2) -> CacheBuilder<B2> {
        CacheBuilder {
            name: self.name,
            backend,
            clock: self.clock,
            namespace: self.namespace,
            allow_stale: self.allow_stale,
            stale_claim_window: self.stale_claim_window,
            initial_flush_version: self.initial_flush_version,
            engine: None,
            telemetry: self.telemetry,
        }
    }

    pub(crate) fn engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Applies every cache-level setting of `config`.
    ///
    /// The backend is not affected; see [`Cache::connect`] to open the configured engine.
    #[must_use]
    pub fn config(self, config: &CacheConfig) -> Self {
        self.name(config.name.clone())
            .namespace(config.namespace.clone())
            .allow_stale(config.allow_stale)
            .stale_claim_window(config.stale_claim_window())
            .initial_flush_version(config.initial_flush_version)
    }

    /// Sets the name reported by telemetry.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the storage key namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: KeyNamespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Enables serving outdated entries while one caller regenerates them.
    #[must_use]
    pub fn allow_stale(mut self, allow_stale: bool) -> Self {
        self.allow_stale = allow_stale;
        self
    }

    /// Sets how long a caller owns the regeneration of an outdated entry. Defaults to 30 seconds.
    #[must_use]
    pub fn stale_claim_window(mut self, window: Duration) -> Self {
        self.stale_claim_window = window;
        self
    }

    /// Sets the version written when flushing a group that has none. Defaults to 2.
    ///
    /// Values that do not exceed the version of an unflushed group are raised to 2.
    #[must_use]
    pub fn initial_flush_version(mut self, version: u64) -> Self {
        self.initial_flush_version = version.max(DEFAULT_VERSION + 1);
        self
    }

    /// Sets the telemetry collector.
    #[must_use]
    pub fn telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }
}

impl<B: Backend> CacheBuilder<B> {
    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> Cache<B> {
        Cache {
            name: self.name,
            connector: Connector::new(self.backend),
            versions: KeyVersionStore::new(self.initial_flush_version),
            namespace: self.namespace,
            clock: self.clock,
            allow_stale: self.allow_stale,
            stale_claim_window: self.stale_claim_window,
            engine: self.engine,
            telemetry: self.telemetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use cachegen_backend::testing::MockBackend;

    use super::*;

    #[test]
    fn defaults() {
        let cache = CacheBuilder::new(Clock::new_frozen()).backend(MockBackend::new()).build();
        assert_eq!(cache.name(), "cachegen");
        assert!(!cache.allows_stale());
        assert_eq!(cache.stale_claim_window, Duration::from_secs(30));
        assert_eq!(cache.namespace(), &KeyNamespace::default());
        assert_eq!(cache.engine, None);
    }

    #[test]
    fn config_is_applied() {
        let config = CacheConfig {
            name: "objects".to_owned(),
            allow_stale: true,
            namespace: KeyNamespace::new().module("object"),
            stale_claim_window_secs: 5,
            initial_flush_version: 10,
            ..CacheConfig::default()
        };
        let cache = CacheBuilder::new(Clock::new_frozen())
            .backend(MockBackend::new())
            .config(&config)
            .build();

        assert_eq!(cache.name(), "objects");
        assert!(cache.allows_stale());
        assert_eq!(cache.namespace().module, "object");
        assert_eq!(cache.stale_claim_window, Duration::from_secs(5));

        futures::executor::block_on(async {
            cache.flush("g").await;
            assert_eq!(cache.version("g").await, 10);
        });
    }

    #[test]
    fn initial_flush_version_is_at_least_two() {
        let cache = CacheBuilder::new(Clock::new_frozen())
            .backend(MockBackend::new())
            .initial_flush_version(0)
            .build();
        futures::executor::block_on(async {
            cache.flush("g").await;
            assert_eq!(cache.version("g").await, 2);
        });
    }

    #[cfg(feature = "memory")]
    #[test]
    fn memory_backend_round_trips() {
        use crate::entry::Entry;

        let cache = CacheBuilder::new(Clock::new_frozen()).memory().build();
        assert_eq!(cache.engine, Some(Engine::Memory));
        futures::executor::block_on(async {
            cache.set("k", &Entry::new(vec![1, 2]), None, "g").await;
            assert_eq!(cache.get::<Vec<i32>>("k", "g").await.map(Entry::into_content), Some(vec![1, 2]));
        });
    }
}
