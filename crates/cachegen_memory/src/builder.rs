// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-memory backends.
//!
//! This module provides a builder API for `InMemoryBackend` that abstracts
//! the underlying moka configuration, providing a stable API surface
//! without exposing moka's types.

use std::time::Duration;

use crate::backend::InMemoryBackend;

/// Builder for configuring an `InMemoryBackend`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use cachegen_memory::InMemoryBackend;
///
/// let backend = InMemoryBackend::builder()
///     .max_capacity(1000)
///     .time_to_live(Duration::from_secs(300))
///     .initial_capacity(100)
///     .name("pages")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackendBuilder {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) time_to_live: Option<Duration>,
    pub(crate) name: Option<String>,
}

impl InMemoryBackendBuilder {
    /// Creates a new builder with default settings.
    ///
    /// The default configuration creates an unbounded backend with `TinyLFU`
    /// eviction and no expiry ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries.
    ///
    /// Once the capacity is reached, entries are evicted using the `TinyLFU` policy.
    /// Versions and counters live in the same keyspace as items, so size this with
    /// some headroom.
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets the initial capacity (pre-allocation hint).
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Sets an upper bound on how long any entry lives.
    ///
    /// Entries written without a TTL, such as group versions, are also subject to
    /// this ceiling. A shorter per-write TTL still wins.
    #[must_use]
    pub fn time_to_live(mut self, duration: Duration) -> Self {
        self.time_to_live = Some(duration);
        self
    }

    /// Sets a name reported by [`statistics`](cachegen_backend::Backend::statistics).
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configured `InMemoryBackend`.
    #[must_use]
    pub fn build(self) -> InMemoryBackend {
        InMemoryBackend::from_builder(&self)
    }
}
