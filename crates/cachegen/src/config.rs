// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache configuration.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::time::Duration;

use cachegen_backend::{ConnectionSettings, Error};
use serde::{Deserialize, Serialize};

use crate::storage_key::KeyNamespace;
use crate::versions::{DEFAULT_VERSION, INITIAL_FLUSH_VERSION};

/// How long a process owns the regeneration of a stale entry.
pub const STALE_CLAIM_WINDOW: Duration = Duration::from_secs(30);

/// Name reported by telemetry unless configured otherwise.
pub const DEFAULT_CACHE_NAME: &str = "cachegen";

/// Everything needed to connect a cache.
///
/// Deserializes from any serde format; every field has a default, so partial documents
/// are accepted.
///
/// # Examples
///
/// ```
/// use cachegen::CacheConfig;
///
/// let config: CacheConfig = serde_json::from_str(
///     r#"{
///         "engine": "redis",
///         "connection": { "servers": ["10.0.0.5:6379"] },
///         "allow_stale": true,
///         "namespace": { "host": "example.com", "module": "pages" }
///     }"#,
/// )?;
/// assert_eq!(config.stale_claim_window_secs, 30);
/// assert!(config.connection.persistent);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name used in telemetry.
    pub name: String,
    /// Backend engine name, see [`Engine`](crate::Engine).
    pub engine: String,
    /// How to reach the backend's servers.
    pub connection: ConnectionSettings,
    /// Serve stale entries while one process regenerates them.
    pub allow_stale: bool,
    /// Storage key namespace.
    pub namespace: KeyNamespace,
    /// Regeneration claim window in seconds.
    pub stale_claim_window_secs: u64,
    /// Version written when flushing a group that has no version yet.
    pub initial_flush_version: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CACHE_NAME.to_owned(),
            engine: "memory".to_owned(),
            connection: ConnectionSettings::default(),
            allow_stale: false,
            namespace: KeyNamespace::default(),
            stale_claim_window_secs: STALE_CLAIM_WINDOW.as_secs(),
            initial_flush_version: INITIAL_FLUSH_VERSION,
        }
    }
}

impl CacheConfig {
    /// Returns the regeneration claim window.
    #[must_use]
    pub fn stale_claim_window(&self) -> Duration {
        Duration::from_secs(self.stale_claim_window_secs)
    }

    /// Checks values that would break versioning.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `initial_flush_version` does not exceed the
    /// version an absent group reads as.
    pub fn validate(&self) -> Result<(), Error> {
        if self.initial_flush_version <= DEFAULT_VERSION {
            return Err(Error::configuration(format!(
                "initial_flush_version must be greater than {DEFAULT_VERSION}, got {}",
                self.initial_flush_version
            )));
        }
        Ok(())
    }

    /// Reads a configuration from flat, dotted settings.
    ///
    /// Keys are `{section}.engine`, `{section}.servers`, `{section}.persistent`,
    /// `{section}.username`, `{section}.password`, `{section}.binary_protocol`,
    /// `{section}.aws_autodiscovery`, `{section}.allow_stale`, `{section}.prefix`,
    /// `{section}.instance_id`, `{section}.host`, `{section}.tenant_id`,
    /// `{section}.module`, `{section}.stale_claim_window_secs`,
    /// `{section}.initial_flush_version` and `{section}.name`. Missing keys keep their
    /// defaults. An empty section reads the bare names.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a value cannot be parsed or the result fails
    /// [`validate`](Self::validate).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashMap;
    ///
    /// use cachegen::CacheConfig;
    ///
    /// let settings = HashMap::from([
    ///     ("pgcache.engine".to_owned(), "redis".to_owned()),
    ///     ("pgcache.servers".to_owned(), "10.0.0.5:6379, 10.0.0.6:6379".to_owned()),
    ///     ("pgcache.allow_stale".to_owned(), "1".to_owned()),
    /// ]);
    /// let config = CacheConfig::from_settings(&settings, "pgcache")?;
    /// assert_eq!(config.connection.servers.len(), 2);
    /// assert!(config.allow_stale);
    /// # Ok::<(), cachegen_backend::Error>(())
    /// ```
    pub fn from_settings(settings: &impl Settings, section: &str) -> Result<Self, Error> {
        let key = |name: &str| {
            if section.is_empty() {
                name.to_owned()
            } else {
                format!("{section}.{name}")
            }
        };

        let mut config = Self::default();
        if let Some(name) = settings.get_str(&key("name")) {
            config.name = name;
        }
        if let Some(engine) = settings.get_str(&key("engine")) {
            config.engine = engine;
        }
        if let Some(servers) = settings.get_list(&key("servers")) {
            config.connection.servers = servers;
        }
        if let Some(persistent) = settings.get_bool(&key("persistent"))? {
            config.connection.persistent = persistent;
        }
        config.connection.username = settings.get_str(&key("username")).filter(|s| !s.is_empty());
        config.connection.password = settings.get_str(&key("password")).filter(|s| !s.is_empty());
        if let Some(binary) = settings.get_bool(&key("binary_protocol"))? {
            config.connection.binary_protocol = binary;
        }
        if let Some(discovery) = settings.get_bool(&key("aws_autodiscovery"))? {
            config.connection.aws_autodiscovery = discovery;
        }
        if let Some(allow_stale) = settings.get_bool(&key("allow_stale"))? {
            config.allow_stale = allow_stale;
        }
        if let Some(prefix) = settings.get_str(&key("prefix")) {
            config.namespace.prefix = prefix;
        }
        if let Some(instance_id) = settings.get_u64(&key("instance_id"))? {
            config.namespace.instance_id = instance_id;
        }
        if let Some(host) = settings.get_str(&key("host")) {
            config.namespace.host = host;
        }
        if let Some(tenant_id) = settings.get_u64(&key("tenant_id"))? {
            config.namespace.tenant_id = tenant_id;
        }
        if let Some(module) = settings.get_str(&key("module")) {
            config.namespace.module = module;
        }
        if let Some(window) = settings.get_u64(&key("stale_claim_window_secs"))? {
            config.stale_claim_window_secs = window;
        }
        if let Some(version) = settings.get_u64(&key("initial_flush_version"))? {
            config.initial_flush_version = version;
        }

        config.validate()?;
        Ok(config)
    }
}

/// A flat key-value settings provider.
///
/// Only [`get_str`](Self::get_str) is required; typed accessors parse its result.
pub trait Settings {
    /// Returns the raw value under `key`.
    fn get_str(&self, key: &str) -> Option<String>;

    /// Returns the value under `key` as a boolean.
    ///
    /// Accepts `true`/`false`, `yes`/`no`, `on`/`off` and `1`/`0`, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any other value.
    fn get_bool(&self, key: &str) -> Result<Option<bool>, Error> {
        let Some(raw) = self.get_str(key) else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
            other => Err(Error::configuration(format!("{key}: expected a boolean, got {other:?}"))),
        }
    }

    /// Returns the value under `key` as an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the value is not a non-negative integer.
    fn get_u64(&self, key: &str) -> Result<Option<u64>, Error> {
        self.get_str(key)
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map_err(|e| Error::configuration(format!("{key}: expected an unsigned integer, got {raw:?}: {e}")))
            })
            .transpose()
    }

    /// Returns the value under `key` as a comma-separated list, skipping blank items.
    fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get_str(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect()
        })
    }
}

impl<S: BuildHasher> Settings for HashMap<String, String, S> {
    fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl Settings for BTreeMap<String, String> {
    fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
