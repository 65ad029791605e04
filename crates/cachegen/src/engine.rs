// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Backend engines selectable by name.

use std::fmt;
use std::str::FromStr;

use cachegen_backend::{DynamicBackend, Error};

use crate::config::CacheConfig;

/// A backend engine known to this crate.
///
/// Engines are compiled in through cargo features (`memory`, `redis`); an engine whose
/// feature is disabled parses but reports itself unavailable.
///
/// # Examples
///
/// ```
/// use cachegen::Engine;
///
/// let engine: Engine = "Redis".parse()?;
/// assert_eq!(engine, Engine::Redis);
/// assert!("memcached".parse::<Engine>().is_err());
/// # Ok::<(), cachegen_backend::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Engine {
    /// In-process storage, see `cachegen_memory`.
    Memory,
    /// Redis, see `cachegen_redis`.
    Redis,
}

impl Engine {
    /// Returns the engine's canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }

    /// Returns `true` when support for this engine was compiled in.
    #[must_use]
    pub fn is_available(self) -> bool {
        match self {
            Self::Memory => cfg!(feature = "memory"),
            Self::Redis => cfg!(feature = "redis"),
        }
    }

    /// Opens a backend of this engine.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the engine is not compiled in, or whatever the
    /// engine reports while connecting.
    pub async fn connect(self, config: &CacheConfig) -> Result<DynamicBackend, Error> {
        match self {
            Self::Memory => connect_memory(config),
            Self::Redis => connect_redis(config).await,
        }
    }
}

#[cfg(not(all(feature = "memory", feature = "redis")))]
fn unavailable(engine: Engine) -> Error {
    Error::configuration(format!("engine {engine} is not available, enable the `{engine}` feature"))
}

#[cfg(feature = "memory")]
fn connect_memory(config: &CacheConfig) -> Result<DynamicBackend, Error> {
    use cachegen_backend::DynamicBackendExt as _;

    Ok(cachegen_memory::InMemoryBackend::builder()
        .name(config.name.clone())
        .build()
        .into_dynamic())
}

#[cfg(not(feature = "memory"))]
fn connect_memory(_config: &CacheConfig) -> Result<DynamicBackend, Error> {
    Err(unavailable(Engine::Memory))
}

#[cfg(feature = "redis")]
async fn connect_redis(config: &CacheConfig) -> Result<DynamicBackend, Error> {
    use cachegen_backend::DynamicBackendExt as _;

    Ok(cachegen_redis::RedisBackend::connect(&config.connection)
        .await?
        .into_dynamic())
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_config: &CacheConfig) -> Result<DynamicBackend, Error> {
    Err(unavailable(Engine::Redis))
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "memcached" | "memcache" => Err(Error::configuration(format!(
                "engine {s:?} is not supported, use \"redis\" or \"memory\""
            ))),
            _ => Err(Error::configuration(format!("unknown engine {s:?}"))),
        }
    }
}
