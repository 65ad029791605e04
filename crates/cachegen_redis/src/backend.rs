// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cachegen_backend::{Backend, Capabilities, CasToken, ConnectionSettings, Error, ItemInfo, ServerAddress, StorageUnit};
use redis::aio::ConnectionManager;
use redis::{ConnectionAddr, ConnectionInfo, ProtocolVersion, RedisConnectionInfo, RedisError};
use xxhash_rust::xxh3::xxh3_64;

use crate::info::parse_info;
use crate::registry;
use crate::scripts::{COMPARE_AND_SWAP, INCREMENT_EXISTING};

/// Port used for endpoints that do not name one.
pub const DEFAULT_PORT: u16 = 6379;

const SCAN_BATCH: usize = 500;

#[derive(Clone)]
struct Node {
    name: String,
    connection: ConnectionManager,
}

/// A [`Backend`] talking to one or more Redis servers.
///
/// Each storage key lives on exactly one server, chosen by hashing the key. Clones share
/// the same connections.
#[derive(Clone)]
pub struct RedisBackend {
    nodes: Arc<[Node]>,
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("servers", &self.nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

impl RedisBackend {
    /// Connects to every configured server.
    ///
    /// With [`persistent`](ConnectionSettings::persistent) set, connections are taken from
    /// (and added to) a process-wide registry, so backends created for the same servers
    /// and credentials share them. Setting
    /// [`binary_protocol`](ConnectionSettings::binary_protocol) negotiates RESP3.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no server is configured or an endpoint is
    /// malformed, and a connection error when a server cannot be reached.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self, Error> {
        if settings.aws_autodiscovery {
            tracing::warn!("cluster autodiscovery is not supported by the redis backend, using the configured servers");
        }

        let addresses = settings.server_addresses(DEFAULT_PORT)?;
        let mut nodes = Vec::with_capacity(addresses.len());
        for address in addresses {
            let info = connection_info(&address, settings);
            let connection = if settings.persistent {
                registry::shared(info).await
            } else {
                match redis::Client::open(info) {
                    Ok(client) => ConnectionManager::new(client).await,
                    Err(e) => Err(e),
                }
            }
            .map_err(backend_error)?;

            tracing::debug!(server = %address, persistent = settings.persistent, "connected to redis");
            nodes.push(Node {
                name: address.to_string(),
                connection,
            });
        }

        Ok(Self { nodes: nodes.into() })
    }

    fn node_for(&self, key: &str) -> &Node {
        &self.nodes[shard_index(key, self.nodes.len())]
    }

    fn node_named(&self, server: &str) -> Result<&Node, Error> {
        self.nodes
            .iter()
            .find(|node| node.name == server)
            .ok_or_else(|| Error::connection(format!("unknown server {server}")))
    }
}

fn connection_info(address: &ServerAddress, settings: &ConnectionSettings) -> ConnectionInfo {
    let addr = match address {
        ServerAddress::Tcp { host, port } => ConnectionAddr::Tcp(host.clone(), *port),
        ServerAddress::Unix(path) => ConnectionAddr::Unix(path.clone()),
    };
    ConnectionInfo {
        addr,
        redis: RedisConnectionInfo {
            username: settings.username.clone().filter(|u| !u.is_empty()),
            password: settings.password.clone().filter(|p| !p.is_empty()),
            protocol: if settings.binary_protocol {
                ProtocolVersion::RESP3
            } else {
                ProtocolVersion::RESP2
            },
            ..RedisConnectionInfo::default()
        },
    }
}

fn shard_index(key: &str, nodes: usize) -> usize {
    let hash = xxh3_64(key.as_bytes());
    usize::try_from(hash % nodes.max(1) as u64).unwrap_or_default()
}

fn expiry_seconds(ttl: Option<Duration>) -> u64 {
    ttl.filter(|ttl| !ttl.is_zero()).map_or(0, |ttl| ttl.as_secs().max(1))
}

fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

fn backend_error(error: RedisError) -> Error {
    if error.is_io_error() || error.is_connection_refusal() || error.is_timeout() || error.is_connection_dropped() {
        Error::connection(error)
    } else {
        Error::protocol(error)
    }
}

impl Backend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, Error> {
        let mut connection = self.node_for(key).connection.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(backend_error)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), Error> {
        let mut connection = self.node_for(key).connection.clone();
        let mut command = redis::cmd("SET");
        command.arg(key).arg(value.as_ref());
        let seconds = expiry_seconds(ttl);
        if seconds > 0 {
            command.arg("EX").arg(seconds);
        }
        command.query_async::<()>(&mut connection).await.map_err(backend_error)
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let mut connection = self.node_for(key).connection.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(backend_error)?;
        Ok(removed > 0)
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<Option<i64>, Error> {
        let mut connection = self.node_for(key).connection.clone();
        INCREMENT_EXISTING
            .key(key)
            .arg(delta)
            .invoke_async(&mut connection)
            .await
            .map_err(backend_error)
    }

    async fn compare_and_swap(&self, key: &str, token: &CasToken, value: Bytes, ttl: Option<Duration>) -> Result<bool, Error> {
        let CasToken::Value(expected) = token else {
            return Err(Error::unsupported("redis compares values, revision tokens are not issued"));
        };
        let mut connection = self.node_for(key).connection.clone();
        let swapped: i64 = COMPARE_AND_SWAP
            .key(key)
            .arg(expected.as_ref())
            .arg(value.as_ref())
            .arg(expiry_seconds(ttl))
            .invoke_async(&mut connection)
            .await
            .map_err(backend_error)?;
        Ok(swapped == 1)
    }

    fn servers(&self) -> Vec<String> {
        self.nodes.iter().map(|node| node.name.clone()).collect()
    }

    async fn storage_units(&self, server: &str) -> Result<Vec<StorageUnit>, Error> {
        let node = self.node_named(server)?;
        Ok(vec![StorageUnit::new(node.name.as_str(), 0)])
    }

    async fn dump_unit(&self, unit: &StorageUnit, prefix: &str) -> Result<Vec<ItemInfo>, Error> {
        let mut connection = self.node_named(&unit.server)?.connection.clone();
        let pattern = escape_glob(prefix);
        let mut items = Vec::new();
        let mut cursor = 0_u64;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut connection)
                .await
                .map_err(backend_error)?;

            if !keys.is_empty() {
                let mut pipeline = redis::pipe();
                for key in &keys {
                    pipeline.cmd("STRLEN").arg(key);
                }
                let sizes: Vec<u64> = pipeline.query_async(&mut connection).await.map_err(backend_error)?;
                items.extend(keys.into_iter().zip(sizes).map(|(key, size)| ItemInfo::new(key, size)));
            }

            if next == 0 {
                return Ok(items);
            }
            cursor = next;
        }
    }

    async fn statistics(&self) -> Result<BTreeMap<String, String>, Error> {
        let mut stats = BTreeMap::new();
        let qualify = self.nodes.len() > 1;
        for node in self.nodes.iter() {
            let mut connection = node.connection.clone();
            let reply: String = redis::cmd("INFO")
                .query_async(&mut connection)
                .await
                .map_err(backend_error)?;
            for (field, value) in parse_info(&reply) {
                let field = if qualify { format!("{}/{field}", node.name) } else { field };
                stats.insert(field, value);
            }
        }
        Ok(stats)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .with_cas(true)
            .with_sasl(true)
            .with_binary_protocol(true)
            .with_introspection(true)
    }
}
