// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-wide registry of shared Redis connections.

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::{ConnectionAddr, ConnectionInfo, ProtocolVersion};

static SHARED: LazyLock<Mutex<HashMap<RegistryKey, ConnectionManager>>> = LazyLock::new(|| Mutex::new(HashMap::new()));

/// Identifies a connection by endpoint, credentials and protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RegistryKey {
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
    resp3: bool,
}

impl RegistryKey {
    pub(crate) fn new(info: &ConnectionInfo) -> Self {
        let endpoint = match &info.addr {
            ConnectionAddr::Unix(path) => format!("unix:{}", path.display()),
            addr => addr.to_string(),
        };
        Self {
            endpoint,
            username: info.redis.username.clone(),
            password: info.redis.password.clone(),
            resp3: info.redis.protocol == ProtocolVersion::RESP3,
        }
    }
}

/// Returns the shared connection for `info`, opening it on first use.
///
/// Two callers racing on a cold key may both connect; the first to finish wins and the
/// other connection is dropped.
pub(crate) async fn shared(info: ConnectionInfo) -> redis::RedisResult<ConnectionManager> {
    let key = RegistryKey::new(&info);
    let existing = SHARED.lock().get(&key).cloned();
    if let Some(existing) = existing {
        return Ok(existing);
    }

    let connection = ConnectionManager::new(redis::Client::open(info)?).await?;
    Ok(SHARED.lock().entry(key).or_insert(connection).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::RedisConnectionInfo;

    fn info(host: &str, username: Option<&str>, protocol: ProtocolVersion) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(host.to_owned(), 6379),
            redis: RedisConnectionInfo {
                username: username.map(str::to_owned),
                protocol,
                ..RedisConnectionInfo::default()
            },
        }
    }

    #[test]
    fn keys_distinguish_credentials_and_protocol() {
        let plain = RegistryKey::new(&info("a", None, ProtocolVersion::RESP2));
        assert_eq!(plain, RegistryKey::new(&info("a", None, ProtocolVersion::RESP2)));
        assert_ne!(plain, RegistryKey::new(&info("a", Some("app"), ProtocolVersion::RESP2)));
        assert_ne!(plain, RegistryKey::new(&info("a", None, ProtocolVersion::RESP3)));
        assert_ne!(plain, RegistryKey::new(&info("b", None, ProtocolVersion::RESP2)));
    }
}
