// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Connection settings shared by network backends.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// How to reach and authenticate against a backend's servers.
///
/// Every network backend accepts the same settings; engines ignore the toggles they
/// cannot honour and say so in their logs.
///
/// # Examples
///
/// ```
/// use cachegen_backend::ConnectionSettings;
///
/// let settings = ConnectionSettings::new(["127.0.0.1:6379", "cache-2:6379"]).credentials("app", "s3cret");
/// assert_eq!(settings.server_addresses(6379)?.len(), 2);
/// # Ok::<(), cachegen_backend::Error>(())
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[expect(clippy::struct_excessive_bools, reason = "independent connection toggles")]
pub struct ConnectionSettings {
    /// Server endpoints: `host:port`, `[v6-address]:port`, `unix:/path` or `/path`.
    pub servers: Vec<String>,
    /// Reuse one connection per endpoint across backend instances in this process.
    pub persistent: bool,
    /// Username for SASL or AUTH, if any.
    pub username: Option<String>,
    /// Password for SASL or AUTH, if any.
    pub password: Option<String>,
    /// Negotiate the backend's binary protocol when it has one.
    pub binary_protocol: bool,
    /// Discover cluster nodes from the configured endpoint.
    pub aws_autodiscovery: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            persistent: true,
            username: None,
            password: None,
            binary_protocol: false,
            aws_autodiscovery: false,
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("servers", &self.servers)
            .field("persistent", &self.persistent)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("binary_protocol", &self.binary_protocol)
            .field("aws_autodiscovery", &self.aws_autodiscovery)
            .finish()
    }
}

impl ConnectionSettings {
    /// Creates settings for the given endpoints with every other option at its default.
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the credentials used to authenticate.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets whether connections are shared across backend instances.
    #[must_use]
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Sets whether the binary protocol is negotiated.
    #[must_use]
    pub fn binary_protocol(mut self, enabled: bool) -> Self {
        self.binary_protocol = enabled;
        self
    }

    /// Returns `true` when a username or password is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty()) || self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Parses the configured endpoints, filling in `default_port` where none is given.
    ///
    /// Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [configuration error](crate::ErrorKind::Configuration) when no endpoint is
    /// configured or any endpoint fails to parse.
    pub fn server_addresses(&self, default_port: u16) -> Result<Vec<ServerAddress>, Error> {
        let addresses = self
            .servers
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| ServerAddress::parse_with_default_port(s, default_port))
            .collect::<Result<Vec<_>, _>>()?;

        if addresses.is_empty() {
            return Err(Error::configuration("no servers configured"));
        }

        Ok(addresses)
    }
}

/// A single backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerAddress {
    /// A TCP endpoint.
    Tcp {
        /// Host name or IP address (IPv6 without brackets).
        host: String,
        /// TCP port.
        port: u16,
    },
    /// A Unix domain socket.
    Unix(PathBuf),
}

impl ServerAddress {
    /// Parses an endpoint, using `default_port` when a TCP endpoint names no port.
    ///
    /// # Errors
    ///
    /// Returns a [configuration error](crate::ErrorKind::Configuration) for empty input,
    /// an invalid port or an unterminated IPv6 literal.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachegen_backend::ServerAddress;
    ///
    /// let addr = ServerAddress::parse_with_default_port("cache-1", 11211)?;
    /// assert_eq!(addr.to_string(), "cache-1:11211");
    ///
    /// let addr = ServerAddress::parse_with_default_port("unix:/var/run/cache.sock", 11211)?;
    /// assert_eq!(addr.to_string(), "unix:/var/run/cache.sock");
    /// # Ok::<(), cachegen_backend::Error>(())
    /// ```
    pub fn parse_with_default_port(input: &str, default_port: u16) -> Result<Self, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::configuration("empty server address"));
        }

        if let Some(path) = input.strip_prefix("unix:") {
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if input.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(input)));
        }

        if let Some(rest) = input.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| Error::configuration(format!("unterminated IPv6 address: {input}")))?;
            let port = match after.strip_prefix(':') {
                Some(port) => parse_port(port, input)?,
                None if after.is_empty() => default_port,
                None => return Err(Error::configuration(format!("invalid server address: {input}"))),
            };
            return Ok(Self::Tcp {
                host: host.to_owned(),
                port,
            });
        }

        match input.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => Ok(Self::Tcp {
                host: host.to_owned(),
                port: parse_port(port, input)?,
            }),
            // a bare IPv6 literal has several colons and no port
            Some(_) => Ok(Self::Tcp {
                host: input.to_owned(),
                port: default_port,
            }),
            None => Ok(Self::Tcp {
                host: input.to_owned(),
                port: default_port,
            }),
        }
    }
}

fn parse_port(port: &str, input: &str) -> Result<u16, Error> {
    port.parse()
        .map_err(|e| Error::configuration(format!("invalid port in server address {input}: {e}")))
}

impl FromStr for ServerAddress {
    type Err = Error;

    /// Parses an endpoint that must name its port explicitly (unless it is a socket path).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr = Self::parse_with_default_port(s, 0)?;
        if matches!(addr, Self::Tcp { port: 0, .. }) {
            return Err(Error::configuration(format!("server address has no port: {s}")));
        }
        Ok(addr)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
