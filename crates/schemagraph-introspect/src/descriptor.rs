//! Connection descriptors: where an external engine lives and how to reach it.
//!
//! Descriptors deserialize from the same camelCase JSON the editor sends:
//!
//! ```json
//! {
//!   "engineKind": "postgresql",
//!   "host": "db.internal",
//!   "port": 5432,
//!   "credentials": { "username": "reader", "password": "..." },
//!   "databaseName": "shop",
//!   "tunnel": { "host": "bastion", "username": "ops",
//!               "auth": { "method": "privateKey", "path": "~/.ssh/id_ed25519" } }
//! }
//! ```
//!
//! File-backed drivers read `host` as a filesystem path.

use std::fmt;

use serde::{Deserialize, Serialize};

use schemagraph_core::EngineKind;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    pub engine_kind: EngineKind,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub credentials: Credentials,
    pub database_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<TunnelDescriptor>,
}

impl ConnectionDescriptor {
    pub fn new(engine_kind: EngineKind, host: impl Into<String>, database_name: impl Into<String>) -> Self {
        ConnectionDescriptor {
            engine_kind,
            host: host.into(),
            port: None,
            credentials: Credentials::default(),
            database_name: database_name.into(),
            tunnel: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_tunnel(mut self, tunnel: TunnelDescriptor) -> Self {
        self.tunnel = Some(tunnel);
        self
    }

    /// The engine's own address, falling back to the engine's well-known port.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port.or_else(|| default_port(self.engine_kind)),
        }
    }

    /// A log-safe description of the target: no credentials.
    pub fn redacted(&self) -> String {
        format!("{}://{}/{}", self.engine_kind, self.endpoint(), self.database_name)
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("engine_kind", &self.engine_kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credentials", &self.credentials)
            .field("database_name", &self.database_name)
            .field("tunnel", &self.tunnel)
            .finish()
    }
}

/// Well-known listening port of a networked engine.
pub fn default_port(kind: EngineKind) -> Option<u16> {
    match kind {
        EngineKind::Postgresql => Some(5432),
        EngineKind::Mysql => Some(3306),
        EngineKind::Mongodb => Some(27017),
        EngineKind::Sqlite => None,
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A jump host the engine is only reachable through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelDescriptor {
    pub host: String,
    #[serde(default = "default_tunnel_port")]
    pub port: u16,
    pub username: String,
    pub auth: TunnelAuth,
}

fn default_tunnel_port() -> u16 {
    22
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum TunnelAuth {
    Password {
        password: String,
    },
    #[serde(rename_all = "camelCase")]
    PrivateKey {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase: Option<String>,
    },
}

impl fmt::Debug for TunnelAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelAuth::Password { .. } => f.debug_struct("Password").finish_non_exhaustive(),
            TunnelAuth::PrivateKey { path, .. } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .finish_non_exhaustive(),
        }
    }
}

/// A host and optional port to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: Option<u16>,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_camel_case_with_tunnel() {
        let descriptor: ConnectionDescriptor = serde_json::from_value(json!({
            "engineKind": "postgresql",
            "host": "db.internal",
            "credentials": {"username": "reader", "password": "hunter2"},
            "databaseName": "shop",
            "tunnel": {
                "host": "bastion",
                "username": "ops",
                "auth": {"method": "privateKey", "path": "/keys/id_ed25519"}
            }
        }))
        .unwrap();

        assert_eq!(descriptor.endpoint().to_string(), "db.internal:5432");
        let tunnel = descriptor.tunnel.as_ref().unwrap();
        assert_eq!(tunnel.port, 22);
        assert!(matches!(tunnel.auth, TunnelAuth::PrivateKey { .. }));
    }

    #[test]
    fn test_debug_never_prints_secrets() {
        let descriptor = ConnectionDescriptor::new(EngineKind::Mysql, "db", "shop")
            .with_credentials(Credentials::new("reader", "hunter2"))
            .with_tunnel(TunnelDescriptor {
                host: "bastion".into(),
                port: 22,
                username: "ops".into(),
                auth: TunnelAuth::Password {
                    password: "s3cret".into(),
                },
            });
        let debug = format!("{descriptor:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("reader"));
        assert_eq!(descriptor.redacted(), "mysql://db:3306/shop");
    }
}
