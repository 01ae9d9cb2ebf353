// Upstream connections and their static authentication headers

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default header name for `api_key` auth when `key_name` is not configured
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Authentication scheme attached to every request on a connection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    ApiKey,
    Bearer,
    /// Any auth type this build does not know; contributes no headers
    #[serde(other)]
    Unrecognized,
}

/// A named upstream HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Absolute URL prefix; endpoints are appended verbatim
    pub base_url: String,
    #[serde(default)]
    pub auth_type: AuthType,
    /// Auth-type specific settings (`key_name`, `api_key`, `token`)
    #[serde(default)]
    pub auth_config: HashMap<String, String>,
}

impl Connection {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_type: AuthType::None,
            auth_config: HashMap::new(),
        }
    }

    pub fn with_api_key(mut self, key_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.auth_type = AuthType::ApiKey;
        self.auth_config.insert("key_name".to_string(), key_name.into());
        self.auth_config.insert("api_key".to_string(), api_key.into());
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.auth_type = AuthType::Bearer;
        self.auth_config.insert("token".to_string(), token.into());
        self
    }

    /// Headers this connection's auth scheme contributes
    pub fn auth_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();

        match self.auth_type {
            AuthType::ApiKey => {
                let key_name = self
                    .auth_config
                    .get("key_name")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_API_KEY_HEADER);
                let api_key = self.auth_config.get("api_key").cloned().unwrap_or_default();
                headers.insert(key_name.to_string(), api_key);
            }
            AuthType::Bearer => {
                let token = self
                    .auth_config
                    .get("token")
                    .map(String::as_str)
                    .unwrap_or_default();
                headers.insert("Authorization".to_string(), format!("Bearer {}", token));
            }
            AuthType::None | AuthType::Unrecognized => {}
        }

        headers
    }
}

/// Read-only set of upstream connections, keyed by name
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_connection(mut self, name: impl Into<String>, connection: Connection) -> Self {
        self.insert(name, connection);
        self
    }

    /// Register a connection, replacing any previous one with the same name
    pub fn insert(&mut self, name: impl Into<String>, connection: Connection) {
        self.connections.insert(name.into(), connection);
    }

    pub fn get(&self, name: &str) -> Option<&Connection> {
        self.connections.get(name)
    }

    /// Registered connection names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.connections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Auth headers for a connection.
    ///
    /// An unknown name yields an empty header set rather than an error.
    pub fn headers_for(&self, connection_name: &str) -> HashMap<String, String> {
        self.get(connection_name)
            .map(Connection::auth_headers)
            .unwrap_or_default()
    }
}

impl From<HashMap<String, Connection>> for ConnectionRegistry {
    fn from(connections: HashMap<String, Connection>) -> Self {
        Self { connections }
    }
}
