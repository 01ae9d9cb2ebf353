// API dispatcher: one tool invocation in, one upstream HTTP call out

use crate::connection::ConnectionRegistry;
use crate::error::{DispatchError, ErrorEnvelope};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Process-wide upstream timeout unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP methods a tool may forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether params travel as query pairs rather than a JSON body
    pub fn sends_query(&self) -> bool {
        matches!(self, Self::Get | Self::Delete)
    }
}

impl FromStr for HttpMethod {
    type Err = DispatchError;

    /// Case-sensitive: `get` is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(DispatchError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Forwards tool invocations to the connections in a [`ConnectionRegistry`].
///
/// Holds a single shared [`Client`]; cloning the dispatcher shares the
/// client's connection pool.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher with its own client using the given response timeout.
    pub fn new(registry: Arc<ConnectionRegistry>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .user_agent(concat!("mcp-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self::with_client(registry, client))
    }

    pub fn with_client(registry: Arc<ConnectionRegistry>, client: Client) -> Self {
        Self { client, registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Call an upstream API and always produce a string.
    ///
    /// Returns the raw response body on success, or a JSON `{"error": ...}`
    /// envelope on any failure. Never propagates an error.
    pub async fn call_api(
        &self,
        connection: &str,
        method: &str,
        endpoint: &str,
        params: &Map<String, Value>,
    ) -> String {
        self.dispatch(connection, method, endpoint, params)
            .await
            .unwrap_or_else(|err| ErrorEnvelope::from(&err).to_json())
    }

    /// Fallible form of [`Dispatcher::call_api`]. Failures are logged here.
    pub async fn dispatch(
        &self,
        connection: &str,
        method: &str,
        endpoint: &str,
        params: &Map<String, Value>,
    ) -> Result<String, DispatchError> {
        let result = self.send(connection, method, endpoint, params).await;
        if let Err(ref err) = result {
            log_failure(connection, method, endpoint, err);
        }
        result
    }

    /// The method and connection are resolved and params encoded before any
    /// network I/O happens.
    async fn send(
        &self,
        connection_name: &str,
        method: &str,
        endpoint: &str,
        params: &Map<String, Value>,
    ) -> Result<String, DispatchError> {
        let method: HttpMethod = method.parse()?;
        let connection = self
            .registry
            .get(connection_name)
            .ok_or_else(|| DispatchError::UnknownConnection(connection_name.to_string()))?;

        let url = format!("{}{}", connection.base_url, endpoint);
        let mut request = self.client.request(method.into(), &url);

        for (name, value) in connection.auth_headers() {
            request = request.header(name, value);
        }

        request = if method.sends_query() {
            request.query(&query_pairs(params)?)
        } else {
            request.json(params)
        };

        debug!(connection = connection_name, method = %method, url = %url, "Dispatching API call");

        let response = request.send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

fn log_failure(connection: &str, method: &str, endpoint: &str, err: &DispatchError) {
    match err {
        DispatchError::Http(_) => {
            error!(connection, method, endpoint, error = %err.message(), "API call failed")
        }
        _ => warn!(connection, method, endpoint, error = %err, "API call rejected"),
    }
}

/// Flatten params into query pairs.
///
/// Scalars use their JSON text, `null` becomes an empty value and arrays of
/// scalars repeat the key. Nested structures are rejected up front.
fn query_pairs(params: &Map<String, Value>) -> Result<Vec<(String, String)>, DispatchError> {
    let mut pairs = Vec::with_capacity(params.len());

    for (name, value) in params {
        match value {
            Value::Array(items) => {
                for item in items {
                    let text = scalar_text(item).ok_or_else(|| DispatchError::InvalidParameter {
                        name: name.clone(),
                        reason: "arrays may only contain scalar values".to_string(),
                    })?;
                    pairs.push((name.clone(), text));
                }
            }
            Value::Object(_) => {
                return Err(DispatchError::InvalidParameter {
                    name: name.clone(),
                    reason: "nested objects cannot be sent as query parameters".to_string(),
                });
            }
            scalar => {
                if let Some(text) = scalar_text(scalar) {
                    pairs.push((name.clone(), text));
                }
            }
        }
    }

    Ok(pairs)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
