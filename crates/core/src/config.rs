// Relay configuration: upstream connections and the tools exposed over MCP

use crate::connection::{Connection, ConnectionRegistry};
use crate::dispatcher::{HttpMethod, DEFAULT_TIMEOUT};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Used when no configuration file is present
const BUILTIN_CONFIG: &str = r#"
name = "Todo List MCP"
timeout_secs = 30

[connections.todo_api]
base_url = "https://jsonplaceholder.typicode.com"
auth_type = "none"

[[tools]]
name = "list_todos"
description = "List todos, optionally filtered by user or completion state"
connection = "todo_api"
method = "GET"
endpoint = "/todos"
params = [
    { name = "userId", type = "integer", description = "Only todos owned by this user" },
    { name = "completed", type = "boolean", description = "Only todos with this completion state" },
]

[[tools]]
name = "get_todo"
description = "Fetch a single todo by id"
connection = "todo_api"
method = "GET"
endpoint = "/todos/{id}"
params = [
    { name = "id", type = "integer", description = "Todo id", required = true },
]

[[tools]]
name = "create_todo"
description = "Create a new todo"
connection = "todo_api"
method = "POST"
endpoint = "/todos"
params = [
    { name = "title", type = "string", description = "Todo title", required = true },
    { name = "completed", type = "boolean", description = "Whether the todo is already done" },
    { name = "userId", type = "integer", description = "Owner of the todo" },
]

[[tools]]
name = "update_todo"
description = "Replace the fields of an existing todo"
connection = "todo_api"
method = "PUT"
endpoint = "/todos/{id}"
params = [
    { name = "id", type = "integer", description = "Todo id", required = true },
    { name = "title", type = "string", description = "New title" },
    { name = "completed", type = "boolean", description = "New completion state" },
    { name = "userId", type = "integer", description = "New owner" },
]

[[tools]]
name = "delete_todo"
description = "Delete a todo by id"
connection = "todo_api"
method = "DELETE"
endpoint = "/todos/{id}"
params = [
    { name = "id", type = "integer", description = "Todo id", required = true },
]
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Project name reported to MCP clients
    #[serde(default = "default_name")]
    pub name: String,

    /// Upstream response timeout shared by every call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Also expose the generic `api_request` tool
    #[serde(default)]
    pub expose_raw_request: bool,

    #[serde(default)]
    pub connections: HashMap<String, Connection>,

    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

/// A tool bound to one endpoint of one connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub connection: String,
    pub method: HttpMethod,
    /// Path appended to the connection's base URL; `{param}` placeholders
    /// are filled from the arguments
    pub endpoint: String,
    #[serde(default)]
    pub params: Vec<ParamConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// JSON schema type advertised for a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

fn default_name() -> String {
    "mcp-relay".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl ProxyConfig {
    /// Load and validate a config file, falling back to the built-in todo
    /// configuration when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)?
        } else {
            tracing::info!(path = %path.display(), "Configuration file not found, using built-in defaults");
            Self::builtin()?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// The built-in "Todo List MCP" configuration
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_CONFIG)
    }

    /// Check cross references that serde alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, connection) in &self.connections {
            Url::parse(&connection.base_url).map_err(|e| {
                ConfigError::Invalid(format!(
                    "connection `{}` has invalid base_url `{}`: {}",
                    name, connection.base_url, e
                ))
            })?;
        }

        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate tool name `{}`", tool.name)));
            }

            if !self.connections.contains_key(&tool.connection) {
                return Err(ConfigError::Invalid(format!(
                    "tool `{}` references unknown connection `{}`",
                    tool.name, tool.connection
                )));
            }

            let mut params = HashSet::new();
            for param in &tool.params {
                if !params.insert(param.name.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "tool `{}` declares parameter `{}` twice",
                        tool.name, param.name
                    )));
                }
            }

            for placeholder in path_placeholders(&tool.endpoint) {
                if !tool.params.iter().any(|p| p.name == placeholder) {
                    return Err(ConfigError::Invalid(format!(
                        "tool `{}` endpoint uses undeclared parameter `{}`",
                        tool.name, placeholder
                    )));
                }
            }
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the immutable connection registry
    pub fn registry(&self) -> ConnectionRegistry {
        ConnectionRegistry::from(self.connections.clone())
    }
}

/// Names of `{placeholder}` segments in an endpoint template, in order
pub fn path_placeholders(endpoint: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = endpoint;

    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                if !name.is_empty() {
                    names.push(name);
                }
                rest = &after[end + 1..];
            }
            None => break,
        }
    }

    names
}
