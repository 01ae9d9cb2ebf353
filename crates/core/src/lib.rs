// Core of the MCP relay: upstream connections and the API dispatcher

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;

pub use config::{ParamConfig, ParamType, ProxyConfig, ToolConfig};
pub use connection::{AuthType, Connection, ConnectionRegistry};
pub use dispatcher::{Dispatcher, HttpMethod};
pub use error::{ConfigError, DispatchError, ErrorEnvelope};
