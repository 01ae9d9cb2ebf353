// MCP (Model Context Protocol) layer of the relay
// Exposes configured upstream API calls as tools to agent clients

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
