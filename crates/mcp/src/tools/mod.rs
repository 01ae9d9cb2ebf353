pub mod api;
mod registry;

pub use api::{ApiRequestTool, ApiTool};
pub use registry::{json_schema_object, json_schema_string, json_schema_typed, Tool, ToolRegistry};
