// Tools that forward their arguments to an upstream REST API

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::{json_schema_object, json_schema_string, json_schema_typed, Tool};
use anyhow::{Context, Result};
use relay_core::{Dispatcher, ErrorEnvelope, ToolConfig};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A tool bound to one configured endpoint.
///
/// Arguments named by `{placeholder}` segments of the endpoint are spliced
/// into the path; everything else is forwarded as request params.
pub struct ApiTool {
    config: ToolConfig,
    dispatcher: Arc<Dispatcher>,
}

impl ApiTool {
    pub fn new(config: ToolConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self { config, dispatcher }
    }

    /// Fill endpoint placeholders in one left-to-right pass.
    ///
    /// Spliced values are never rescanned. Consumed arguments are removed
    /// once every placeholder is filled, so a name may repeat in the path.
    fn resolve_endpoint(&self, args: &mut Map<String, Value>) -> Result<String, String> {
        let template = self.config.endpoint.as_str();
        let mut endpoint = String::with_capacity(template.len());
        let mut consumed = Vec::new();
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                break;
            };
            let name = &after[..end];
            endpoint.push_str(&rest[..start]);

            if name.is_empty() {
                endpoint.push_str("{}");
            } else {
                let value = args
                    .get(name)
                    .ok_or_else(|| format!("Missing path parameter: {}", name))?;
                endpoint.push_str(&path_segment(name, value)?);
                consumed.push(name);
            }

            rest = &after[end + 1..];
        }
        endpoint.push_str(rest);

        for name in consumed {
            args.remove(name);
        }

        Ok(endpoint)
    }
}

fn path_segment(name: &str, value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(format!("Path parameter `{}` must be a scalar", name)),
    }
}

#[async_trait::async_trait]
impl Tool for ApiTool {
    fn schema(&self) -> ToolSchema {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.config.params {
            properties.insert(
                param.name.clone(),
                json_schema_typed(param.kind.as_str(), &param.description),
            );
            if param.required {
                required.push(param.name.as_str());
            }
        }

        ToolSchema {
            name: self.config.name.clone(),
            description: self.config.description.clone(),
            input_schema: json_schema_object(Value::Object(properties), required),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let mut args = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let endpoint = match self.resolve_endpoint(&mut args) {
            Ok(endpoint) => endpoint,
            Err(message) => {
                tracing::warn!(tool = %self.config.name, error = %message, "API call rejected");
                return Ok(CallToolResult::error(ErrorEnvelope::new(message).to_json()));
            }
        };

        let result = self
            .dispatcher
            .dispatch(
                &self.config.connection,
                self.config.method.as_str(),
                &endpoint,
                &args,
            )
            .await;

        Ok(match result {
            Ok(body) => CallToolResult::text(body),
            Err(err) => CallToolResult::error(ErrorEnvelope::from(&err).to_json()),
        })
    }
}

/// Generic `api_request` tool exposing the dispatcher directly
pub struct ApiRequestTool {
    dispatcher: Arc<Dispatcher>,
}

impl ApiRequestTool {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[derive(Debug, Deserialize)]
struct ApiRequestArgs {
    connection: String,
    method: String,
    endpoint: String,
    #[serde(default)]
    params: Map<String, Value>,
}

#[async_trait::async_trait]
impl Tool for ApiRequestTool {
    fn schema(&self) -> ToolSchema {
        let connections = self.dispatcher.registry().names().join(", ");

        ToolSchema {
            name: "api_request".to_string(),
            description: format!(
                "Send a request to a configured upstream API. Connections: {}",
                connections
            ),
            input_schema: json_schema_object(
                serde_json::json!({
                    "connection": json_schema_string("Name of the configured connection"),
                    "method": {
                        "type": "string",
                        "enum": ["GET", "POST", "PUT", "DELETE"],
                        "description": "HTTP method"
                    },
                    "endpoint": json_schema_string("Path appended to the connection's base URL"),
                    "params": json_schema_typed(
                        "object",
                        "Query parameters for GET/DELETE, JSON body for POST/PUT"
                    )
                }),
                vec!["connection", "method", "endpoint"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<CallToolResult> {
        let args: ApiRequestArgs =
            serde_json::from_value(arguments).context("Invalid arguments for api_request")?;

        let result = self
            .dispatcher
            .dispatch(&args.connection, &args.method, &args.endpoint, &args.params)
            .await;

        Ok(match result {
            Ok(body) => CallToolResult::text(body),
            Err(err) => CallToolResult::error(ErrorEnvelope::from(&err).to_json()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolContent;
    use relay_core::{Connection, ConnectionRegistry, ProxyConfig};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_dispatcher(base_url: &str) -> Arc<Dispatcher> {
        let registry =
            ConnectionRegistry::new().with_connection("todo_api", Connection::new(base_url));
        Arc::new(Dispatcher::new(Arc::new(registry), Duration::from_secs(5)).unwrap())
    }

    fn builtin_tool(name: &str, dispatcher: Arc<Dispatcher>) -> ApiTool {
        let config = ProxyConfig::builtin().unwrap();
        let tool = config.tools.into_iter().find(|t| t.name == name).unwrap();
        ApiTool::new(tool, dispatcher)
    }

    fn text_of(result: &CallToolResult) -> &str {
        match &result.content[0] {
            ToolContent::Text { text } => text,
        }
    }

    #[test]
    fn test_schema_from_params() {
        let tool = builtin_tool("update_todo", create_dispatcher("http://localhost"));
        let schema = tool.schema();

        assert_eq!(schema.name, "update_todo");
        assert_eq!(schema.input_schema["properties"]["id"]["type"], "integer");
        assert_eq!(schema.input_schema["properties"]["completed"]["type"], "boolean");
        assert_eq!(schema.input_schema["required"], json!(["id"]));
    }

    #[tokio::test]
    async fn test_path_param_spliced_and_rest_sent_as_body() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/todos/7"))
            .and(body_json(json!({"title": "buy milk"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":7}"#))
            .expect(1)
            .mount(&server)
            .await;

        let tool = builtin_tool("update_todo", create_dispatcher(&server.uri()));
        let result = tool
            .execute(json!({"id": 7, "title": "buy milk"}))
            .await
            .unwrap();

        assert_eq!(text_of(&result), r#"{"id":7}"#);
        assert!(result.is_error.is_none());
    }

    #[tokio::test]
    async fn test_query_params_forwarded() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/todos"))
            .and(query_param("userId", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let tool = builtin_tool("list_todos", create_dispatcher(&server.uri()));
        let result = tool.execute(json!({"userId": 1})).await.unwrap();

        assert_eq!(text_of(&result), "[]");
    }

    #[tokio::test]
    async fn test_missing_path_param_is_tool_error() {
        let server = MockServer::start().await;
        let tool = builtin_tool("get_todo", create_dispatcher(&server.uri()));

        let result = tool.execute(json!({})).await.unwrap();

        assert_eq!(result.is_error, Some(true));
        let envelope: ErrorEnvelope = serde_json::from_str(text_of(&result)).unwrap();
        assert_eq!(envelope.error, "Missing path parameter: id");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    fn tool_with_endpoint(endpoint: &str, dispatcher: Arc<Dispatcher>) -> ApiTool {
        let config = ProxyConfig::from_toml_str(&format!(
            r#"
            [connections.todo_api]
            base_url = "http://localhost"

            [[tools]]
            name = "copy_todo"
            connection = "todo_api"
            method = "GET"
            endpoint = "{}"
            params = [
                {{ name = "id", type = "string", required = true }},
                {{ name = "other", type = "string" }},
            ]
            "#,
            endpoint
        ))
        .unwrap();
        let tool = config.tools.into_iter().next().unwrap();
        ApiTool::new(tool, dispatcher)
    }

    #[tokio::test]
    async fn test_repeated_placeholder_uses_same_value() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/todos/7/copy/7"))
            .respond_with(ResponseTemplate::new(200).set_body_string("copied"))
            .expect(1)
            .mount(&server)
            .await;

        let tool = tool_with_endpoint("/todos/{id}/copy/{id}", create_dispatcher(&server.uri()));
        let result = tool.execute(json!({"id": 7})).await.unwrap();

        assert_eq!(text_of(&result), "copied");
        assert!(result.is_error.is_none());

        // The spliced argument is not also sent as a query parameter
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.query().is_none());
    }

    #[test]
    fn test_spliced_value_not_resubstituted() {
        let tool = tool_with_endpoint("/todos/{id}/{other}", create_dispatcher("http://localhost"));
        let mut args = json!({"id": "{other}", "other": "x"})
            .as_object()
            .cloned()
            .unwrap();

        let endpoint = tool.resolve_endpoint(&mut args).unwrap();
        assert_eq!(endpoint, "/todos/{other}/x");
        assert!(args.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_tool_error() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/todos/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tool = builtin_tool("delete_todo", create_dispatcher(&server.uri()));
        let result = tool.execute(json!({"id": "1"})).await.unwrap();

        assert_eq!(result.is_error, Some(true));
        let envelope: ErrorEnvelope = serde_json::from_str(text_of(&result)).unwrap();
        assert!(envelope.error.contains("500"));
    }

    #[tokio::test]
    async fn test_api_request_tool() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/todos"))
            .and(body_json(json!({"title": "buy milk"})))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;

        let tool = ApiRequestTool::new(create_dispatcher(&server.uri()));
        assert!(tool.schema().description.contains("todo_api"));

        let result = tool
            .execute(json!({
                "connection": "todo_api",
                "method": "POST",
                "endpoint": "/todos",
                "params": {"title": "buy milk"}
            }))
            .await
            .unwrap();
        assert_eq!(text_of(&result), "created");

        let result = tool
            .execute(json!({"connection": "todo_api", "method": "PATCH", "endpoint": "/todos"}))
            .await
            .unwrap();
        assert_eq!(text_of(&result), r#"{"error":"Unsupported method: PATCH"}"#);
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_api_request_rejects_bad_arguments() {
        let tool = ApiRequestTool::new(create_dispatcher("http://localhost"));
        assert!(tool.execute(json!({"method": "GET"})).await.is_err());
    }
}
