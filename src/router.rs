use crate::server::OnboardingMcp;
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Implementation, InitializeRequestParam,
        InitializeResult, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo, Tool, ToolsCapability,
    },
    service::RequestContext,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Router(pub OnboardingMcp);

fn schema(value: serde_json::Value) -> Arc<serde_json::Map<String, serde_json::Value>> {
    Arc::new(value.as_object().cloned().unwrap_or_default())
}

fn tool(name: &'static str, title: &'static str, description: &'static str, input: serde_json::Value) -> Tool {
    Tool {
        name: name.into(),
        title: Some(title.into()),
        description: Some(description.into()),
        input_schema: schema(input),
        icons: None,
        annotations: None,
        output_schema: None,
        meta: None,
    }
}

fn internal(e: anyhow::Error) -> McpError {
    McpError {
        code: rmcp::model::ErrorCode::INTERNAL_ERROR,
        message: e.to_string().into(),
        data: None,
    }
}

impl ServerHandler for Router {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "playerparent-onboarding".to_string(),
                title: Some("Player/Parent Onboarding".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: None,
                icons: None,
            },
            ..Default::default()
        }
    }

    async fn initialize(
        &self,
        request: InitializeRequestParam,
        _context: RequestContext<rmcp::service::RoleServer>,
    ) -> std::result::Result<InitializeResult, McpError> {
        let mut info = self.get_info();
        info.protocol_version = request.protocol_version.clone();
        Ok(info)
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<rmcp::service::RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        let empty = serde_json::json!({ "type": "object" });
        let tools = vec![
            tool(
                "health",
                "Health",
                "Check profile store connectivity and config surface",
                empty.clone(),
            ),
            tool(
                "status",
                "Status",
                "Count profiles and parent links; report consistency failures",
                empty,
            ),
            tool(
                "resolve_step",
                "Resolve step",
                "Compute the onboarding step a user belongs on",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "user_id": { "type": "string" },
                        "step": { "type": "integer", "minimum": 1, "maximum": 7 }
                    },
                    "required": ["user_id"]
                }),
            ),
        ];

        Ok(ListToolsResult {
            tools,
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<rmcp::service::RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let args = request.arguments;
        match request.name.as_ref() {
            "health" => self.0.handle_health(args).await.map_err(internal),
            "status" => self.0.handle_status(args).await.map_err(internal),
            "resolve_step" => self.0.handle_resolve_step(args).await.map_err(|e| McpError {
                code: rmcp::model::ErrorCode::INVALID_PARAMS,
                message: e.to_string().into(),
                data: None,
            }),
            _ => Err(McpError {
                code: rmcp::model::ErrorCode::METHOD_NOT_FOUND,
                message: format!("Unknown tool: {}", request.name).into(),
                data: None,
            }),
        }
    }
}
