// ! Request processor
// !
// ! The dispatch core: takes a decoded message plus the session it arrived
// ! on, enforces handshake ordering and capability gates, routes to the
// ! registry and handlers, and produces the reply (or nothing, for
// ! notifications).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
#[cfg(test)]
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::context::RequestContext;
use crate::core::error::{McpError, McpResult};
use crate::core::validation::prepare_arguments;
use crate::protocol::messages::*;
use crate::protocol::methods;
use crate::protocol::types::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, ServerInfo,
    ServerMessage,
};
use crate::registry::Registry;
use crate::session::{Session, SessionStore};

/// Default page size for the `*/list` methods
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// The request-processing state machine
pub struct RequestProcessor {
    info: ServerInfo,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    registry: Arc<Registry>,
    sessions: Arc<dyn SessionStore>,
    page_limit: usize,
}

impl RequestProcessor {
    pub fn new(
        info: ServerInfo,
        capabilities: ServerCapabilities,
        instructions: Option<String>,
        registry: Arc<Registry>,
        sessions: Arc<dyn SessionStore>,
        page_limit: usize,
    ) -> Self {
        Self {
            info,
            capabilities,
            instructions,
            registry,
            sessions,
            page_limit,
        }
    }

    /// Process a request, always producing a reply
    pub async fn process_request(&self, session_id: &str, request: JsonRpcRequest) -> ServerMessage {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;
        match self.dispatch(session_id, &method, params).await {
            Ok(result) => ServerMessage::Response(JsonRpcResponse::new(id, result)),
            Err(error) => {
                tracing::debug!(
                    session = %session_id,
                    method = %method,
                    category = error.category(),
                    "request failed: {error}"
                );
                ServerMessage::Error(JsonRpcError::new(
                    id,
                    error.jsonrpc_code(),
                    error.public_message(),
                ))
            }
        }
    }

    /// Process a notification; failures are logged, never surfaced
    pub async fn process_notification(&self, session_id: &str, notification: JsonRpcNotification) {
        let method = notification.method.clone();
        if let Err(error) = self
            .dispatch_notification(session_id, &method, notification.params)
            .await
        {
            tracing::warn!(
                session = %session_id,
                method = %method,
                "notification failed: {error}"
            );
        }
    }

    async fn dispatch(
        &self,
        session_id: &str,
        method: &str,
        params: Option<Value>,
    ) -> McpResult<Value> {
        self.sessions.touch(session_id).await?;

        if !methods::HANDSHAKE_METHODS.contains(&method) {
            let initialized = self
                .sessions
                .get(session_id)
                .await?
                .is_some_and(|s| s.initialized);
            if !initialized {
                return Err(McpError::NotInitialized(format!(
                    "method '{method}' requires an initialized session"
                )));
            }
        }

        match method {
            methods::INITIALIZE => self.handle_initialize(session_id, params).await,
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => {
                self.require_tools()?;
                self.handle_tools_list(params).await
            }
            methods::TOOLS_CALL => {
                self.require_tools()?;
                self.handle_tools_call(session_id, params).await
            }
            methods::RESOURCES_LIST => {
                self.require_resources()?;
                self.handle_resources_list(params).await
            }
            methods::RESOURCES_TEMPLATES_LIST => {
                self.require_resources()?;
                self.handle_templates_list(params).await
            }
            methods::RESOURCES_READ => {
                self.require_resources()?;
                self.handle_resources_read(session_id, params).await
            }
            methods::RESOURCES_SUBSCRIBE => {
                self.require_subscribe()?;
                self.handle_subscription(session_id, params, true).await
            }
            methods::RESOURCES_UNSUBSCRIBE => {
                self.require_subscribe()?;
                self.handle_subscription(session_id, params, false).await
            }
            methods::PROMPTS_LIST => {
                self.require_prompts()?;
                self.handle_prompts_list(params).await
            }
            methods::PROMPTS_GET => {
                self.require_prompts()?;
                self.handle_prompts_get(session_id, params).await
            }
            methods::COMPLETION_COMPLETE => self.handle_complete(session_id, params).await,
            methods::LOGGING_SET_LEVEL => {
                self.require_logging()?;
                self.handle_set_level(session_id, params).await
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    async fn dispatch_notification(
        &self,
        session_id: &str,
        method: &str,
        _params: Option<Value>,
    ) -> McpResult<()> {
        self.sessions.touch(session_id).await?;

        match method {
            methods::INITIALIZED => {
                // Only meaningful after initialize has been answered; a
                // premature notification has no observable effect.
                if let Some(mut session) = self.sessions.get(session_id).await? {
                    if session.client_info.is_some() {
                        session.initialized = true;
                        self.sessions.put(session).await?;
                        tracing::debug!(session = %session_id, "session initialized");
                    } else {
                        tracing::debug!(
                            session = %session_id,
                            "ignoring notifications/initialized before initialize"
                        );
                    }
                }
                Ok(())
            }
            other => {
                tracing::debug!(method = %other, "ignoring unknown notification");
                Ok(())
            }
        }
    }

    // ========================================================================
    // Capability gates
    // ========================================================================

    fn require_tools(&self) -> McpResult<()> {
        if self.capabilities.tools.is_none() {
            return Err(McpError::CapabilityDisabled(
                "tools capability is not enabled".to_string(),
            ));
        }
        Ok(())
    }

    fn require_resources(&self) -> McpResult<()> {
        if self.capabilities.resources.is_none() {
            return Err(McpError::CapabilityDisabled(
                "resources capability is not enabled".to_string(),
            ));
        }
        Ok(())
    }

    fn require_subscribe(&self) -> McpResult<()> {
        let enabled = self
            .capabilities
            .resources
            .as_ref()
            .is_some_and(|r| r.subscribe == Some(true));
        if !enabled {
            return Err(McpError::CapabilityDisabled(
                "resources.subscribe capability is not enabled".to_string(),
            ));
        }
        Ok(())
    }

    fn require_prompts(&self) -> McpResult<()> {
        if self.capabilities.prompts.is_none() {
            return Err(McpError::CapabilityDisabled(
                "prompts capability is not enabled".to_string(),
            ));
        }
        Ok(())
    }

    fn require_logging(&self) -> McpResult<()> {
        if self.capabilities.logging.is_none() {
            return Err(McpError::CapabilityDisabled(
                "logging capability is not enabled".to_string(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    async fn handle_initialize(
        &self,
        session_id: &str,
        params: Option<Value>,
    ) -> McpResult<Value> {
        let params: InitializeParams = decode_params(params, "initialize")?;

        let mut session = match self.sessions.get(session_id).await? {
            Some(session) => session,
            None => self.sessions.create(session_id).await?,
        };
        if session.initialized {
            return Err(McpError::InvalidRequest(
                "session is already initialized".to_string(),
            ));
        }

        // Accept the client's version when we speak it; otherwise answer
        // with our preferred version and let the client decide.
        let negotiated = if SUPPORTED_PROTOCOL_VERSIONS.contains(&params.protocol_version.as_str())
        {
            params.protocol_version.clone()
        } else {
            tracing::debug!(
                requested = %params.protocol_version,
                offered = LATEST_PROTOCOL_VERSION,
                "unsupported protocol version requested"
            );
            LATEST_PROTOCOL_VERSION.to_string()
        };

        session.client_info = Some(params.client_info);
        session.protocol_version = Some(negotiated.clone());
        self.sessions.put(session).await?;

        let result = InitializeResult {
            protocol_version: negotiated,
            capabilities: self.capabilities.clone(),
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    // ========================================================================
    // Tools
    // ========================================================================

    async fn handle_tools_list(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ListParams = decode_params_or_default(params, "tools/list")?;
        let specs: Vec<_> = self
            .registry
            .all_tools()
            .await
            .into_iter()
            .map(|t| t.spec)
            .collect();
        let (tools, next_cursor) = paginate(specs, params.cursor, self.page_limit)?;
        Ok(serde_json::to_value(ListToolsResult { tools, next_cursor })?)
    }

    async fn handle_tools_call(
        &self,
        session_id: &str,
        params: Option<Value>,
    ) -> McpResult<Value> {
        let params: CallToolParams = decode_params(params, "tools/call")?;

        let tool = self
            .registry
            .find_tool(&params.name)
            .await
            .ok_or_else(|| McpError::ToolNotFound(params.name.clone()))?;

        // Validation failures surface as -32602 and never reach the handler.
        let arguments = prepare_arguments(
            &params.name,
            &tool.validator,
            &tool.spec.input_schema,
            params.arguments.unwrap_or_default(),
        )?;

        let context = self.request_context(session_id).await;
        // Handler failures are tool output, not protocol errors: the session
        // survives and the client sees an isError result.
        let result = match tool.handler.call(arguments, &context).await {
            Ok(result) => result,
            Err(error) => {
                tracing::debug!(tool = %params.name, "tool handler failed: {error}");
                CallToolResult::error(error.to_string())
            }
        };
        Ok(serde_json::to_value(result)?)
    }

    // ========================================================================
    // Resources
    // ========================================================================

    async fn handle_resources_list(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ListParams = decode_params_or_default(params, "resources/list")?;
        let specs: Vec<_> = self
            .registry
            .all_resources()
            .await
            .into_iter()
            .map(|r| r.spec)
            .collect();
        let (resources, next_cursor) = paginate(specs, params.cursor, self.page_limit)?;
        Ok(serde_json::to_value(ListResourcesResult {
            resources,
            next_cursor,
        })?)
    }

    async fn handle_templates_list(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ListParams = decode_params_or_default(params, "resources/templates/list")?;
        let specs: Vec<_> = self
            .registry
            .all_templates()
            .await
            .into_iter()
            .map(|t| t.spec)
            .collect();
        let (resource_templates, next_cursor) = paginate(specs, params.cursor, self.page_limit)?;
        Ok(serde_json::to_value(ListResourceTemplatesResult {
            resource_templates,
            next_cursor,
        })?)
    }

    async fn handle_resources_read(
        &self,
        session_id: &str,
        params: Option<Value>,
    ) -> McpResult<Value> {
        let params: ReadResourceParams = decode_params(params, "resources/read")?;

        let (handler, variables) = self
            .registry
            .resolve_resource(&params.uri)
            .await
            .ok_or_else(|| McpError::ResourceNotFound(params.uri.clone()))?;

        let context = self.request_context(session_id).await;
        let contents = handler
            .read(&params.uri, &variables, &context)
            .await
            .map_err(|e| McpError::Handler(format!("resource '{}': {e}", params.uri)))?;
        Ok(serde_json::to_value(ReadResourceResult { contents })?)
    }

    async fn handle_subscription(
        &self,
        session_id: &str,
        params: Option<Value>,
        subscribe: bool,
    ) -> McpResult<Value> {
        let params: SubscribeParams = decode_params(params, "resources/subscribe")?;

        let mut session = self.require_session(session_id).await?;
        if subscribe {
            session.subscribe(params.uri);
        } else {
            session.unsubscribe(&params.uri);
        }
        self.sessions.put(session).await?;
        Ok(json!({}))
    }

    // ========================================================================
    // Prompts
    // ========================================================================

    async fn handle_prompts_list(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ListParams = decode_params_or_default(params, "prompts/list")?;
        let specs: Vec<_> = self
            .registry
            .all_prompts()
            .await
            .into_iter()
            .map(|p| p.spec)
            .collect();
        let (prompts, next_cursor) = paginate(specs, params.cursor, self.page_limit)?;
        Ok(serde_json::to_value(ListPromptsResult {
            prompts,
            next_cursor,
        })?)
    }

    async fn handle_prompts_get(
        &self,
        session_id: &str,
        params: Option<Value>,
    ) -> McpResult<Value> {
        let params: GetPromptParams = decode_params(params, "prompts/get")?;

        let prompt = self
            .registry
            .find_prompt(&params.name)
            .await
            .ok_or_else(|| McpError::PromptNotFound(params.name.clone()))?;

        let arguments = params.arguments.unwrap_or_default();
        for declared in &prompt.spec.arguments {
            if declared.required && !arguments.contains_key(&declared.name) {
                return Err(McpError::invalid_params(format!(
                    "prompt '{}': missing required argument '{}'",
                    params.name, declared.name
                )));
            }
        }
        for supplied in arguments.keys() {
            if !prompt.spec.arguments.iter().any(|a| &a.name == supplied) {
                return Err(McpError::invalid_params(format!(
                    "prompt '{}': unknown argument '{supplied}'",
                    params.name
                )));
            }
        }

        let context = self.request_context(session_id).await;
        let result = prompt
            .handler
            .render(arguments, &context)
            .await
            .map_err(|e| McpError::Handler(format!("prompt '{}': {e}", params.name)))?;
        Ok(serde_json::to_value(result)?)
    }

    // ========================================================================
    // Completion
    // ========================================================================

    async fn handle_complete(&self, session_id: &str, params: Option<Value>) -> McpResult<Value> {
        let params: CompleteParams = decode_params(params, "completion/complete")?;

        let provider_id = match &params.reference {
            CompletionReference::Prompt { name } => {
                let prompt = self
                    .registry
                    .find_prompt(name)
                    .await
                    .ok_or_else(|| McpError::PromptNotFound(name.clone()))?;
                prompt
                    .spec
                    .completion_providers
                    .get(&params.argument.name)
                    .cloned()
            }
            CompletionReference::Resource { uri } => {
                let template = self
                    .registry
                    .find_template(uri)
                    .await
                    .ok_or_else(|| McpError::ResourceNotFound(uri.clone()))?;
                template
                    .spec
                    .completion_providers
                    .get(&params.argument.name)
                    .cloned()
            }
        };

        let values = match provider_id {
            Some(id) => match self.registry.find_completion_provider(&id).await {
                Some(provider) => {
                    let context = self.request_context(session_id).await;
                    provider
                        .complete(&params.argument.name, &params.argument.value, &context)
                        .await
                        .map_err(|e| McpError::Handler(format!("completion '{id}': {e}")))?
                }
                None => {
                    tracing::warn!(provider = %id, "completion provider not registered");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        Ok(serde_json::to_value(CompleteResult {
            completion: Completion::capped(values),
        })?)
    }

    // ========================================================================
    // Logging
    // ========================================================================

    async fn handle_set_level(&self, session_id: &str, params: Option<Value>) -> McpResult<Value> {
        let params: SetLevelParams = decode_params(params, "logging/setLevel")?;

        let mut session = self.require_session(session_id).await?;
        session.log_level = Some(params.level);
        self.sessions.put(session).await?;
        Ok(json!({}))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn require_session(&self, session_id: &str) -> McpResult<Session> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| McpError::SessionNotFound(session_id.to_string()))
    }

    async fn request_context(&self, session_id: &str) -> RequestContext {
        let attributes = self
            .sessions
            .get(session_id)
            .await
            .ok()
            .flatten()
            .map(|s| s.attributes)
            .unwrap_or_default();
        RequestContext {
            session_id: session_id.to_string(),
            attributes,
        }
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
    method: &str,
) -> McpResult<T> {
    let params =
        params.ok_or_else(|| McpError::invalid_params(format!("{method}: missing params")))?;
    serde_json::from_value(params)
        .map_err(|e| McpError::invalid_params(format!("{method}: {e}")))
}

fn decode_params_or_default<T: serde::de::DeserializeOwned + Default>(
    params: Option<Value>,
    method: &str,
) -> McpResult<T> {
    match params {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| McpError::invalid_params(format!("{method}: {e}"))),
        None => Ok(T::default()),
    }
}

/// Offset pagination behind an opaque base64 cursor, items in insertion order
fn paginate<T>(
    items: Vec<T>,
    cursor: Option<String>,
    limit: usize,
) -> McpResult<(Vec<T>, Option<String>)> {
    let offset = match cursor {
        Some(cursor) => decode_cursor(&cursor)?,
        None => 0,
    };

    let total = items.len();
    let page: Vec<T> = items.into_iter().skip(offset).take(limit).collect();
    let next_offset = offset + page.len();
    let next_cursor = (next_offset < total).then(|| encode_cursor(next_offset));
    Ok((page, next_cursor))
}

fn encode_cursor(offset: usize) -> String {
    BASE64.encode(offset.to_string())
}

fn decode_cursor(cursor: &str) -> McpResult<usize> {
    let bytes = BASE64
        .decode(cursor)
        .map_err(|_| McpError::invalid_params("invalid pagination cursor"))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| McpError::invalid_params("invalid pagination cursor"))?;
    text.parse()
        .map_err(|_| McpError::invalid_params("invalid pagination cursor"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::prompt::{FnPrompt, PromptArgument, PromptSpec};
    use crate::core::resource::{FnResource, ResourceSpec, TemplateSpec};
    use crate::core::tool::{FnTool, ToolSpec};
    use crate::registry::SpecOrigin;
    use crate::session::InMemorySessionStore;
    use pretty_assertions::assert_eq;

    struct Fixture {
        processor: RequestProcessor,
        sessions: Arc<InMemorySessionStore>,
        registry: Arc<Registry>,
    }

    async fn fixture() -> Fixture {
        fixture_with(ServerCapabilities::all(), DEFAULT_PAGE_LIMIT).await
    }

    async fn fixture_with(capabilities: ServerCapabilities, page_limit: usize) -> Fixture {
        let registry = Arc::new(Registry::new());
        let sessions = Arc::new(InMemorySessionStore::new());

        registry
            .register_tool(
                ToolSpec::new(
                    "add",
                    json!({
                        "type": "object",
                        "properties": {
                            "a": {"type": "integer"},
                            "b": {"type": "integer"}
                        },
                        "required": ["a", "b"]
                    }),
                ),
                FnTool(|args: HashMap<String, Value>| {
                    let a = args.get("a").and_then(Value::as_i64).unwrap_or(0);
                    let b = args.get("b").and_then(Value::as_i64).unwrap_or(0);
                    Ok(Value::String((a + b).to_string()))
                }),
                SpecOrigin::Manual,
            )
            .await
            .unwrap();

        registry
            .register_tool(
                ToolSpec::new("fail", json!({"type": "object"})),
                FnTool(|_| Err(McpError::Handler("kaboom".to_string()))),
                SpecOrigin::Manual,
            )
            .await
            .unwrap();

        registry
            .register_resource(
                ResourceSpec::new("config://static", "static"),
                FnResource(|_: &str, _: &HashMap<String, String>| Ok("static-value".to_string())),
                SpecOrigin::Manual,
            )
            .await
            .unwrap();

        registry
            .register_template(
                TemplateSpec::new("config://{key}", "config"),
                FnResource(|_: &str, params: &HashMap<String, String>| {
                    Ok(format!("value-of-{}", params.get("key").cloned().unwrap_or_default()))
                }),
                SpecOrigin::Manual,
            )
            .await
            .unwrap();

        registry
            .register_prompt(
                PromptSpec::new("greet")
                    .with_argument(PromptArgument::required("name"))
                    .with_completion_provider("name", "names"),
                FnPrompt(|args: HashMap<String, String>| {
                    Ok(GetPromptResult {
                        description: None,
                        messages: vec![crate::protocol::types::PromptMessage::user(format!(
                            "Hello {}",
                            args.get("name").cloned().unwrap_or_default()
                        ))],
                    })
                }),
                SpecOrigin::Manual,
            )
            .await
            .unwrap();

        registry
            .register_completion_provider(
                "names",
                Arc::new(crate::core::completion::ListCompletionProvider::new([
                    "ada", "alan", "grace",
                ])),
            )
            .await;

        let processor = RequestProcessor::new(
            ServerInfo::new("TestServer", "1.0.0"),
            capabilities,
            None,
            Arc::clone(&registry),
            Arc::clone(&sessions) as Arc<dyn SessionStore>,
            page_limit,
        );
        Fixture {
            processor,
            sessions,
            registry,
        }
    }

    async fn initialized_session(fixture: &Fixture, id: &str) {
        let mut session = fixture.sessions.create(id).await.unwrap();
        session.client_info = Some(ServerInfo::new("c", "1"));
        session.protocol_version = Some(LATEST_PROTOCOL_VERSION.to_string());
        session.initialized = true;
        fixture.sessions.put(session).await.unwrap();
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        let params = if params.is_null() { None } else { Some(params) };
        JsonRpcRequest::new(json!(id), method, params)
    }

    fn expect_result(message: ServerMessage) -> Value {
        match message {
            ServerMessage::Response(response) => response.result,
            ServerMessage::Error(error) => panic!("expected result, got error {:?}", error.error),
        }
    }

    fn expect_error(message: ServerMessage) -> (i64, String) {
        match message {
            ServerMessage::Error(error) => (error.error.code, error.error.message),
            ServerMessage::Response(response) => {
                panic!("expected error, got result {:?}", response.result)
            }
        }
    }

    // ------------------------------------------------------------------
    // Handshake
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_initialize_and_initialized_flow() {
        let fixture = fixture().await;
        fixture.sessions.create("s1").await.unwrap();

        let result = expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(
                        1,
                        methods::INITIALIZE,
                        json!({
                            "protocolVersion": "2024-11-05",
                            "clientInfo": {"name": "c", "version": "1"}
                        }),
                    ),
                )
                .await,
        );
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "TestServer");
        assert!(result["capabilities"]["tools"].is_object());

        // Not initialized until the notification lands
        let session = fixture.sessions.get("s1").await.unwrap().unwrap();
        assert!(!session.initialized);
        assert_eq!(session.client_info.as_ref().unwrap().name, "c");

        fixture
            .processor
            .process_notification(
                "s1",
                JsonRpcNotification::new(methods::INITIALIZED, None),
            )
            .await;
        assert!(fixture.sessions.get("s1").await.unwrap().unwrap().initialized);
    }

    #[tokio::test]
    async fn test_unsupported_version_counters_with_preferred() {
        let fixture = fixture().await;
        fixture.sessions.create("s1").await.unwrap();

        let result = expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(
                        1,
                        methods::INITIALIZE,
                        json!({
                            "protocolVersion": "1999-01-01",
                            "clientInfo": {"name": "c", "version": "1"}
                        }),
                    ),
                )
                .await,
        );
        assert_eq!(result["protocolVersion"], LATEST_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_requests_before_initialization_rejected() {
        let fixture = fixture().await;
        fixture.sessions.create("s1").await.unwrap();

        let (code, _) = expect_error(
            fixture
                .processor
                .process_request("s1", request(1, methods::TOOLS_LIST, Value::Null))
                .await,
        );
        assert_eq!(code, -32001);
    }

    #[tokio::test]
    async fn test_ping_allowed_before_initialization() {
        let fixture = fixture().await;
        fixture.sessions.create("s1").await.unwrap();

        let result = expect_result(
            fixture
                .processor
                .process_request("s1", request(1, methods::PING, Value::Null))
                .await,
        );
        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn test_initialized_before_initialize_has_no_effect() {
        let fixture = fixture().await;
        fixture.sessions.create("s1").await.unwrap();

        fixture
            .processor
            .process_notification(
                "s1",
                JsonRpcNotification::new(methods::INITIALIZED, None),
            )
            .await;
        assert!(!fixture.sessions.get("s1").await.unwrap().unwrap().initialized);
    }

    #[tokio::test]
    async fn test_reinitialize_rejected() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let (code, _) = expect_error(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(
                        1,
                        methods::INITIALIZE,
                        json!({
                            "protocolVersion": "2025-06-18",
                            "clientInfo": {"name": "c", "version": "1"}
                        }),
                    ),
                )
                .await,
        );
        assert_eq!(code, -32600);
    }

    // ------------------------------------------------------------------
    // Capability gates
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_disabled_capability_yields_method_not_found() {
        let fixture = fixture_with(
            ServerCapabilities {
                tools: None,
                ..ServerCapabilities::all()
            },
            DEFAULT_PAGE_LIMIT,
        )
        .await;
        initialized_session(&fixture, "s1").await;

        let (code, message) = expect_error(
            fixture
                .processor
                .process_request("s1", request(1, methods::TOOLS_LIST, Value::Null))
                .await,
        );
        assert_eq!(code, -32601);
        assert!(message.contains("tools"));
    }

    #[tokio::test]
    async fn test_subscribe_requires_subscribe_capability() {
        let fixture = fixture_with(
            ServerCapabilities {
                resources: Some(crate::protocol::types::ResourcesCapability {
                    subscribe: None,
                    list_changed: Some(true),
                }),
                ..ServerCapabilities::all()
            },
            DEFAULT_PAGE_LIMIT,
        )
        .await;
        initialized_session(&fixture, "s1").await;

        let (code, message) = expect_error(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(1, methods::RESOURCES_SUBSCRIBE, json!({"uri": "config://a"})),
                )
                .await,
        );
        assert_eq!(code, -32601);
        assert!(message.contains("subscribe"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let (code, _) = expect_error(
            fixture
                .processor
                .process_request("s1", request(1, "tools/frobnicate", Value::Null))
                .await,
        );
        assert_eq!(code, -32601);
    }

    // ------------------------------------------------------------------
    // Tools
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_tool_call_with_coercion() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let result = expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(
                        3,
                        methods::TOOLS_CALL,
                        json!({"name": "add", "arguments": {"a": "2", "b": 3}}),
                    ),
                )
                .await,
        );
        assert_eq!(result["content"][0]["text"], "5");
        assert_eq!(result["isError"], json!(false));
    }

    #[tokio::test]
    async fn test_tool_call_validation_failure_reports_pointer() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let (code, message) = expect_error(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(
                        3,
                        methods::TOOLS_CALL,
                        json!({"name": "add", "arguments": {"a": "nope", "b": 3}}),
                    ),
                )
                .await,
        );
        assert_eq!(code, -32602);
        assert!(message.contains("/a"), "missing pointer in: {message}");
    }

    #[tokio::test]
    async fn test_tool_handler_error_is_inline_result() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let result = expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(4, methods::TOOLS_CALL, json!({"name": "fail", "arguments": {}})),
                )
                .await,
        );
        assert_eq!(result["isError"], json!(true));
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("kaboom"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let (code, _) = expect_error(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(4, methods::TOOLS_CALL, json!({"name": "missing"})),
                )
                .await,
        );
        assert_eq!(code, -32602);
    }

    // ------------------------------------------------------------------
    // Pagination
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_list_pagination_walks_in_insertion_order() {
        let fixture = fixture_with(ServerCapabilities::all(), 1).await;
        initialized_session(&fixture, "s1").await;

        let first = expect_result(
            fixture
                .processor
                .process_request("s1", request(1, methods::TOOLS_LIST, Value::Null))
                .await,
        );
        assert_eq!(first["tools"][0]["name"], "add");
        let cursor = first["nextCursor"].as_str().unwrap().to_string();

        let second = expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(2, methods::TOOLS_LIST, json!({"cursor": cursor})),
                )
                .await,
        );
        assert_eq!(second["tools"][0]["name"], "fail");
        assert!(second["nextCursor"].is_null());
    }

    #[tokio::test]
    async fn test_invalid_cursor_rejected() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let (code, _) = expect_error(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(1, methods::TOOLS_LIST, json!({"cursor": "!!not-base64!!"})),
                )
                .await,
        );
        assert_eq!(code, -32602);
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_exact_read_beats_template() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let result = expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(1, methods::RESOURCES_READ, json!({"uri": "config://static"})),
                )
                .await,
        );
        assert_eq!(result["contents"][0]["text"], "static-value");
    }

    #[tokio::test]
    async fn test_template_read_extracts_variables() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let result = expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(1, methods::RESOURCES_READ, json!({"uri": "config://timeout"})),
                )
                .await,
        );
        assert_eq!(result["contents"][0]["text"], "value-of-timeout");
    }

    #[tokio::test]
    async fn test_unknown_resource_is_32002() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let (code, _) = expect_error(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(1, methods::RESOURCES_READ, json!({"uri": "nope://missing"})),
                )
                .await,
        );
        assert_eq!(code, -32002);
    }

    #[tokio::test]
    async fn test_subscribe_unsubscribe_roundtrip() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(1, methods::RESOURCES_SUBSCRIBE, json!({"uri": "config://static"})),
                )
                .await,
        );
        assert!(fixture
            .sessions
            .get("s1")
            .await
            .unwrap()
            .unwrap()
            .subscriptions
            .contains("config://static"));

        expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(
                        2,
                        methods::RESOURCES_UNSUBSCRIBE,
                        json!({"uri": "config://static"}),
                    ),
                )
                .await,
        );
        assert!(fixture
            .sessions
            .get("s1")
            .await
            .unwrap()
            .unwrap()
            .subscriptions
            .is_empty());
    }

    // ------------------------------------------------------------------
    // Prompts & completion
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_prompt_get_renders() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let result = expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(
                        1,
                        methods::PROMPTS_GET,
                        json!({"name": "greet", "arguments": {"name": "ada"}}),
                    ),
                )
                .await,
        );
        assert_eq!(result["messages"][0]["content"]["text"], "Hello ada");
    }

    #[tokio::test]
    async fn test_prompt_missing_required_argument() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let (code, message) = expect_error(
            fixture
                .processor
                .process_request("s1", request(1, methods::PROMPTS_GET, json!({"name": "greet"})))
                .await,
        );
        assert_eq!(code, -32602);
        assert!(message.contains("name"));
    }

    #[tokio::test]
    async fn test_prompt_unknown_argument_rejected() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let (code, _) = expect_error(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(
                        1,
                        methods::PROMPTS_GET,
                        json!({"name": "greet", "arguments": {"name": "x", "extra": "y"}}),
                    ),
                )
                .await,
        );
        assert_eq!(code, -32602);
    }

    #[tokio::test]
    async fn test_completion_resolves_provider() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        let result = expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(
                        1,
                        methods::COMPLETION_COMPLETE,
                        json!({
                            "ref": {"type": "ref/prompt", "name": "greet"},
                            "argument": {"name": "name", "value": "a"}
                        }),
                    ),
                )
                .await,
        );
        assert_eq!(result["completion"]["values"], json!(["ada", "alan"]));
    }

    #[tokio::test]
    async fn test_completion_without_provider_is_empty() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;
        fixture
            .registry
            .register_prompt(
                PromptSpec::new("plain").with_argument(PromptArgument::optional("arg")),
                FnPrompt(|_| {
                    Ok(GetPromptResult {
                        description: None,
                        messages: vec![],
                    })
                }),
                SpecOrigin::Manual,
            )
            .await
            .unwrap();

        let result = expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(
                        1,
                        methods::COMPLETION_COMPLETE,
                        json!({
                            "ref": {"type": "ref/prompt", "name": "plain"},
                            "argument": {"name": "arg", "value": ""}
                        }),
                    ),
                )
                .await,
        );
        assert_eq!(result["completion"]["values"], json!([]));
    }

    // ------------------------------------------------------------------
    // Logging
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_set_level_stored_on_session() {
        let fixture = fixture().await;
        initialized_session(&fixture, "s1").await;

        expect_result(
            fixture
                .processor
                .process_request(
                    "s1",
                    request(1, methods::LOGGING_SET_LEVEL, json!({"level": "warning"})),
                )
                .await,
        );
        assert_eq!(
            fixture.sessions.get("s1").await.unwrap().unwrap().log_level,
            Some(crate::protocol::types::LoggingLevel::Warning)
        );
    }

    // ------------------------------------------------------------------
    // Pagination helper
    // ------------------------------------------------------------------

    #[test]
    fn test_paginate_cursor_roundtrip() {
        let items: Vec<i32> = (0..5).collect();
        let (page, cursor) = paginate(items.clone(), None, 2).unwrap();
        assert_eq!(page, vec![0, 1]);
        let (page, cursor) = paginate(items.clone(), cursor, 2).unwrap();
        assert_eq!(page, vec![2, 3]);
        let (page, cursor) = paginate(items, cursor, 2).unwrap();
        assert_eq!(page, vec![4]);
        assert!(cursor.is_none());
    }
}
