// ! MCP server facade
// !
// ! Ties the engine together: the registry the host populates, the session
// ! store, the request processor, and a bound transport driven by the
// ! protocol adapter. Also wires the two background concerns: the session
// ! reaper and the pump fanning registry change notifications out to
// ! initialized sessions.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::core::completion::CompletionProvider;
use crate::core::error::McpResult;
use crate::core::prompt::{PromptHandler, PromptSpec};
use crate::core::resource::{ResourceHandler, ResourceSpec, TemplateSpec};
use crate::core::tool::{ToolHandler, ToolSpec};
use crate::protocol::messages::LoggingMessageParams;
use crate::protocol::methods;
use crate::protocol::types::{
    JsonRpcNotification, LoggingLevel, ServerCapabilities, ServerInfo,
};
use crate::registry::{ListChanged, Registry, SpecOrigin};
use crate::server::adapter::ProtocolAdapter;
use crate::server::processor::{RequestProcessor, DEFAULT_PAGE_LIMIT};
use crate::session::{
    InMemorySessionStore, SessionStore, DEFAULT_REAP_INTERVAL_SECS, DEFAULT_SESSION_TTL_SECS,
};
#[cfg(feature = "http")]
use crate::transport::http::{HttpServerTransport, HttpTransportConfig};
#[cfg(feature = "stdio")]
use crate::transport::stdio::StdioServerTransport;
use crate::transport::traits::ServerTransport;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Page size for the `*/list` methods
    pub page_limit: usize,
    /// Session time-to-live in seconds
    pub session_ttl_secs: u64,
    /// Interval between session reaper sweeps in seconds
    pub reap_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            reap_interval_secs: DEFAULT_REAP_INTERVAL_SECS,
        }
    }
}

/// The MCP server
pub struct McpServer {
    info: ServerInfo,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    config: ServerConfig,
    registry: Arc<Registry>,
    sessions: Arc<dyn SessionStore>,
}

impl McpServer {
    /// Create a server with the in-memory session store and all
    /// capabilities enabled
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_session_store(
            name,
            version,
            Arc::new(InMemorySessionStore::with_ttl(DEFAULT_SESSION_TTL_SECS)),
        )
    }

    /// Create a server over a caller-supplied session store
    pub fn with_session_store(
        name: impl Into<String>,
        version: impl Into<String>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            info: ServerInfo::new(name.into(), version.into()),
            capabilities: ServerCapabilities::all(),
            instructions: None,
            config: ServerConfig::default(),
            registry: Arc::new(Registry::new()),
            sessions,
        }
    }

    pub fn set_capabilities(&mut self, capabilities: ServerCapabilities) {
        self.capabilities = capabilities;
    }

    pub fn set_instructions(&mut self, instructions: impl Into<String>) {
        self.instructions = Some(instructions.into());
    }

    pub fn set_config(&mut self, config: ServerConfig) {
        self.config = config;
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// The catalog. Public so a discovery layer can insert entries with
    /// `SpecOrigin::Discovered`; the `add_*` methods below register
    /// manually and take precedence.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.sessions)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub async fn add_tool<H>(&self, spec: ToolSpec, handler: H) -> McpResult<()>
    where
        H: ToolHandler + 'static,
    {
        self.registry
            .register_tool(spec, handler, SpecOrigin::Manual)
            .await
    }

    pub async fn add_resource<H>(&self, spec: ResourceSpec, handler: H) -> McpResult<()>
    where
        H: ResourceHandler + 'static,
    {
        self.registry
            .register_resource(spec, handler, SpecOrigin::Manual)
            .await
    }

    pub async fn add_resource_template<H>(&self, spec: TemplateSpec, handler: H) -> McpResult<()>
    where
        H: ResourceHandler + 'static,
    {
        self.registry
            .register_template(spec, handler, SpecOrigin::Manual)
            .await
    }

    pub async fn add_prompt<H>(&self, spec: PromptSpec, handler: H) -> McpResult<()>
    where
        H: PromptHandler + 'static,
    {
        self.registry
            .register_prompt(spec, handler, SpecOrigin::Manual)
            .await
    }

    pub async fn add_completion_provider<P>(&self, id: impl Into<String>, provider: P)
    where
        P: CompletionProvider + 'static,
    {
        self.registry
            .register_completion_provider(id, Arc::new(provider))
            .await;
    }

    // ========================================================================
    // Server-initiated notifications
    // ========================================================================

    /// Tell subscribers that a resource changed
    pub async fn notify_resource_updated(&self, uri: &str) -> McpResult<()> {
        let frame = serde_json::to_string(&JsonRpcNotification::new(
            methods::RESOURCES_UPDATED,
            Some(json!({"uri": uri})),
        ))?;
        for id in self.sessions.all_ids().await? {
            if let Some(session) = self.sessions.get(&id).await? {
                if session.initialized && session.subscriptions.contains(uri) {
                    self.sessions.queue_message(&id, frame.clone()).await?;
                }
            }
        }
        Ok(())
    }

    /// Send a log notification to sessions whose minimum level admits it
    pub async fn notify_log(
        &self,
        level: LoggingLevel,
        logger: Option<String>,
        data: serde_json::Value,
    ) -> McpResult<()> {
        let frame = serde_json::to_string(&JsonRpcNotification::new(
            methods::LOGGING_MESSAGE,
            Some(serde_json::to_value(LoggingMessageParams {
                level,
                logger,
                data,
            })?),
        ))?;
        for id in self.sessions.all_ids().await? {
            if let Some(session) = self.sessions.get(&id).await? {
                let wanted = session.log_level.is_none_or(|minimum| level >= minimum);
                if session.initialized && wanted {
                    self.sessions.queue_message(&id, frame.clone()).await?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Running
    // ========================================================================

    fn processor(&self) -> Arc<RequestProcessor> {
        Arc::new(RequestProcessor::new(
            self.info.clone(),
            self.capabilities.clone(),
            self.instructions.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.sessions),
            self.config.page_limit,
        ))
    }

    /// Background task: registry change stream -> queued notifications
    fn spawn_list_changed_pump(&self) -> tokio::task::JoinHandle<()> {
        let mut changes = self.registry.subscribe_changes();
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(category) => {
                        let method = match category {
                            ListChanged::Tools => methods::TOOLS_LIST_CHANGED,
                            ListChanged::Resources => methods::RESOURCES_LIST_CHANGED,
                            ListChanged::Prompts => methods::PROMPTS_LIST_CHANGED,
                        };
                        let frame = match serde_json::to_string(&JsonRpcNotification::new(
                            method, None,
                        )) {
                            Ok(frame) => frame,
                            Err(e) => {
                                tracing::error!("failed to encode list_changed: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = sessions.queue_message_for_all(frame).await {
                            tracing::warn!("list_changed fanout failed: {e}");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "list_changed receiver lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Background task: periodic TTL sweep over the session store
    fn spawn_reaper(&self) -> tokio::task::JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        let interval = Duration::from_secs(self.config.reap_interval_secs);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            // The first tick fires immediately; skip it.
            tick.tick().await;
            loop {
                tick.tick().await;
                match sessions.reap().await {
                    Ok(removed) if !removed.is_empty() => {
                        tracing::debug!(count = removed.len(), "reaped expired sessions");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("session reap failed: {e}"),
                }
            }
        })
    }

    /// Drive an already-constructed transport until it closes
    pub async fn run_with_transport<T>(&self, mut transport: T) -> McpResult<()>
    where
        T: ServerTransport + 'static,
    {
        let events = transport.start().await?;
        let adapter = ProtocolAdapter::new(transport, self.processor(), Arc::clone(&self.sessions));

        let pump = self.spawn_list_changed_pump();
        let reaper = self.spawn_reaper();

        let outcome = adapter.run(events).await;

        pump.abort();
        reaper.abort();
        outcome
    }

    /// Serve over stdio until the input stream closes
    #[cfg(feature = "stdio")]
    pub async fn run_with_stdio(&self) -> McpResult<()> {
        tracing::info!(server = %self.info.name, "starting stdio server");
        let transport = StdioServerTransport::new(Arc::clone(&self.sessions));
        self.run_with_transport(transport).await
    }

    /// Build the HTTP router for embedding into a host application's axum
    /// server, spawning the adapter and background tasks.
    ///
    /// The returned handle owns the dispatch machinery; abort it to stop
    /// serving.
    #[cfg(feature = "http")]
    pub fn build_http_router(
        &self,
        config: HttpTransportConfig,
        event_store: Option<Arc<dyn crate::transport::sse::EventStore>>,
    ) -> McpResult<(axum::Router, tokio::task::JoinHandle<()>)> {
        let mut transport = HttpServerTransport::with_config(Arc::clone(&self.sessions), config);
        if let Some(event_store) = event_store {
            transport = transport.with_event_store(event_store);
        }
        let (router, events) = transport.build()?;
        let adapter = ProtocolAdapter::new(transport, self.processor(), Arc::clone(&self.sessions));

        let pump = self.spawn_list_changed_pump();
        let reaper = self.spawn_reaper();
        let handle = tokio::spawn(async move {
            let _ = adapter.run(events).await;
            pump.abort();
            reaper.abort();
        });
        Ok((router, handle))
    }

    /// Serve over the streamable HTTP transport
    #[cfg(feature = "http")]
    pub async fn run_with_http(&self, config: HttpTransportConfig) -> McpResult<()> {
        tracing::info!(
            server = %self.info.name,
            addr = %config.bind_addr,
            "starting http server"
        );
        let transport = HttpServerTransport::with_config(Arc::clone(&self.sessions), config);
        self.run_with_transport(transport).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tool::FnTool;
    use serde_json::Value;
    use std::collections::HashMap;

    fn server() -> McpServer {
        McpServer::new("TestServer", "1.0.0")
    }

    #[tokio::test]
    async fn test_registration_is_manual_origin() {
        let server = server();
        server
            .add_tool(
                ToolSpec::new("add", json!({"type": "object"})),
                FnTool(|_: HashMap<String, Value>| Ok(Value::Null)),
            )
            .await
            .unwrap();

        // A discovered duplicate must not displace the manual entry
        server
            .registry()
            .register_tool(
                ToolSpec::new("add", json!({"type": "object"})).with_description("discovered"),
                FnTool(|_: HashMap<String, Value>| Ok(Value::Null)),
                SpecOrigin::Discovered,
            )
            .await
            .unwrap();

        let tool = server.registry().find_tool("add").await.unwrap();
        assert!(tool.spec.description.is_none());
    }

    #[tokio::test]
    async fn test_resource_updated_reaches_only_subscribers() {
        let server = server();
        let sessions = server.session_store();

        let mut subscriber = sessions.create("sub").await.unwrap();
        subscriber.initialized = true;
        subscriber.subscribe("config://a");
        sessions.put(subscriber).await.unwrap();

        let mut bystander = sessions.create("other").await.unwrap();
        bystander.initialized = true;
        sessions.put(bystander).await.unwrap();

        server.notify_resource_updated("config://a").await.unwrap();

        let delivered = sessions.drain("sub").await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains("notifications/resources/updated"));
        assert!(sessions.drain("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_notification_honors_session_level() {
        let server = server();
        let sessions = server.session_store();

        let mut quiet = sessions.create("quiet").await.unwrap();
        quiet.initialized = true;
        quiet.log_level = Some(LoggingLevel::Error);
        sessions.put(quiet).await.unwrap();

        let mut chatty = sessions.create("chatty").await.unwrap();
        chatty.initialized = true;
        chatty.log_level = Some(LoggingLevel::Debug);
        sessions.put(chatty).await.unwrap();

        server
            .notify_log(LoggingLevel::Warning, None, json!("disk filling up"))
            .await
            .unwrap();

        assert!(sessions.drain("quiet").await.unwrap().is_empty());
        assert_eq!(sessions.drain("chatty").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_changed_pump_fans_out() {
        let server = server();
        let sessions = server.session_store();
        let mut ready = sessions.create("ready").await.unwrap();
        ready.initialized = true;
        sessions.put(ready).await.unwrap();

        let pump = server.spawn_list_changed_pump();
        // Let the pump subscribe before triggering a change
        tokio::time::sleep(Duration::from_millis(10)).await;

        server
            .add_tool(
                ToolSpec::new("late", json!({"type": "object"})),
                FnTool(|_: HashMap<String, Value>| Ok(Value::Null)),
            )
            .await
            .unwrap();

        let mut delivered = Vec::new();
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            delivered = sessions.drain("ready").await.unwrap();
            if !delivered.is_empty() {
                break;
            }
        }
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].contains("notifications/tools/list_changed"));

        pump.abort();
    }
}
