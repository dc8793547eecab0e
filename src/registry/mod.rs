//! Artifact registry
//!
//! Thread-safe, insertion-ordered catalog of tools, resources, resource
//! templates, and prompts, plus the completion providers they reference.
//! Entries carry an origin tag: manually registered entries take precedence
//! over discovered ones on key conflicts.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::core::completion::SharedCompletionProvider;
use crate::core::error::McpResult;
use crate::core::prompt::{Prompt, PromptHandler, PromptSpec};
use crate::core::resource::{
    Resource, ResourceHandler, ResourceSpec, ResourceTemplate, TemplateSpec,
};
use crate::core::tool::{Tool, ToolHandler, ToolSpec};

/// Where a registry entry came from. Manual wins over discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecOrigin {
    Manual,
    Discovered,
}

/// Category of a `list_changed` notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChanged {
    Tools,
    Resources,
    Prompts,
}

#[derive(Clone)]
struct Entry<T> {
    item: T,
    origin: SpecOrigin,
}

/// Insertion-ordered map with small catalogs in mind: lookups are linear,
/// iteration preserves registration order.
struct OrderedIndex<T> {
    entries: Vec<(String, Entry<T>)>,
}

impl<T> Default for OrderedIndex<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

enum InsertOutcome {
    Stored,
    IgnoredManualPrecedence,
}

impl<T: Clone> OrderedIndex<T> {
    fn get(&self, key: &str) -> Option<&Entry<T>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    /// Insert with origin precedence. Replacement keeps the original
    /// position so pagination cursors stay stable.
    fn insert(&mut self, key: String, item: T, origin: SpecOrigin) -> InsertOutcome {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                if existing.origin == SpecOrigin::Manual && origin == SpecOrigin::Discovered {
                    return InsertOutcome::IgnoredManualPrecedence;
                }
                *existing = Entry { item, origin };
                InsertOutcome::Stored
            }
            None => {
                self.entries.push((key, Entry { item, origin }));
                InsertOutcome::Stored
            }
        }
    }

    fn remove(&mut self, key: &str) -> Option<T> {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(position).1.item)
    }

    fn values(&self) -> Vec<T> {
        self.entries.iter().map(|(_, e)| e.item.clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The catalog of server-hosted artifacts
pub struct Registry {
    tools: RwLock<OrderedIndex<Tool>>,
    resources: RwLock<OrderedIndex<Resource>>,
    templates: RwLock<OrderedIndex<ResourceTemplate>>,
    prompts: RwLock<OrderedIndex<Prompt>>,
    completion_providers: RwLock<HashMap<String, SharedCompletionProvider>>,
    notifier: broadcast::Sender<ListChanged>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let (notifier, _) = broadcast::channel(64);
        Self {
            tools: RwLock::new(OrderedIndex::default()),
            resources: RwLock::new(OrderedIndex::default()),
            templates: RwLock::new(OrderedIndex::default()),
            prompts: RwLock::new(OrderedIndex::default()),
            completion_providers: RwLock::new(HashMap::new()),
            notifier,
        }
    }

    /// Subscribe to category-level change notifications
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ListChanged> {
        self.notifier.subscribe()
    }

    fn notify(&self, category: ListChanged) {
        // No receivers is fine; notifications are best-effort.
        let _ = self.notifier.send(category);
    }

    // ========================================================================
    // Tools
    // ========================================================================

    pub async fn register_tool<H>(
        &self,
        spec: ToolSpec,
        handler: H,
        origin: SpecOrigin,
    ) -> McpResult<()>
    where
        H: ToolHandler + 'static,
    {
        let name = spec.name.clone();
        let tool = Tool::new(spec, handler)?;
        let outcome = self.tools.write().await.insert(name.clone(), tool, origin);
        match outcome {
            InsertOutcome::Stored => self.notify(ListChanged::Tools),
            InsertOutcome::IgnoredManualPrecedence => {
                tracing::debug!(tool = %name, "discovered tool ignored, manual entry present");
            }
        }
        Ok(())
    }

    pub async fn find_tool(&self, name: &str) -> Option<Tool> {
        self.tools.read().await.get(name).map(|e| e.item.clone())
    }

    pub async fn all_tools(&self) -> Vec<Tool> {
        self.tools.read().await.values()
    }

    pub async fn remove_tool(&self, name: &str) -> Option<Tool> {
        let removed = self.tools.write().await.remove(name);
        if removed.is_some() {
            self.notify(ListChanged::Tools);
        }
        removed
    }

    pub async fn tool_count(&self) -> usize {
        self.tools.read().await.len()
    }

    // ========================================================================
    // Resources
    // ========================================================================

    pub async fn register_resource<H>(
        &self,
        spec: ResourceSpec,
        handler: H,
        origin: SpecOrigin,
    ) -> McpResult<()>
    where
        H: ResourceHandler + 'static,
    {
        let uri = spec.uri.clone();
        let resource = Resource::new(spec, handler)?;
        let outcome = self
            .resources
            .write()
            .await
            .insert(uri.clone(), resource, origin);
        match outcome {
            InsertOutcome::Stored => self.notify(ListChanged::Resources),
            InsertOutcome::IgnoredManualPrecedence => {
                tracing::debug!(uri = %uri, "discovered resource ignored, manual entry present");
            }
        }
        Ok(())
    }

    pub async fn find_resource(&self, uri: &str) -> Option<Resource> {
        self.resources.read().await.get(uri).map(|e| e.item.clone())
    }

    pub async fn all_resources(&self) -> Vec<Resource> {
        self.resources.read().await.values()
    }

    pub async fn remove_resource(&self, uri: &str) -> Option<Resource> {
        let removed = self.resources.write().await.remove(uri);
        if removed.is_some() {
            self.notify(ListChanged::Resources);
        }
        removed
    }

    // ========================================================================
    // Resource Templates
    // ========================================================================

    pub async fn register_template<H>(
        &self,
        spec: TemplateSpec,
        handler: H,
        origin: SpecOrigin,
    ) -> McpResult<()>
    where
        H: ResourceHandler + 'static,
    {
        let key = spec.uri_template.clone();
        let template = ResourceTemplate::new(spec, handler)?;
        let outcome = self
            .templates
            .write()
            .await
            .insert(key.clone(), template, origin);
        match outcome {
            InsertOutcome::Stored => self.notify(ListChanged::Resources),
            InsertOutcome::IgnoredManualPrecedence => {
                tracing::debug!(template = %key, "discovered template ignored, manual entry present");
            }
        }
        Ok(())
    }

    pub async fn find_template(&self, uri_template: &str) -> Option<ResourceTemplate> {
        self.templates
            .read()
            .await
            .get(uri_template)
            .map(|e| e.item.clone())
    }

    pub async fn all_templates(&self) -> Vec<ResourceTemplate> {
        self.templates.read().await.values()
    }

    pub async fn remove_template(&self, uri_template: &str) -> Option<ResourceTemplate> {
        let removed = self.templates.write().await.remove(uri_template);
        if removed.is_some() {
            self.notify(ListChanged::Resources);
        }
        removed
    }

    /// Resolve a `resources/read` URI: the exact index wins; otherwise the
    /// first matching template in registration order, with its extracted
    /// variables.
    pub async fn resolve_resource(
        &self,
        uri: &str,
    ) -> Option<(Arc<dyn ResourceHandler>, HashMap<String, String>)> {
        if let Some(resource) = self.find_resource(uri).await {
            return Some((resource.handler, HashMap::new()));
        }
        for template in self.templates.read().await.values() {
            if let Some(params) = template.template.match_uri(uri) {
                return Some((template.handler, params));
            }
        }
        None
    }

    // ========================================================================
    // Prompts
    // ========================================================================

    pub async fn register_prompt<H>(
        &self,
        spec: PromptSpec,
        handler: H,
        origin: SpecOrigin,
    ) -> McpResult<()>
    where
        H: PromptHandler + 'static,
    {
        let name = spec.name.clone();
        let prompt = Prompt::new(spec, handler)?;
        let outcome = self
            .prompts
            .write()
            .await
            .insert(name.clone(), prompt, origin);
        match outcome {
            InsertOutcome::Stored => self.notify(ListChanged::Prompts),
            InsertOutcome::IgnoredManualPrecedence => {
                tracing::debug!(prompt = %name, "discovered prompt ignored, manual entry present");
            }
        }
        Ok(())
    }

    pub async fn find_prompt(&self, name: &str) -> Option<Prompt> {
        self.prompts.read().await.get(name).map(|e| e.item.clone())
    }

    pub async fn all_prompts(&self) -> Vec<Prompt> {
        self.prompts.read().await.values()
    }

    pub async fn remove_prompt(&self, name: &str) -> Option<Prompt> {
        let removed = self.prompts.write().await.remove(name);
        if removed.is_some() {
            self.notify(ListChanged::Prompts);
        }
        removed
    }

    // ========================================================================
    // Completion Providers
    // ========================================================================

    pub async fn register_completion_provider(
        &self,
        id: impl Into<String>,
        provider: SharedCompletionProvider,
    ) {
        self.completion_providers
            .write()
            .await
            .insert(id.into(), provider);
    }

    pub async fn find_completion_provider(&self, id: &str) -> Option<SharedCompletionProvider> {
        self.completion_providers.read().await.get(id).cloned()
    }
}
