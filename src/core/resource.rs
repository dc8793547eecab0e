// ! Resource and resource-template specs and handlers
// !
// ! Resources are URI-addressed content blobs; templates match whole
// ! families of URIs and extract variables for their handler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::context::RequestContext;
use crate::core::error::{McpError, McpResult};
use crate::core::tool::NAME_PATTERN;
use crate::protocol::types::ResourceContents;
use crate::utils::uri::{validate_uri, UriTemplate};

/// Wire-facing resource descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSpec {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
}

impl ResourceSpec {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
            size: None,
            annotations: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn validate(&self) -> McpResult<()> {
        validate_uri(&self.uri)?;
        if !NAME_PATTERN.is_match(&self.name) {
            return Err(McpError::validation(format!(
                "resource name '{}' must match [A-Za-z0-9_-]+",
                self.name
            )));
        }
        Ok(())
    }
}

/// Wire-facing resource-template descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateSpec {
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
    /// Argument name -> registered completion provider id
    #[serde(skip_serializing, default)]
    pub completion_providers: HashMap<String, String>,
}

impl TemplateSpec {
    pub fn new(uri_template: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri_template: uri_template.into(),
            name: name.into(),
            description: None,
            mime_type: None,
            annotations: None,
            completion_providers: HashMap::new(),
        }
    }

    pub fn with_completion_provider(
        mut self,
        argument: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        self.completion_providers
            .insert(argument.into(), provider_id.into());
        self
    }

    pub fn validate(&self) -> McpResult<()> {
        if !NAME_PATTERN.is_match(&self.name) {
            return Err(McpError::validation(format!(
                "template name '{}' must match [A-Za-z0-9_-]+",
                self.name
            )));
        }
        Ok(())
    }
}

/// Trait for implementing resource read handlers.
///
/// For template-backed reads, `params` carries the variables extracted from
/// the URI; exact resources see an empty map.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(
        &self,
        uri: &str,
        params: &HashMap<String, String>,
        context: &RequestContext,
    ) -> McpResult<Vec<ResourceContents>>;
}

/// Closure adapter for simple text resources
pub struct FnResource<F>(pub F)
where
    F: Fn(&str, &HashMap<String, String>) -> McpResult<String> + Send + Sync;

#[async_trait]
impl<F> ResourceHandler for FnResource<F>
where
    F: Fn(&str, &HashMap<String, String>) -> McpResult<String> + Send + Sync,
{
    async fn read(
        &self,
        uri: &str,
        params: &HashMap<String, String>,
        _context: &RequestContext,
    ) -> McpResult<Vec<ResourceContents>> {
        let text = (self.0)(uri, params)?;
        Ok(vec![ResourceContents::text(uri.to_string(), text)])
    }
}

/// A registered exact resource
#[derive(Clone)]
pub struct Resource {
    pub spec: ResourceSpec,
    pub handler: Arc<dyn ResourceHandler>,
}

impl Resource {
    pub fn new<H>(spec: ResourceSpec, handler: H) -> McpResult<Self>
    where
        H: ResourceHandler + 'static,
    {
        spec.validate()?;
        Ok(Self {
            spec,
            handler: Arc::new(handler),
        })
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource").field("spec", &self.spec).finish()
    }
}

/// A registered resource template with its compiled matcher
#[derive(Clone)]
pub struct ResourceTemplate {
    pub spec: TemplateSpec,
    pub template: UriTemplate,
    pub handler: Arc<dyn ResourceHandler>,
}

impl ResourceTemplate {
    pub fn new<H>(spec: TemplateSpec, handler: H) -> McpResult<Self>
    where
        H: ResourceHandler + 'static,
    {
        spec.validate()?;
        let template = UriTemplate::compile(&spec.uri_template)?;
        Ok(Self {
            spec,
            template,
            handler: Arc::new(handler),
        })
    }
}

impl std::fmt::Debug for ResourceTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTemplate")
            .field("spec", &self.spec)
            .finish()
    }
}
