// ! Prompt specs and handlers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::core::context::RequestContext;
use crate::core::error::{McpError, McpResult};
use crate::core::tool::NAME_PATTERN;
use crate::protocol::messages::GetPromptResult;

/// One declared prompt argument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptArgument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl PromptArgument {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: false,
        }
    }
}

/// Wire-facing prompt descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
    /// Argument name -> registered completion provider id
    #[serde(skip_serializing, default)]
    pub completion_providers: HashMap<String, String>,
}

impl PromptSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
            completion_providers: HashMap::new(),
        }
    }

    pub fn with_argument(mut self, argument: PromptArgument) -> Self {
        self.arguments.push(argument);
        self
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
                "prompt name '{}' must match [A-Za-z0-9_-]+",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for argument in &self.arguments {
            if !seen.insert(argument.name.as_str()) {
                return Err(McpError::validation(format!(
                    "prompt '{}': duplicate argument '{}'",
                    self.name, argument.name
                )));
            }
        }
        Ok(())
    }
}

/// Trait for implementing prompt handlers
#[async_trait]
pub trait PromptHandler: Send + Sync {
    /// Render the prompt with the supplied arguments
    async fn render(
        &self,
        arguments: HashMap<String, String>,
        context: &RequestContext,
    ) -> McpResult<GetPromptResult>;
}

/// Closure adapter for simple prompts
pub struct FnPrompt<F>(pub F)
where
    F: Fn(HashMap<String, String>) -> McpResult<GetPromptResult> + Send + Sync;

#[async_trait]
impl<F> PromptHandler for FnPrompt<F>
where
    F: Fn(HashMap<String, String>) -> McpResult<GetPromptResult> + Send + Sync,
{
    async fn render(
        &self,
        arguments: HashMap<String, String>,
        _context: &RequestContext,
    ) -> McpResult<GetPromptResult> {
        (self.0)(arguments)
    }
}

/// A registered prompt
#[derive(Clone)]
pub struct Prompt {
    pub spec: PromptSpec,
    pub handler: Arc<dyn PromptHandler>,
}

impl Prompt {
    pub fn new<H>(spec: PromptSpec, handler: H) -> McpResult<Self>
    where
        H: PromptHandler + 'static,
    {
        spec.validate()?;
        Ok(Self {
            spec,
            handler: Arc::new(handler),
        })
    }
}

impl std::fmt::Debug for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompt").field("spec", &self.spec).finish()
    }
}
