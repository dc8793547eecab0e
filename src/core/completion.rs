// ! Completion providers for prompt and template arguments
// !
// ! Providers are registered by opaque id; prompt and template specs map
// ! argument names onto those ids. `completion/complete` resolves the
// ! mapping and invokes the provider.

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::context::RequestContext;
use crate::core::error::McpResult;

/// Trait for argument completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Produce candidate values for `argument` given the partial `value`
    async fn complete(
        &self,
        argument: &str,
        value: &str,
        context: &RequestContext,
    ) -> McpResult<Vec<String>>;
}

/// Completion over a fixed candidate list, filtered by prefix
pub struct ListCompletionProvider {
    candidates: Vec<String>,
}

impl ListCompletionProvider {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl CompletionProvider for ListCompletionProvider {
    async fn complete(
        &self,
        _argument: &str,
        value: &str,
        _context: &RequestContext,
    ) -> McpResult<Vec<String>> {
        Ok(self
            .candidates
            .iter()
            .filter(|c| c.starts_with(value))
            .cloned()
            .collect())
    }
}

/// Closure adapter for ad-hoc providers
pub struct FnCompletionProvider<F>(pub F)
where
    F: Fn(&str, &str) -> McpResult<Vec<String>> + Send + Sync;

#[async_trait]
impl<F> CompletionProvider for FnCompletionProvider<F>
where
    F: Fn(&str, &str) -> McpResult<Vec<String>> + Send + Sync,
{
    async fn complete(
        &self,
        argument: &str,
        value: &str,
        _context: &RequestContext,
    ) -> McpResult<Vec<String>> {
        (self.0)(argument, value)
    }
}

/// Shared handle type stored in the registry
pub type SharedCompletionProvider = Arc<dyn CompletionProvider>;
