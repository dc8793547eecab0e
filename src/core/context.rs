// ! Request context handed to artifact handlers

use serde_json::Value;
use std::collections::HashMap;

/// Per-invocation context passed to tool, resource, prompt, and completion
/// handlers. Carries the session identity plus a read-only snapshot of the
/// session's attribute bag taken at dispatch time.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Session the request arrived on (`"stdio"` for the stdio transport)
    pub session_id: String,
    /// Attribute snapshot from the session record
    pub attributes: HashMap<String, Value>,
}

impl RequestContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            attributes: HashMap::new(),
        }
    }

    /// Dot-path attribute lookup: `get_attribute("user.name")` walks nested
    /// objects. A helper over the plain map, not a separate store.
    pub fn get_attribute(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.attributes.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}
