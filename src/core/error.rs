// ! Error types for the quartz-mcp protocol engine
// !
// ! Module defines all error kinds that can occur while serving MCP traffic,
// ! each carrying enough context to be mapped onto a JSON-RPC wire code.

use thiserror::Error;

use crate::protocol::types::error_codes;

/// The main error type for the protocol engine
#[derive(Error, Debug, Clone)]
pub enum McpError {
    /// Malformed framing or JSON that could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// A JSON value that is not a valid JSON-RPC envelope
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown method name
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Method exists but the matching server capability is disabled
    #[error("Capability disabled: {0}")]
    CapabilityDisabled(String),

    /// Invalid parameters, including schema validation failures
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Requested tool was not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Requested resource was not found
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Requested prompt was not found
    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    /// Request arrived before the initialization handshake completed
    #[error("Client not initialized: {0}")]
    NotInitialized(String),

    /// Client requested a protocol version the server does not speak
    #[error("Unsupported protocol version: {0}")]
    UnsupportedProtocolVersion(String),

    /// Session id not known to the session store
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Transport-related errors (connection, framing, I/O)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid URI or URI template supplied at registration
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Registration-time validation failures (spec shape, schema compile)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Handler-raised failures surfaced to the caller
    #[error("Handler error: {0}")]
    Handler(String),

    /// Session or cache back-end failures
    #[error("Cache error: {0}")]
    Cache(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors from the standard library
    #[error("I/O error: {0}")]
    Io(String),

    /// Request exceeded its dispatch deadline
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        McpError::Io(err.to_string())
    }
}

impl From<url::ParseError> for McpError {
    fn from(err: url::ParseError) -> Self {
        McpError::InvalidUri(err.to_string())
    }
}

/// Result type alias for engine operations
pub type McpResult<T> = Result<T, McpError>;

impl McpError {
    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new invalid-params error
    pub fn invalid_params<S: Into<String>>(message: S) -> Self {
        Self::InvalidParams(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// The JSON-RPC error code this error maps to on the wire
    pub fn jsonrpc_code(&self) -> i64 {
        match self {
            McpError::Parse(_) => error_codes::PARSE_ERROR,
            McpError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            McpError::MethodNotFound(_) | McpError::CapabilityDisabled(_) => {
                error_codes::METHOD_NOT_FOUND
            }
            McpError::InvalidParams(_)
            | McpError::ToolNotFound(_)
            | McpError::PromptNotFound(_)
            | McpError::Validation(_)
            | McpError::InvalidUri(_) => error_codes::INVALID_PARAMS,
            McpError::NotInitialized(_) => error_codes::NOT_INITIALIZED,
            McpError::UnsupportedProtocolVersion(_) | McpError::ResourceNotFound(_) => {
                error_codes::RESOURCE_NOT_FOUND
            }
            _ => error_codes::INTERNAL_ERROR,
        }
    }

    /// The message exposed on the wire. Internal failures are sanitized;
    /// everything else passes its display form through.
    pub fn public_message(&self) -> String {
        match self {
            McpError::Internal(_)
            | McpError::Io(_)
            | McpError::Cache(_)
            | McpError::Serialization(_)
            | McpError::Transport(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Get the error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            McpError::Parse(_) | McpError::InvalidRequest(_) => "protocol",
            McpError::MethodNotFound(_) | McpError::CapabilityDisabled(_) => "dispatch",
            McpError::InvalidParams(_) | McpError::Validation(_) | McpError::InvalidUri(_) => {
                "validation"
            }
            McpError::ToolNotFound(_)
            | McpError::ResourceNotFound(_)
            | McpError::PromptNotFound(_)
            | McpError::SessionNotFound(_) => "not_found",
            McpError::NotInitialized(_) | McpError::UnsupportedProtocolVersion(_) => "handshake",
            McpError::Transport(_) | McpError::Io(_) => "transport",
            McpError::Handler(_) => "handler",
            McpError::Cache(_) => "cache",
            McpError::Serialization(_) => "serialization",
            McpError::Timeout(_) => "timeout",
            McpError::Internal(_) => "internal",
        }
    }
}
