//! Error types for the yugent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all yugent operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Composition errors (raised before any request is sent) ---
    #[error("No model layer found; add exactly one model layer before executing")]
    MissingModelLayer,

    #[error("Multiple model layers found ({0}); only one model layer may be composed")]
    DuplicateModelLayer(usize),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Schema derivation ---
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Tool round limit reached after {0} rounds")]
    ToolRoundLimit(usize),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Non-success HTTP status. `message` is the raw response body.
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Stream ended before the [DONE] sentinel")]
    StreamIncomplete,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// No registered layer matches the requested id or name.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The model sent argument text that is not valid JSON.
    #[error("Invalid tool arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("No interface or type literal declaration found")]
    NoDeclaration,

    #[error("Unterminated {what} starting at offset {offset}")]
    Unterminated { what: &'static str, offset: usize },

    #[error("Unexpected {found} at offset {offset}, expected {expected}")]
    Unexpected {
        found: String,
        expected: &'static str,
        offset: usize,
    },
}
