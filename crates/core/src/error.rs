//! Error types for the docforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Parsing problems are recoverable and usually handled inside the engine;
//! model and transport problems are surfaced to the caller.

use thiserror::Error;

/// The top-level error type for all docforge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Representation errors ---
    #[error("Representation not found: {name}")]
    NotFound { name: String },

    #[error("Invalid value for representation '{name}': {reason}")]
    InvalidRepresentation { name: String, reason: String },

    // --- Model errors ---
    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(#[from] ProviderError),

    // --- Collaborator errors ---
    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Failed to read file '{name}': {reason}")]
    FileRead { name: String, reason: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}
