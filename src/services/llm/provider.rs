//! Generation Provider Trait
//!
//! Defines the interface the pipeline uses to obtain raw model output.
//! Latency here dominates the wall-clock time of a stage execution.

use async_trait::async_trait;

use super::types::{DocumentAttachment, LlmError, LlmResult};

/// Trait that all generation providers must implement.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Run one prompt against the model with the given document attachments
    /// and return the raw response text, unparsed.
    async fn generate(
        &self,
        prompt: &str,
        documents: &[DocumentAttachment],
    ) -> LlmResult<String>;

    /// Check if the provider is healthy and reachable.
    /// For API providers, this validates the API key.
    async fn health_check(&self) -> LlmResult<()>;
}

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Helper function to map HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("{}: HTTP {}: {}", provider, status, body),
        },
    }
}
