//! Generation Provider Integration
//!
//! The pipeline talks to the model through the `GenerationProvider` trait;
//! `gemini` is the shipped implementation.

pub mod gemini;
pub mod provider;
pub mod types;

pub use gemini::GeminiProvider;
pub use provider::GenerationProvider;
pub use types::{DocumentAttachment, LlmError, LlmResult, ProviderConfig};
