//! Provider module for Toolrelay
//!
//! This module contains the model provider abstraction and the Ollama
//! implementation.

pub mod base;
pub mod ollama;

pub use base::{
    Fragment, FragmentStream, FunctionInvocation, GenerateRequest, ModelProvider,
    ToolDeclaration, Turn,
};
pub use ollama::OllamaProvider;

use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::Result;

/// Create the configured provider instance
///
/// # Errors
///
/// Returns error if provider initialization fails
///
/// # Examples
///
/// ```
/// use toolrelay::config::ProviderConfig;
/// use toolrelay::providers::create_provider;
///
/// let provider = create_provider(&ProviderConfig::default()).unwrap();
/// assert_eq!(provider.model_name(), "llama3.2:latest");
/// ```
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn ModelProvider>> {
    Ok(Arc::new(OllamaProvider::new(config.ollama.clone())?))
}
