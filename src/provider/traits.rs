//! LLM Provider abstraction.
//!
//! The runtime only needs an opaque "generate text, possibly with tool calls"
//! capability. Concrete provider bindings implement [`LlmProvider`] outside
//! this crate.

use super::types::{GenerateRequest, Generation, StreamChunk};
use anyhow::Result;
use futures_util::Stream;
use std::pin::Pin;

/// Type alias for streaming response
pub type StreamingResponse = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Core trait that all LLM providers must implement
///
/// # Example
///
/// ```ignore
/// use erk::provider::{GenerateRequest, LlmProvider};
///
/// async fn use_provider(provider: &dyn LlmProvider, request: GenerateRequest) -> anyhow::Result<()> {
///     let generation = provider.generate(&request).await?;
///     if generation.tool_calls.is_empty() {
///         println!("Response: {}", generation.text);
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a complete response
    ///
    /// # Returns
    /// The response text, any tool calls, and the usage of this generation
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation>;

    /// Generate a streaming response
    ///
    /// The stream yields text deltas and ends with exactly one
    /// [`StreamChunk::Finished`]. The default implementation wraps
    /// [`generate`](LlmProvider::generate) without deltas.
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<StreamingResponse> {
        let generation = self.generate(request).await?;
        Ok(Box::pin(futures_util::stream::iter(vec![Ok(
            StreamChunk::Finished(generation),
        )])))
    }

    /// Get the provider name for logging and debugging
    fn provider_name(&self) -> &str;
}
