//! LLM Provider abstraction module
//!
//! This module provides the provider trait and the request/response types
//! the runtime exchanges with it.

pub mod traits;
pub mod types;

pub use traits::{LlmProvider, StreamingResponse};
pub use types::{GenerateRequest, Generation, StreamChunk};
