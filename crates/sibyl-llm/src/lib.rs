//! LLM provider abstraction: chat completion and batch text embedding.

pub mod error;
mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
mod retry;

pub use error::LlmError;
#[cfg(feature = "mock")]
pub use mock::MockProvider;
pub use provider::{ChatOptions, LlmProvider, Message, Role};
