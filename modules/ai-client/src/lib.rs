//! Provider-agnostic chat completion client.
//!
//! Speaks the OpenAI `/chat/completions` wire format, which is also served by
//! LiteLLM, vLLM and most self-hosted gateways.

pub mod openai;
pub mod traits;
pub mod util;

pub use openai::OpenAi;
pub use traits::{Message, MessageRole};
