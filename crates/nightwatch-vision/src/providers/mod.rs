//! Concrete [`crate::provider::VisionProvider`] implementations, one per
//! backend.

pub mod anthropic;
pub mod gemini;
pub mod openai_compatible;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai_compatible::OpenAiCompatibleProvider;
