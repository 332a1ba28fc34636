//! dq-providers: generative-language backends for docquery
//!
//! Implementations of [`dq_core::Provider`] over HTTP.

pub mod gemini;
pub mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
