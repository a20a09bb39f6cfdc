//! LLM provider implementations for staybot.
//!
//! All providers implement the `staybot_core::Provider` trait.
//! Exactly one is active per process, chosen by configuration.

pub mod factory;
pub mod gemini;
mod http;
pub mod openai;
mod transcript;

pub use factory::build_from_config;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
