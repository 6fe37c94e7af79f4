pub mod client;
pub mod client_impl;
pub mod extract;
pub mod factory;
pub mod prompts;

pub use client::{CompletionRequest, LlmClient, MockLlmClient, ScriptedLlmClient};
