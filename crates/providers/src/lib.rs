//! Model backend clients.
//!
//! One OpenAI-compatible implementation covers both model tiers: Ollama
//! exposes `/v1/chat/completions` locally, and the remote endpoints speak
//! the same shape. Streaming is deliberately not used; a companion reply
//! is short and the router wants one complete, validated string.

pub mod chat;

pub use chat::ChatClient;
