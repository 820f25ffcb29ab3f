//! Ollama HTTP transport (local or remote model server)

pub mod client;
pub mod ndjson;
pub mod types;

pub use client::OllamaHttpBackend;
pub use ndjson::decode_chunks;
