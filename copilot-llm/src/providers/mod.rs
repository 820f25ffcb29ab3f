//! Model transports
//!
//! - `ollama`: the Ollama-compatible HTTP API (primary, blocking and streaming)
//! - `process`: the local model runtime driven through stdin (secondary, blocking only)

pub mod ollama;
pub mod process;

pub use ollama::OllamaHttpBackend;
pub use process::ProcessBackend;
