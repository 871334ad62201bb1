//! Language-model endpoint implementations for actloop.
//!
//! All providers implement the `actloop_core::Provider` trait.

pub mod ollama;

pub use ollama::OllamaProvider;
