//! Gemini REST client implementing the Parlance completion boundary.

pub mod client;
pub mod wire;

pub use client::GeminiClient;
pub use wire::ModelInfo;
