//! Generative-AI provider wire formats

pub mod gemini;

// Re-export for convenience
pub use gemini::{GenerateContentRequest, PredictRequest};
