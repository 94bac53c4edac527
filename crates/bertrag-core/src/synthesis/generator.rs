//! The [`Generator`] capability interface: a remote or local text-generation
//! backend consumed by [`super::Synthesizer`].
//!
//! Grounded on `llmspell-providers::ProviderInstance` (the `#[async_trait]`
//! shape `complete`/`validate`/`name`/`model` used elsewhere in the corpus
//! for wrapping a generation backend) — the teacher itself never calls a
//! remote generation model, so this trait has no direct teacher analogue.
//! [`StaticGenerator`] is a reference/test implementation; a production
//! vendor HTTP client is out of scope.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),
    #[error("generation request failed: {0}")]
    RequestFailed(String),
    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

/// A text-generation backend. `is_available` lets the synthesizer decide
/// up front whether to attempt generation at all or fall back directly to
/// the extractive path.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        cancel: &CancellationToken,
    ) -> Result<String>;

    async fn is_available(&self) -> bool;

    fn model_name(&self) -> &str;
}

/// A reference [`Generator`] that returns pre-seeded text, standing in for
/// a production LLM client. Useful for tests and for environments with no
/// generation backend configured (the synthesizer then always takes the
/// extractive fallback path).
pub struct StaticGenerator {
    response: String,
    available: bool,
}

impl StaticGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            response: String::new(),
            available: false,
        }
    }
}

#[async_trait]
impl Generator for StaticGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _temperature: f32,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(GeneratorError::Cancelled);
        }
        if !self.available {
            return Err(GeneratorError::Unavailable("generator marked unavailable".to_string()));
        }
        Ok(self.response.clone())
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    fn model_name(&self) -> &str {
        "static-reference-generator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_generator_returns_seeded_response() {
        let generator = StaticGenerator::new("hello world");
        let out = generator.generate("prompt", 0.7, &CancellationToken::new()).await.unwrap();
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn unavailable_generator_reports_false() {
        let generator = StaticGenerator::unavailable();
        assert!(!generator.is_available().await);
        let result = generator.generate("prompt", 0.7, &CancellationToken::new()).await;
        assert!(result.is_err());
    }
}
