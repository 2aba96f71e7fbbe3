//! OCR engine abstraction.
//!
//! An engine is loaded in steps (runtime, then each language model, then a
//! final initialization for the whole language set) and afterwards serves one
//! recognition at a time. Engines are not required to be safe for concurrent
//! use; `engine::EngineManager` is the only owner and serializes access.

use async_trait::async_trait;
use thiserror::Error;

use super::languages::LanguageSet;

/// Errors from OCR engines.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Available OCR engine types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcrEngineType {
    /// Tesseract OCR via command-line.
    Tesseract,
    /// In-process engine used by tests.
    Scripted,
}

impl OcrEngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrEngineType::Tesseract => "tesseract",
            OcrEngineType::Scripted => "scripted",
        }
    }
}

impl std::fmt::Display for OcrEngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for stateful OCR engines.
#[async_trait]
pub trait OcrEngine: Send {
    /// Get the engine type.
    fn engine_type(&self) -> OcrEngineType;

    /// Load the engine runtime. Called once, before any language.
    async fn load_runtime(&mut self) -> Result<(), OcrError>;

    /// Load the model for a single language.
    async fn load_language(&mut self, language: &str) -> Result<(), OcrError>;

    /// Initialize recognition for the full language set.
    async fn initialize(&mut self, languages: &LanguageSet) -> Result<(), OcrError>;

    /// Extract text from raw image bytes.
    async fn recognize(&mut self, image: &[u8]) -> Result<String, OcrError>;

    /// Release everything the engine loaded.
    async fn shutdown(&mut self) -> Result<(), OcrError>;
}

/// Normalize engine output: whitespace-only output counts as empty text.
pub fn normalize_text(raw: &str) -> String {
    if raw.trim().is_empty() {
        String::new()
    } else {
        raw.to_string()
    }
}
