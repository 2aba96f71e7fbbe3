//! OCR engines.
//!
//! - Tesseract via its command-line binary (default)
//! - A scripted in-process engine for tests
//!
//! Engines are stateful and not safe for concurrent use; the gateway never
//! touches one directly and goes through `engine::EngineManager` instead.

mod backend;
mod languages;
mod scripted;
mod tesseract;

pub use backend::{normalize_text, OcrEngine, OcrEngineType, OcrError};
pub use languages::{LanguageSet, LanguageSetError, DEFAULT_LANGUAGES};
pub use scripted::{ScriptedEngine, ScriptedProbe};
pub use tesseract::TesseractEngine;
