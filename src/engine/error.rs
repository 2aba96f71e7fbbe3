//! Engine lifecycle error types.

use thiserror::Error;

use crate::ocr::OcrError;

use super::state::EngineState;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine cannot take work right now (loading, draining, stopped, failed).
    #[error("OCR engine unavailable: {state}")]
    Unavailable { state: EngineState },
    /// Too many jobs are already waiting for the engine.
    #[error("OCR engine queue is full ({depth} waiting)")]
    QueueFull { depth: usize },
    /// Loading the runtime or a language model failed. Never retried.
    #[error("OCR engine failed to initialize: {0}")]
    InitFailure(#[source] OcrError),
}

impl EngineError {
    /// Whether a client could reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Unavailable { state } => matches!(
                state,
                EngineState::Uninitialized | EngineState::Loading
            ),
            EngineError::QueueFull { .. } => true,
            EngineError::InitFailure(_) => false,
        }
    }
}
