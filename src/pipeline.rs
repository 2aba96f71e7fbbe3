//! Recognition pipeline: runs one job on an engine the caller already holds.

use std::time::Instant;

use thiserror::Error;

use crate::engine::{EngineHandle, RecognitionJob};
use crate::ocr::OcrError;

/// The engine accepted the job but could not extract text.
///
/// Per-job: it never changes the engine's lifecycle state.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("empty image")]
    EmptyImage,
    #[error("{0}")]
    Engine(#[from] OcrError),
}

/// Extracted text for one job.
#[derive(Debug, Clone)]
pub struct Recognition {
    /// May be empty for a blank or unreadable image.
    pub text: String,
    pub processing_time_ms: u64,
}

/// Submit the job's image to the held engine and wait for the text.
///
/// No retries: a caller that wants another attempt must acquire the engine
/// again.
pub async fn recognize(
    handle: &mut EngineHandle,
    job: &RecognitionJob,
) -> Result<Recognition, RecognitionError> {
    if job.image.is_empty() {
        return Err(RecognitionError::EmptyImage);
    }

    let start = Instant::now();
    let result = handle.engine().recognize(&job.image).await;
    let processing_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(text) => {
            tracing::info!(
                job = %job.correlation_id,
                "Recognized {} chars in {}ms",
                text.chars().count(),
                processing_time_ms
            );
            Ok(Recognition {
                text,
                processing_time_ms,
            })
        }
        Err(e) => {
            tracing::warn!(job = %job.correlation_id, "Recognition failed: {}", e);
            Err(e.into())
        }
    }
}
