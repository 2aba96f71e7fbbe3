//! Recognition job: one authorized request's claim on the engine.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Created only after authorization allowed the request; dropped once the
/// gateway has its result.
#[derive(Debug, Clone)]
pub struct RecognitionJob {
    pub correlation_id: Uuid,
    pub image: Vec<u8>,
    pub submitted_at: DateTime<Utc>,
}

impl RecognitionJob {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            image,
            submitted_at: Utc::now(),
        }
    }

    /// Milliseconds since the job was submitted.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.submitted_at).num_milliseconds()
    }
}
