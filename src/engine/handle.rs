//! Engine handle: exclusive access to the engine for one job.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::ocr::OcrEngine;

use super::Counters;

/// Exclusive claim on the engine, granted by `EngineManager::acquire`.
///
/// Consumed by `release()`. Dropping it on any other path (an early return,
/// a panic, a cancelled request) releases it too, so every successful acquire
/// is matched by exactly one release.
pub struct EngineHandle {
    guard: OwnedMutexGuard<Box<dyn OcrEngine>>,
    correlation_id: Uuid,
    counters: Arc<Counters>,
    acquired_at: Instant,
}

impl EngineHandle {
    pub(crate) fn new(
        guard: OwnedMutexGuard<Box<dyn OcrEngine>>,
        correlation_id: Uuid,
        counters: Arc<Counters>,
    ) -> Self {
        counters.acquired.fetch_add(1, Ordering::SeqCst);
        counters.set_holder(Some(correlation_id));
        Self {
            guard,
            correlation_id,
            counters,
            acquired_at: Instant::now(),
        }
    }

    /// Job currently holding the engine.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// The engine itself. Only the recognition pipeline calls this.
    pub(crate) fn engine(&mut self) -> &mut dyn OcrEngine {
        self.guard.as_mut()
    }

    /// Return the engine to the next queued job.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.counters.set_holder(None);
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            job = %self.correlation_id,
            "Released OCR engine after {}ms",
            self.acquired_at.elapsed().as_millis()
        );
    }
}
