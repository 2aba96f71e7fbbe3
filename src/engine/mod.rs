//! Engine lifecycle manager.
//!
//! Owns the one OCR engine of the process and drives it through
//! `Uninitialized -> Loading -> Ready -> Draining -> Terminated`. Jobs get
//! exclusive access through `acquire`, strictly in the order they were
//! admitted: the engine sits behind tokio's fair mutex, which hands out the
//! lock in FIFO order, and a waiter whose request is cancelled simply leaves
//! the line.

mod error;
mod handle;
mod job;
mod state;

pub use error::EngineError;
pub use handle::EngineHandle;
pub use job::RecognitionJob;
pub use state::{EngineState, StartupPolicy};

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::ocr::{LanguageSet, OcrEngine, OcrError};

/// Default limit on jobs waiting for the engine.
pub const DEFAULT_MAX_QUEUE: usize = 64;

/// Configuration for the lifecycle manager.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub languages: LanguageSet,
    pub policy: StartupPolicy,
    /// Jobs allowed to wait behind the current holder. 0 means unlimited.
    pub max_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            languages: LanguageSet::default(),
            policy: StartupPolicy::default(),
            max_queue: DEFAULT_MAX_QUEUE,
        }
    }
}

/// Shared bookkeeping between the manager and outstanding handles.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
    waiting: AtomicUsize,
    holder: StdMutex<Option<Uuid>>,
}

impl Counters {
    fn set_holder(&self, holder: Option<Uuid>) {
        if let Ok(mut h) = self.holder.lock() {
            *h = holder;
        }
    }

    fn holder(&self) -> Option<Uuid> {
        self.holder.lock().ok().and_then(|h| *h)
    }
}

/// Point-in-time view of the manager.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    #[serde(flatten)]
    pub state: EngineState,
    pub languages: Vec<String>,
    pub acquired: u64,
    pub released: u64,
    pub waiting: usize,
    pub holder: Option<Uuid>,
}

/// A place in the engine queue. Leaving the queue (lock granted, or the
/// waiting request cancelled) gives the place back.
struct QueueSlot<'a> {
    counters: &'a Counters,
}

impl<'a> QueueSlot<'a> {
    fn admit(counters: &'a Counters, max_queue: usize) -> Result<Self, EngineError> {
        counters
            .waiting
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (max_queue == 0 || n < max_queue).then_some(n + 1)
            })
            .map_err(|depth| EngineError::QueueFull { depth })?;
        Ok(Self { counters })
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.counters.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Exclusive owner of the process-wide OCR engine.
pub struct EngineManager {
    engine: Arc<Mutex<Box<dyn OcrEngine>>>,
    languages: LanguageSet,
    policy: StartupPolicy,
    max_queue: usize,
    state: Arc<watch::Sender<EngineState>>,
    counters: Arc<Counters>,
}

impl EngineManager {
    pub fn new(engine: Box<dyn OcrEngine>, config: EngineConfig) -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        Self {
            engine: Arc::new(Mutex::new(engine)),
            languages: config.languages,
            policy: config.policy,
            max_queue: config.max_queue,
            state: Arc::new(state),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn languages(&self) -> &LanguageSet {
        &self.languages
    }

    pub fn policy(&self) -> StartupPolicy {
        self.policy
    }

    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            state: self.state(),
            languages: self.languages.iter().map(str::to_string).collect(),
            acquired: self.counters.acquired.load(Ordering::SeqCst),
            released: self.counters.released.load(Ordering::SeqCst),
            waiting: self.counters.waiting.load(Ordering::SeqCst),
            holder: self.counters.holder(),
        }
    }

    /// Load the engine runtime and every language in the set.
    ///
    /// Runs at most once. A failure leaves the manager in `Failed` for good:
    /// partially loaded language sets are never served and never retried.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        let claimed = self.state.send_if_modified(|s| {
            if *s == EngineState::Uninitialized {
                *s = EngineState::Loading;
                true
            } else {
                false
            }
        });
        if !claimed {
            return match self.state() {
                EngineState::Ready => Ok(()),
                state => Err(EngineError::Unavailable { state }),
            };
        }

        tracing::info!(
            "Loading OCR engine with {} languages [{}]",
            self.languages.len(),
            self.languages
        );

        // Detached: the load finishes even if this caller is dropped.
        let engine = Arc::clone(&self.engine);
        let state = Arc::clone(&self.state);
        let languages = self.languages.clone();
        let loader = tokio::spawn(async move {
            let start = Instant::now();
            let mut engine = engine.lock().await;
            let result = load_engine(engine.as_mut(), &languages).await;
            match &result {
                Ok(()) => {
                    state.send_replace(EngineState::Ready);
                    tracing::info!(
                        "OCR engine ({}) ready in {}ms",
                        engine.engine_type(),
                        start.elapsed().as_millis()
                    );
                }
                Err(e) => {
                    tracing::error!("OCR engine ({}) failed to load: {}", engine.engine_type(), e);
                    state.send_replace(EngineState::Failed(e.to_string()));
                }
            }
            result
        });

        match loader.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(EngineError::InitFailure(e)),
            Err(e) => {
                tracing::error!("OCR engine loader aborted: {}", e);
                self.state
                    .send_replace(EngineState::Failed(format!("loader aborted: {}", e)));
                Err(EngineError::Unavailable {
                    state: self.state(),
                })
            }
        }
    }

    /// Wait for exclusive access to the engine on behalf of `job`.
    ///
    /// Fails immediately with `Unavailable` unless the engine is ready (under
    /// the lazy policy, the first caller loads it), and with `QueueFull` when
    /// `max_queue` jobs are already waiting.
    pub async fn acquire(&self, job: &RecognitionJob) -> Result<EngineHandle, EngineError> {
        match self.state() {
            EngineState::Ready => {}
            EngineState::Uninitialized if self.policy == StartupPolicy::Lazy => {
                self.initialize().await.map_err(|_| EngineError::Unavailable {
                    state: self.state(),
                })?;
            }
            state => return Err(EngineError::Unavailable { state }),
        }

        let slot = QueueSlot::admit(&self.counters, self.max_queue)?;
        tracing::debug!(
            job = %job.correlation_id,
            "Queued for OCR engine ({} waiting)",
            self.counters.waiting.load(Ordering::SeqCst)
        );

        let guard = Arc::clone(&self.engine).lock_owned().await;
        drop(slot);

        // Termination may have completed while this job was in line.
        let state = self.state();
        if !matches!(state, EngineState::Ready | EngineState::Draining) {
            return Err(EngineError::Unavailable { state });
        }

        tracing::debug!(
            job = %job.correlation_id,
            "Acquired OCR engine after {}ms in queue",
            job.age_ms()
        );
        Ok(EngineHandle::new(
            guard,
            job.correlation_id,
            Arc::clone(&self.counters),
        ))
    }

    /// Stop admitting work, let the holder and every queued job finish, then
    /// release the engine.
    ///
    /// Idempotent: concurrent and repeated calls wait for `Terminated` and the
    /// engine is shut down at most once.
    pub async fn terminate(&self) {
        let mut rx = self.state.subscribe();
        let previous = loop {
            let current = rx.borrow_and_update().clone();
            match current {
                EngineState::Terminated => return,
                EngineState::Loading | EngineState::Draining => {
                    if rx.changed().await.is_err() {
                        return;
                    }
                }
                _ => {
                    let claimed = self.state.send_if_modified(|s| {
                        if *s == current {
                            *s = EngineState::Draining;
                            true
                        } else {
                            false
                        }
                    });
                    if claimed {
                        break current;
                    }
                }
            }
        };

        tracing::info!(
            "Draining OCR engine ({} jobs waiting)",
            self.counters.waiting.load(Ordering::SeqCst)
        );

        // Queues behind every job admitted before draining began.
        let mut engine = self.engine.lock().await;
        if previous != EngineState::Uninitialized {
            if let Err(e) = engine.shutdown().await {
                tracing::warn!("OCR engine shutdown reported an error: {}", e);
            }
        }
        self.state.send_replace(EngineState::Terminated);
        drop(engine);

        tracing::info!("OCR engine terminated");
    }
}

async fn load_engine(engine: &mut dyn OcrEngine, languages: &LanguageSet) -> Result<(), OcrError> {
    engine.load_runtime().await?;
    for language in languages.iter() {
        engine.load_language(language).await?;
        tracing::debug!("Loaded language model {}", language);
    }
    engine.initialize(languages).await
}
