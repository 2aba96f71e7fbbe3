//! Scripted in-process OCR engine.
//!
//! Treats the uploaded bytes as the text "printed" on the image: valid UTF-8
//! is returned as-is, anything else is rejected like an undecodable image.
//! Every call is recorded in a shared [`ScriptedProbe`] so tests can observe
//! ordering, overlap and shutdown behaviour of whoever owns the engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{normalize_text, OcrEngine, OcrEngineType, OcrError};
use super::languages::LanguageSet;

/// Recorded engine activity, shared between the engine and the test.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    events: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    runtime_loads: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl ScriptedProbe {
    fn record(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Every call in order, e.g. `load_language:eng`, `recognize:start:A`.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Highest number of recognitions that overlapped.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn runtime_loads(&self) -> usize {
        self.runtime_loads.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

/// Deterministic engine for tests.
pub struct ScriptedEngine {
    probe: Arc<ScriptedProbe>,
    delay: Duration,
    load_delay: Duration,
    fail_runtime: Option<String>,
    missing_languages: Vec<String>,
    initialized: bool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(ScriptedProbe::default()),
            delay: Duration::ZERO,
            load_delay: Duration::ZERO,
            fail_runtime: None,
            missing_languages: Vec::new(),
            initialized: false,
        }
    }

    /// Time each recognition takes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Time `load_runtime` takes.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Make `load_runtime` fail with the given message.
    pub fn failing_runtime(mut self, message: &str) -> Self {
        self.fail_runtime = Some(message.to_string());
        self
    }

    /// Make `load_language` fail for `language`.
    pub fn without_language(mut self, language: &str) -> Self {
        self.missing_languages.push(language.to_string());
        self
    }

    pub fn probe(&self) -> Arc<ScriptedProbe> {
        Arc::clone(&self.probe)
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for ScriptedEngine {
    fn engine_type(&self) -> OcrEngineType {
        OcrEngineType::Scripted
    }

    async fn load_runtime(&mut self) -> Result<(), OcrError> {
        self.probe.runtime_loads.fetch_add(1, Ordering::SeqCst);
        self.probe.record("load_runtime".to_string());
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        match &self.fail_runtime {
            Some(message) => Err(OcrError::BackendNotAvailable(message.clone())),
            None => Ok(()),
        }
    }

    async fn load_language(&mut self, language: &str) -> Result<(), OcrError> {
        self.probe.record(format!("load_language:{}", language));
        if self.missing_languages.iter().any(|l| l == language) {
            return Err(OcrError::ModelNotFound(format!("{}.traineddata", language)));
        }
        Ok(())
    }

    async fn initialize(&mut self, languages: &LanguageSet) -> Result<(), OcrError> {
        self.probe.record(format!("initialize:{}", languages.as_tesseract_arg()));
        self.initialized = true;
        Ok(())
    }

    async fn recognize(&mut self, image: &[u8]) -> Result<String, OcrError> {
        if !self.initialized {
            return Err(OcrError::BackendNotAvailable("engine not initialized".into()));
        }
        let text = std::str::from_utf8(image)
            .map_err(|_| OcrError::OcrFailed("unsupported image format".into()))?
            .to_string();

        let now = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(now, Ordering::SeqCst);
        self.probe.record(format!("recognize:start:{}", text));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.probe.record(format!("recognize:end:{}", text));
        self.probe.active.fetch_sub(1, Ordering::SeqCst);
        Ok(normalize_text(&text))
    }

    async fn shutdown(&mut self) -> Result<(), OcrError> {
        self.probe.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.probe.record("shutdown".to_string());
        self.initialized = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recognize_returns_utf8_payload() {
        let mut engine = ScriptedEngine::new();
        engine.initialize(&LanguageSet::default()).await.unwrap();
        assert_eq!(engine.recognize(b"HELLO").await.unwrap(), "HELLO");
    }

    #[tokio::test]
    async fn test_recognize_rejects_binary() {
        let mut engine = ScriptedEngine::new();
        engine.initialize(&LanguageSet::default()).await.unwrap();
        let err = engine.recognize(&[0xff, 0xfe, 0x00]).await.unwrap_err();
        assert!(matches!(err, OcrError::OcrFailed(_)));
    }

    #[tokio::test]
    async fn test_probe_records_calls() {
        let mut engine = ScriptedEngine::new().without_language("ben");
        let probe = engine.probe();
        engine.load_runtime().await.unwrap();
        engine.load_language("eng").await.unwrap();
        assert!(engine.load_language("ben").await.is_err());
        engine.shutdown().await.unwrap();

        assert_eq!(
            probe.events(),
            vec!["load_runtime", "load_language:eng", "load_language:ben", "shutdown"]
        );
        assert_eq!(probe.shutdowns(), 1);
    }
}
