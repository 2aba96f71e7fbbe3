//! Tesseract OCR engine.
//!
//! Uses the Tesseract command-line binary. "Loading" verifies the binary and
//! the installed traineddata for each language, so a misconfigured host is
//! caught at startup instead of on the first upload.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::io::Write;
use std::path::PathBuf;
use std::process::Output;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use super::backend::{normalize_text, OcrEngine, OcrEngineType, OcrError};
use super::languages::LanguageSet;

/// Loaded state, present between a successful load and shutdown.
#[derive(Debug, Default)]
struct Loaded {
    available: HashSet<String>,
    languages: Vec<String>,
    lang_arg: Option<String>,
}

/// Tesseract OCR engine.
pub struct TesseractEngine {
    binary: PathBuf,
    loaded: Option<Loaded>,
}

impl TesseractEngine {
    /// Create an engine that runs `tesseract` from PATH.
    pub fn new() -> Self {
        Self::with_binary("tesseract")
    }

    /// Create an engine that runs a specific tesseract binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            loaded: None,
        }
    }

    async fn run<I, S>(&self, args: I) -> Result<Output, OcrError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        match Command::new(&self.binary).args(args).output().await {
            Ok(output) => Ok(output),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OcrError::BackendNotAvailable(format!(
                    "{} not found (install tesseract-ocr)",
                    self.binary.display()
                )))
            }
            Err(e) => Err(OcrError::Io(e)),
        }
    }

    fn loaded_mut(&mut self) -> Result<&mut Loaded, OcrError> {
        self.loaded
            .as_mut()
            .ok_or_else(|| OcrError::BackendNotAvailable("tesseract runtime not loaded".into()))
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `tesseract --list-langs` output.
///
/// The first line is a header (`List of available languages in "..." (N):`).
fn parse_list_langs(stdout: &str) -> HashSet<String> {
    stdout
        .lines()
        .filter(|line| !line.starts_with("List of available languages"))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// First line of `tesseract --version`, e.g. `tesseract 5.3.0`.
fn parse_version(output: &Output) -> Option<String> {
    // Older releases print the version on stderr.
    [&output.stdout, &output.stderr]
        .into_iter()
        .filter_map(|bytes| {
            String::from_utf8_lossy(bytes)
                .lines()
                .next()
                .map(|l| l.trim().to_string())
        })
        .find(|l| !l.is_empty())
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn engine_type(&self) -> OcrEngineType {
        OcrEngineType::Tesseract
    }

    async fn load_runtime(&mut self) -> Result<(), OcrError> {
        let output = self.run(["--version"]).await?;
        if !output.status.success() {
            return Err(OcrError::BackendNotAvailable(format!(
                "tesseract --version failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let version = parse_version(&output);

        let output = self.run(["--list-langs"]).await?;
        if !output.status.success() {
            return Err(OcrError::BackendNotAvailable(format!(
                "tesseract --list-langs failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let available = parse_list_langs(&String::from_utf8_lossy(&output.stdout));

        tracing::info!(
            "Loaded tesseract runtime {} ({} languages installed)",
            version.as_deref().unwrap_or("unknown version"),
            available.len()
        );

        self.loaded = Some(Loaded {
            available,
            ..Default::default()
        });
        Ok(())
    }

    async fn load_language(&mut self, language: &str) -> Result<(), OcrError> {
        let loaded = self.loaded_mut()?;
        if !loaded.available.contains(language) {
            return Err(OcrError::ModelNotFound(format!(
                "{}.traineddata is not installed (apt install tesseract-ocr-{})",
                language, language
            )));
        }
        if !loaded.languages.iter().any(|l| l == language) {
            loaded.languages.push(language.to_string());
        }
        Ok(())
    }

    async fn initialize(&mut self, languages: &LanguageSet) -> Result<(), OcrError> {
        let loaded = self.loaded_mut()?;
        if let Some(missing) = languages
            .iter()
            .find(|l| !loaded.languages.iter().any(|have| have == *l))
        {
            return Err(OcrError::ModelNotFound(format!(
                "language {} was not loaded before initialization",
                missing
            )));
        }
        loaded.lang_arg = Some(languages.as_tesseract_arg());
        Ok(())
    }

    async fn recognize(&mut self, image: &[u8]) -> Result<String, OcrError> {
        let lang_arg = self
            .loaded
            .as_ref()
            .and_then(|l| l.lang_arg.clone())
            .ok_or_else(|| OcrError::BackendNotAvailable("tesseract not initialized".into()))?;

        let mut file = tempfile::Builder::new().prefix("ocrgate-").tempfile()?;
        file.write_all(image)?;
        file.flush()?;

        let start = Instant::now();
        let output = self
            .run([
                file.path().as_os_str(),
                OsStr::new("stdout"),
                OsStr::new("-l"),
                OsStr::new(&lang_arg),
            ])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::OcrFailed(format!(
                "tesseract failed: {}",
                stderr.trim()
            )));
        }

        tracing::debug!(
            "tesseract finished in {}ms ({} bytes in)",
            start.elapsed().as_millis(),
            image.len()
        );
        Ok(normalize_text(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn shutdown(&mut self) -> Result<(), OcrError> {
        self.loaded = None;
        Ok(())
    }
}
