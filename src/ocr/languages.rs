//! Language model set loaded into the OCR engine.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Default languages: English, then Bengali.
pub const DEFAULT_LANGUAGES: &[&str] = &["eng", "ben"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LanguageSetError {
    #[error("language set is empty")]
    Empty,
    #[error("invalid language code: {0:?}")]
    InvalidCode(String),
}

/// Ordered, de-duplicated set of language codes (e.g. `eng`, `chi_sim`).
///
/// Fixed at construction. Order matters for tesseract, which treats the first
/// language as primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSet {
    codes: Vec<String>,
}

impl LanguageSet {
    /// Build a set from individual codes, dropping duplicates.
    pub fn new<I, S>(codes: I) -> Result<Self, LanguageSetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for code in codes {
            let code = code.as_ref().trim();
            if code.is_empty() {
                continue;
            }
            if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(LanguageSetError::InvalidCode(code.to_string()));
            }
            if !out.iter().any(|c| c == code) {
                out.push(code.to_string());
            }
        }
        let set = Self { codes: out };
        if set.is_empty() {
            return Err(LanguageSetError::Empty);
        }
        Ok(set)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(|c| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Render for tesseract's `-l` flag, e.g. `eng+ben`.
    pub fn as_tesseract_arg(&self) -> String {
        self.codes.join("+")
    }
}

impl Default for LanguageSet {
    fn default() -> Self {
        Self {
            codes: DEFAULT_LANGUAGES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl FromStr for LanguageSet {
    type Err = LanguageSetError;

    /// Accepts `eng,ben` as well as tesseract's own `eng+ben` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split([',', '+']))
    }
}

impl fmt::Display for LanguageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.codes.join(","))
    }
}
