//! ocrgate - authenticated OCR over HTTP.
//!
//! Accepts image uploads, checks the caller against an external
//! authorization authority, and runs a single shared Tesseract engine over
//! the image, one job at a time.

pub mod auth;
pub mod config;
pub mod engine;
pub mod ocr;
pub mod pipeline;
pub mod server;
