//! HTTP request handlers for the gateway.

mod health;
mod ocr;

// Re-export handlers for use by the router
pub use health::{health, ready, HealthResponse};
pub use ocr::{ocr_image, OcrResponse, IMAGE_FIELD};
