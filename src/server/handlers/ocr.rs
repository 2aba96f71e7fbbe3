//! Image recognition handler.

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header::AUTHORIZATION,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthVerdict;
use crate::engine::RecognitionJob;
use crate::pipeline::{self, RecognitionError};

use super::super::error::ApiError;
use super::super::AppState;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "img";

#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub text: String,
}

/// `POST /ocr/image`
///
/// Authorization comes first: the upload is not read, and no job exists,
/// until the authority has allowed the caller. A deny is relayed verbatim.
pub async fn ocr_image(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let credential = request.headers().get(AUTHORIZATION).cloned();
    if let AuthVerdict::Deny(payload) = state.gate.authorize(credential.as_ref()).await? {
        return Ok(payload.into_response());
    }

    let multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|rejection| ApiError::Upload {
            status: rejection.status(),
            message: rejection.body_text(),
        })?;
    let image = read_image_field(multipart).await?;

    if image.is_empty() {
        return Err(RecognitionError::EmptyImage.into());
    }

    let job = RecognitionJob::new(image);
    tracing::debug!(
        job = %job.correlation_id,
        "Accepted {} byte upload",
        job.image.len()
    );

    let mut handle = state.engine.acquire(&job).await?;
    let result = pipeline::recognize(&mut handle, &job).await;
    handle.release();

    let recognition = result?;
    Ok(Json(OcrResponse {
        text: recognition.text,
    })
    .into_response())
}

async fn read_image_field(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    let upload_error = |e: axum::extract::multipart::MultipartError| ApiError::Upload {
        status: e.status(),
        message: e.body_text(),
    };

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field.bytes().await.map_err(upload_error)?;
            return Ok(bytes.to_vec());
        }
    }

    Err(ApiError::Upload {
        status: axum::http::StatusCode::BAD_REQUEST,
        message: format!("missing multipart field '{}'", IMAGE_FIELD),
    })
}
