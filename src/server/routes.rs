//! Router configuration for the gateway.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState, http: &HttpConfig) -> Router {
    Router::new()
        .route("/ocr/image", post(handlers::ocr_image))
        // Probes
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .layer(DefaultBodyLimit::max(http.max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&http.cors_origins)),
        )
        .with_state(state)
}

/// CORS for the configured origins. `*` allows any origin, without credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
}
