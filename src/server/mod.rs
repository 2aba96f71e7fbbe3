//! HTTP gateway.
//!
//! Composes the authorization gate, the engine lifecycle manager and the
//! recognition pipeline behind two endpoints:
//! - `POST /ocr/image` - authorize, queue for the engine, recognize
//! - `GET /health` - liveness, independent of the engine
//!
//! plus `GET /ready` for orchestrators that want engine readiness.

mod error;
mod handlers;
mod routes;

pub use error::{ApiError, ErrorBody};
pub use handlers::{HealthResponse, OcrResponse, IMAGE_FIELD};
pub use routes::create_router;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;

use crate::auth::AuthorizationGate;
use crate::config::Settings;
use crate::engine::{EngineManager, StartupPolicy};
use crate::ocr::TesseractEngine;

/// Shared state for the gateway.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthorizationGate>,
    pub engine: Arc<EngineManager>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(gate: AuthorizationGate, engine: EngineManager) -> Self {
        Self {
            gate: Arc::new(gate),
            engine: Arc::new(engine),
            started_at: Instant::now(),
        }
    }
}

/// Build the gateway from settings and serve until SIGTERM or Ctrl+C.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let engine = EngineManager::new(
        Box::new(TesseractEngine::with_binary(&settings.tesseract_bin)),
        settings.engine.clone(),
    );
    let gate = AuthorizationGate::new(settings.auth.clone())?;
    tracing::info!("Authorizing against {}", gate.authorize_url());

    let state = AppState::new(gate, engine);
    let app = create_router(state.clone(), &settings.http);

    let listener = TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    tracing::info!("Listening at >_ {}", settings.public_url);

    run(listener, app, state.engine, shutdown_signal()).await
}

/// Serve `app` on `listener` until `shutdown` resolves, then drain.
///
/// Under the eager policy the engine starts loading before the first
/// connection is accepted; OCR requests get 503 until it is ready, while
/// `/health` answers from the start. On shutdown the listener stops
/// accepting, the engine stops admitting jobs, in-flight requests finish, and
/// the engine is released before this returns.
pub async fn run<F>(
    listener: TcpListener,
    app: axum::Router,
    engine: Arc<EngineManager>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if engine.policy() == StartupPolicy::Eager {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            // Failure is logged and leaves the engine in `Failed`.
            let _ = engine.initialize().await;
        });
    }

    let draining = Arc::clone(&engine);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received: closing HTTP server");
            tokio::spawn(async move { draining.terminate().await });
        })
        .await?;
    tracing::info!("HTTP server closed");

    engine.terminate().await;
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::time::Duration;
    use tower::ServiceExt;
    use url::Url;

    use crate::auth::{AuthConfig, AUTHORIZE_PATH};
    use crate::config::HttpConfig;
    use crate::engine::{EngineConfig, EngineState};
    use crate::ocr::{ScriptedEngine, ScriptedProbe};

    const BOUNDARY: &str = "ocrgate-test-boundary";

    async fn authority(headers: axum::http::HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
        match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            Some("Bearer good") => (StatusCode::OK, Json(serde_json::json!({"ok": true}))),
            _ => (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "invalid token"})),
            ),
        }
    }

    async fn spawn_authority() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route(AUTHORIZE_PATH, get(authority));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    async fn unreachable_authority() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    async fn setup_test_app(
        engine: ScriptedEngine,
        authority: Url,
        initialize: bool,
    ) -> (Router, AppState, std::sync::Arc<ScriptedProbe>) {
        let probe = engine.probe();
        let manager = EngineManager::new(Box::new(engine), EngineConfig::default());
        if initialize {
            manager.initialize().await.unwrap();
        }
        let gate = AuthorizationGate::new(AuthConfig::new(authority)).unwrap();
        let state = AppState::new(gate, manager);
        let app = create_router(state.clone(), &HttpConfig::default());
        (app, state, probe)
    }

    fn multipart_body(field: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"image.png\"\r\n",
                field
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn ocr_request(token: Option<&str>, field: &str, content: &[u8]) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/ocr/image")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, token);
        }
        builder
            .body(Body::from(multipart_body(field, content)))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_ocr_image_returns_text() {
        let (app, state, _probe) =
            setup_test_app(ScriptedEngine::new(), spawn_authority().await, true).await;

        let response = app
            .oneshot(ocr_request(Some("Bearer good"), IMAGE_FIELD, b"HELLO"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"text": "HELLO"}));

        let stats = state.engine.stats();
        assert_eq!(stats.acquired, 1);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.holder, None);
    }

    #[tokio::test]
    async fn test_deny_is_relayed_and_engine_untouched() {
        let (app, state, probe) =
            setup_test_app(ScriptedEngine::new(), spawn_authority().await, true).await;

        let response = app
            .oneshot(ocr_request(Some("Bearer bad"), IMAGE_FIELD, b"HELLO"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"error":"invalid token"}"#);

        assert_eq!(state.engine.stats().acquired, 0);
        assert!(!probe.events().iter().any(|e| e.starts_with("recognize")));
    }

    #[tokio::test]
    async fn test_missing_credential_denied() {
        let (app, state, _probe) =
            setup_test_app(ScriptedEngine::new(), spawn_authority().await, true).await;

        let response = app
            .oneshot(ocr_request(None, IMAGE_FIELD, b"HELLO"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(state.engine.stats().acquired, 0);
    }

    #[tokio::test]
    async fn test_unreachable_authority_is_bad_gateway() {
        let (app, state, _probe) =
            setup_test_app(ScriptedEngine::new(), unreachable_authority().await, true).await;

        let response = app
            .oneshot(ocr_request(Some("Bearer good"), IMAGE_FIELD, b"HELLO"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains("authority unreachable"));
        assert_eq!(state.engine.stats().acquired, 0);
    }

    #[tokio::test]
    async fn test_engine_not_ready_is_service_unavailable() {
        let (app, _state, _probe) =
            setup_test_app(ScriptedEngine::new(), spawn_authority().await, false).await;

        let response = app
            .oneshot(ocr_request(Some("Bearer good"), IMAGE_FIELD, b"HELLO"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(header::RETRY_AFTER).is_some());
    }

    #[tokio::test]
    async fn test_recognition_failure_releases_engine() {
        let (app, state, _probe) =
            setup_test_app(ScriptedEngine::new(), spawn_authority().await, true).await;

        let response = app
            .oneshot(ocr_request(Some("Bearer good"), IMAGE_FIELD, &[0xff, 0xd8, 0xff, 0xe0]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("unsupported image"));

        let stats = state.engine.stats();
        assert_eq!(stats.acquired, 1);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.state, EngineState::Ready);
    }

    #[tokio::test]
    async fn test_missing_image_field_is_bad_request() {
        let (app, state, _probe) =
            setup_test_app(ScriptedEngine::new(), spawn_authority().await, true).await;

        let response = app
            .oneshot(ocr_request(Some("Bearer good"), "file", b"HELLO"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("img"));
        assert_eq!(state.engine.stats().acquired, 0);
    }

    #[tokio::test]
    async fn test_health_independent_of_engine() {
        let engine = ScriptedEngine::new().failing_runtime("tesseract missing");
        let (app, state, _probe) = setup_test_app(engine, spawn_authority().await, false).await;
        assert!(state.engine.initialize().await.is_err());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["message"], "Ok");
        assert!(json["uptime"].as_f64().unwrap() >= 0.0);
        assert!(json["date"].is_string());
    }

    #[tokio::test]
    async fn test_health_while_engine_loading() {
        let engine = ScriptedEngine::new().with_load_delay(Duration::from_millis(300));
        let (app, state, _probe) = setup_test_app(engine, spawn_authority().await, false).await;
        let loader = {
            let engine = Arc::clone(&state.engine);
            tokio::spawn(async move { engine.initialize().await })
        };
        let mut states = state.engine.subscribe();
        states
            .wait_for(|s| *s == EngineState::Loading)
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["state"], "loading");

        loader.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_empty_upload_never_takes_engine() {
        let (app, state, probe) =
            setup_test_app(ScriptedEngine::new(), spawn_authority().await, true).await;

        let response = app
            .oneshot(ocr_request(Some("Bearer good"), IMAGE_FIELD, b""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "empty image");
        assert_eq!(state.engine.stats().acquired, 0);
        assert!(!probe.events().iter().any(|e| e.starts_with("recognize")));
    }

    #[tokio::test]
    async fn test_ready_reflects_engine_state() {
        let (app, state, _probe) =
            setup_test_app(ScriptedEngine::new(), spawn_authority().await, false).await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["state"], "uninitialized");

        state.engine.initialize().await.unwrap();
        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["state"], "ready");
        assert_eq!(json["languages"], serde_json::json!(["eng", "ben"]));
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_serialized() {
        let engine = ScriptedEngine::new().with_delay(Duration::from_millis(50));
        let (app, _state, probe) = setup_test_app(engine, spawn_authority().await, true).await;

        let first = tokio::spawn(
            app.clone()
                .oneshot(ocr_request(Some("Bearer good"), IMAGE_FIELD, b"FIRST")),
        );
        let second = tokio::spawn(
            app.oneshot(ocr_request(Some("Bearer good"), IMAGE_FIELD, b"SECOND")),
        );

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(probe.max_concurrent(), 1);

        // Whichever ran first, the other started only after it ended.
        let events: Vec<String> = probe
            .events()
            .into_iter()
            .filter(|e| e.starts_with("recognize"))
            .collect();
        assert_eq!(events.len(), 4);
        assert!(events[0].starts_with("recognize:start:"));
        assert!(events[1].starts_with("recognize:end:"));
        assert_eq!(events[0]["recognize:start:".len()..], events[1]["recognize:end:".len()..]);
    }

    #[tokio::test]
    async fn test_run_drains_on_shutdown() {
        let engine = ScriptedEngine::new();
        let probe = engine.probe();
        let manager = Arc::new(EngineManager::new(Box::new(engine), EngineConfig::default()));
        let gate = AuthorizationGate::new(AuthConfig::new(spawn_authority().await)).unwrap();
        let state = AppState {
            gate: Arc::new(gate),
            engine: Arc::clone(&manager),
            started_at: Instant::now(),
        };
        let app = create_router(state, &HttpConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(run(listener, app, Arc::clone(&manager), async move {
            let _ = rx.await;
        }));

        let mut states = manager.subscribe();
        states.wait_for(|s| *s == EngineState::Ready).await.unwrap();

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();

        assert_eq!(manager.state(), EngineState::Terminated);
        assert_eq!(probe.shutdowns(), 1);
    }
}
