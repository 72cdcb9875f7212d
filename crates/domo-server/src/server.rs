//! `DomoServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{DefaultBodyLimit, MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use domo_assistant::{ChatAssistant, FaceMatcher, Transcriber};
use domo_store::DeviceStore;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::gas::GasMonitor;
use crate::health::{self, HealthResponse};
use crate::metrics::HTTP_REQUESTS_TOTAL;
use crate::routes::{devices, gas, media};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::Broadcaster;
use crate::websocket::session::SessionConfig;

/// Optional media collaborators. `None` disables the matching route.
#[derive(Clone, Default)]
pub struct Collaborators {
    /// Speech-to-text for `/transcribe`.
    pub transcriber: Option<Arc<dyn Transcriber>>,
    /// Face comparison for `/compare-faces`.
    pub faces: Option<Arc<dyn FaceMatcher>>,
    /// Reply generation for transcripts.
    pub chat: Option<Arc<dyn ChatAssistant>>,
}

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Current gas value and live subscribers.
    pub monitor: Arc<GasMonitor>,
    /// Device records.
    pub devices: Arc<dyn DeviceStore>,
    /// Media collaborators.
    pub collaborators: Collaborators,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Per-subscriber session settings.
    pub session: SessionConfig,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
}

/// The domo hub server.
pub struct DomoServer {
    config: ServerConfig,
    state: AppState,
}

impl DomoServer {
    /// Create a new server.
    pub fn new(
        config: ServerConfig,
        devices: Arc<dyn DeviceStore>,
        collaborators: Collaborators,
        metrics: PrometheusHandle,
    ) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(config.max_subscribers));
        let state = AppState {
            monitor: Arc::new(GasMonitor::new(broadcaster)),
            devices,
            collaborators,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            session: SessionConfig::from(&config),
            max_message_size: config.max_message_size,
            start_time: Instant::now(),
            metrics,
        };
        Self { config, state }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let media_routes = Router::new()
            .route("/compare-faces", post(media::compare_faces))
            .route("/transcribe", post(media::transcribe))
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes));

        Router::new()
            .route("/", get(gas::root))
            .route("/data", get(gas::current).post(gas::ingest))
            .route("/ws/gas", get(gas::live))
            .route("/device/", get(devices::list).post(devices::create))
            .route("/device/toggle/", post(devices::toggle))
            .route(
                "/device/{id}",
                get(devices::get).put(devices::update).delete(devices::delete),
            )
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .merge(media_routes)
            .route_layer(middleware::from_fn(track_requests))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve in the background until shutdown is requested.
    ///
    /// Returns the bound address (useful with port `0`) and the server task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.state.shutdown.token();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server terminated with error");
            }
        });

        info!(%addr, "domo server listening");
        Ok((addr, handle))
    }

    /// Gas monitor (current value and broadcaster).
    pub fn monitor(&self) -> &Arc<GasMonitor> {
        &self.state.monitor
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = state.devices.ping().await.is_ok();
    let resp = health::health_check(state.start_time, state.monitor.broadcaster().count(), database_ok);
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(resp))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let response = next.run(request).await;
    counter!(
        HTTP_REQUESTS_TOTAL,
        "route" => route,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use domo_assistant::{AssistantError, FaceMatch, Transcript, Upload};
    use domo_store::SqliteDeviceStore;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct FixedTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, audio: Upload) -> domo_assistant::Result<Transcript> {
            assert!(!audio.bytes.is_empty());
            Ok(Transcript {
                text: self.0.to_string(),
                language: None,
            })
        }
    }

    struct EchoChat;

    #[async_trait]
    impl ChatAssistant for EchoChat {
        async fn reply(&self, prompt: &str) -> domo_assistant::Result<String> {
            Ok(format!("you said: {prompt}"))
        }
    }

    struct NoFace;

    #[async_trait]
    impl FaceMatcher for NoFace {
        async fn compare(&self, _camera: Upload, _stored: Upload) -> domo_assistant::Result<FaceMatch> {
            Err(AssistantError::Status {
                service: "face",
                status: 400,
                body: "no face detected".into(),
            })
        }
    }

    struct SameFace;

    #[async_trait]
    impl FaceMatcher for SameFace {
        async fn compare(&self, _camera: Upload, _stored: Upload) -> domo_assistant::Result<FaceMatch> {
            Ok(FaceMatch {
                is_match: true,
                distance: Some(0.3),
            })
        }
    }

    fn make_server(collaborators: Collaborators) -> DomoServer {
        let store = Arc::new(SqliteDeviceStore::in_memory().unwrap());
        DomoServer::new(
            ServerConfig::default(),
            store,
            collaborators,
            crate::metrics::detached_handle(),
        )
    }

    async fn send(app: Router, req: HttpRequest<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_req(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, body: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_req(uri: &str, fields: &[(&str, &str, &[u8])]) -> HttpRequest<Body> {
        let mut body = Vec::new();
        for (name, filename, data) in fields {
            body.extend_from_slice(
                format!(
                    "--BOUNDARY\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(b"--BOUNDARY--\r\n");
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    // ── gas ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn data_starts_at_sentinel() {
        let server = make_server(Collaborators::default());
        let (status, body) = send(server.router(), get_req("/data")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["value"], 0);
        assert!(body["data"]["timestamp"].is_null());
        assert_eq!(body["message"], "Normal");
    }

    #[tokio::test]
    async fn ingest_then_query() {
        let server = make_server(Collaborators::default());
        let (status, body) = send(server.router(), json_req("POST", "/data", r#"{"value": 300}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["value"], 300);
        assert_eq!(body["message"], "Danger");
        assert!(body["data"]["timestamp"].is_string());

        let (_, body) = send(server.router(), get_req("/data")).await;
        assert_eq!(body["data"]["value"], 300);
        assert_eq!(body["message"], "Danger");

        let (_, body) = send(server.router(), get_req("/")).await;
        assert_eq!(body["data"]["value"], 300);
        assert_eq!(body["message"], "Domo hub API");
    }

    #[tokio::test]
    async fn threshold_messages() {
        let server = make_server(Collaborators::default());
        for (value, message) in [(199, "Normal"), (200, "Attention"), (299, "Attention"), (-1, "Normal")] {
            let (_, body) = send(server.router(), json_req("POST", "/data", &format!(r#"{{"value": {value}}}"#))).await;
            assert_eq!(body["message"], message, "value {value}");
        }
    }

    #[tokio::test]
    async fn malformed_readings_are_rejected() {
        let server = make_server(Collaborators::default());
        let _ = server.monitor().ingest(150);
        for bad in [r#"{"value": "abc"}"#, r#"{"value": 12.5}"#, r#"{}"#, "not json", r#"{"value": null}"#] {
            let (status, body) = send(server.router(), json_req("POST", "/data", bad)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {bad}");
            assert_eq!(body["error"]["code"], "INVALID_INPUT");
        }
        assert_eq!(server.monitor().current().value, 150);
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let server = make_server(Collaborators::default());
        let resp = server.router().oneshot(get_req("/ws/gas")).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    // ── devices ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn device_crud_flow() {
        let server = make_server(Collaborators::default());
        let app = server.router();

        let (status, _) = send(app.clone(), get_req("/device/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(app.clone(), json_req("POST", "/device/", r#"{"status": true, "name": "Salon"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Device created");
        let id = body["data"]["id"].as_i64().unwrap();

        let (_, body) = send(app.clone(), get_req(&format!("/device/{id}"))).await;
        assert_eq!(body["data"]["name"], "Salon");
        assert_eq!(body["message"], format!("Device {id}"));

        let (status, body) =
            send(app.clone(), json_req("PUT", &format!("/device/{id}"), r#"{"status": false}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], false);
        assert_eq!(body["data"]["name"], "Salon");

        let (_, body) = send(app.clone(), get_req("/device/?skip=0&limit=10")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let req = HttpRequest::builder()
            .method("DELETE")
            .uri(format!("/device/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], format!("Device {id} deleted"));

        let (status, body) = send(app, get_req(&format!("/device/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn toggle_appends_records() {
        let server = make_server(Collaborators::default());
        let app = server.router();
        let (status, first) = send(app.clone(), json_req("POST", "/device/toggle/", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["status"], true);
        let (_, second) = send(app.clone(), json_req("POST", "/device/toggle/", "")).await;
        assert_eq!(second["status"], false);
        assert!(second["id"].as_i64() > first["id"].as_i64());
    }

    #[tokio::test]
    async fn bad_device_id_is_invalid_input() {
        let server = make_server(Collaborators::default());
        let (status, body) = send(server.router(), get_req("/device/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    // ── media ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn media_routes_unavailable_without_collaborators() {
        let server = make_server(Collaborators::default());
        let req = multipart_req("/transcribe", &[("file", "a.wav", b"RIFF")]);
        let (status, body) = send(server.router(), req).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "NOT_AVAILABLE");

        let req = multipart_req(
            "/compare-faces",
            &[("camera_image", "a.jpg", b"a"), ("stored_image", "b.jpg", b"b")],
        );
        let (status, _) = send(server.router(), req).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn transcribe_passes_text_to_chat() {
        let server = make_server(Collaborators {
            transcriber: Some(Arc::new(FixedTranscriber("allume la lampe"))),
            chat: Some(Arc::new(EchoChat)),
            faces: None,
        });
        let req = multipart_req("/transcribe", &[("file", "a.wav", b"RIFF")]);
        let (status, body) = send(server.router(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "you said: allume la lampe");
        assert_eq!(body["confidence"], 1.0);
    }

    #[tokio::test]
    async fn transcribe_without_chat_returns_transcript() {
        let server = make_server(Collaborators {
            transcriber: Some(Arc::new(FixedTranscriber("bonjour"))),
            ..Collaborators::default()
        });
        let req = multipart_req("/transcribe", &[("file", "a.wav", b"RIFF")]);
        let (_, body) = send(server.router(), req).await;
        assert_eq!(body["text"], "bonjour");
    }

    #[tokio::test]
    async fn transcribe_requires_file_field() {
        let server = make_server(Collaborators {
            transcriber: Some(Arc::new(FixedTranscriber("x"))),
            ..Collaborators::default()
        });
        let req = multipart_req("/transcribe", &[("audio", "a.wav", b"RIFF")]);
        let (status, body) = send(server.router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("file"));
    }

    #[tokio::test]
    async fn compare_faces_verdict() {
        let server = make_server(Collaborators {
            faces: Some(Arc::new(SameFace)),
            ..Collaborators::default()
        });
        let req = multipart_req(
            "/compare-faces",
            &[("camera_image", "a.jpg", b"a"), ("stored_image", "b.jpg", b"b")],
        );
        let (status, body) = send(server.router(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": true, "message": "Faces match"}));
    }

    #[tokio::test]
    async fn compare_faces_rejection_is_400() {
        let server = make_server(Collaborators {
            faces: Some(Arc::new(NoFace)),
            ..Collaborators::default()
        });
        let req = multipart_req(
            "/compare-faces",
            &[("camera_image", "a.jpg", b"a"), ("stored_image", "b.jpg", b"b")],
        );
        let (status, body) = send(server.router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_INPUT");
    }

    // ── ops ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn health_reports_database_and_subscribers() {
        let server = make_server(Collaborators::default());
        let (status, body) = send(server.router(), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
        assert_eq!(body["subscribers"], 0);
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let server = make_server(Collaborators::default());
        let resp = server.router().oneshot(get_req("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_is_permissive() {
        let server = make_server(Collaborators::default());
        let req = HttpRequest::builder()
            .uri("/data")
            .header("origin", "http://phone.local")
            .body(Body::empty())
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server(Collaborators::default());
        let resp = server.router().oneshot(get_req("/nonexistent")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn shutdown_coordinator_accessible() {
        let server = make_server(Collaborators::default());
        assert!(!server.shutdown().is_shutting_down());
        assert_eq!(server.config().port, 0);
    }
}
