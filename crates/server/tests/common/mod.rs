//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling E2E testing without ffmpeg or
//! inference models.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use framefuse_core::{
    moderation::Classifier,
    processing::{FramePipeline, FrameProcessor},
    testing::{MockClassifier, MockProcessor, MockStreamSpawner, MockToolRunner},
    workflow::MediaStageExecutor,
    Config, ToolBridge, WorkflowEngine,
};
use framefuse_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use framefuse_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Codec tools (MockToolRunner)
/// - The processing capability (MockProcessor)
/// - Content moderation (MockClassifier)
/// - Remote stream processes (MockStreamSpawner)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_run_workflow() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/workflows/run", json!({
///         "variant": "image-to-video",
///         "target_path": target,
///         "output_path": output,
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub state: Arc<AppState>,
    pub runner: Arc<MockToolRunner>,
    pub processor: Arc<MockProcessor>,
    pub spawner: Arc<MockStreamSpawner>,
    /// Temporary directory holding media, outputs and the temp root
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        Self::with_mocks(MockProcessor::new("swap"), MockClassifier::never())
    }

    /// Create a test fixture around the given capability and classifier.
    pub fn with_mocks(processor: MockProcessor, classifier: MockClassifier) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.temp.root = temp_dir.path().join("tmp");
        config.execution.thread_count = 2;

        let runner = Arc::new(MockToolRunner::new());
        let processor = Arc::new(processor);
        let spawner = Arc::new(MockStreamSpawner::new());
        let classifier: Arc<dyn Classifier> = Arc::new(classifier);

        let pipeline = Arc::new(FramePipeline::new(vec![
            Arc::clone(&processor) as Arc<dyn FrameProcessor>
        ]));
        let bridge = ToolBridge::new(
            Arc::clone(&runner) as _,
            config.tools.clone(),
            config.output.clone(),
        );
        let executor = MediaStageExecutor::new(
            &config,
            bridge,
            Arc::clone(&pipeline),
            Arc::clone(&classifier),
        );
        let engine = Arc::new(WorkflowEngine::new(Arc::new(executor)));

        let state = Arc::new(AppState::new(
            config,
            engine,
            pipeline,
            classifier,
            Arc::clone(&spawner) as _,
        ));
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            state,
            runner,
            processor,
            spawner,
            temp_dir,
        }
    }

    /// Path inside the fixture's temp directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a GET request and return the raw body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
