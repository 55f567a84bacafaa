//! Test helper utilities: in-process app, scripted detector, request helpers

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use reqwest::multipart;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

use weld_inspect::app_state::AppState;
use weld_inspect::config::AppConfig;
use weld_inspect::models::detection::RawDetection;
use weld_inspect::routes;
use weld_inspect::services::detector::{Detector, DetectorError};

/// Detector answering from a table keyed by staged filename.
#[derive(Default)]
pub struct ScriptedDetector {
    classes: Mutex<HashMap<String, Vec<u32>>>,
    fail: bool,
    pub calls: AtomicUsize,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with(self, filename: &str, classes: &[u32]) -> Self {
        self.classes
            .lock()
            .unwrap()
            .insert(filename.to_string(), classes.to_vec());
        self
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(&self, images: &[PathBuf]) -> Result<Vec<RawDetection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        self.batches.lock().unwrap().push(names.clone());

        if self.fail {
            return Err(DetectorError::Status {
                status: 503,
                body: "model unavailable".to_string(),
            });
        }

        let table = self.classes.lock().unwrap();
        Ok(names
            .iter()
            .map(|name| {
                let classes = table.get(name).cloned().unwrap_or_default();
                RawDetection {
                    boxes: classes
                        .iter()
                        .enumerate()
                        .map(|(i, _)| {
                            let o = 10.0 * i as f32;
                            [20.0 + o, 20.0 + o, 200.0 + o, 120.0 + o]
                        })
                        .collect(),
                    classes,
                }
            })
            .collect())
    }
}

/// Detector that never answers, leaving jobs in flight.
pub struct StalledDetector;

#[async_trait]
impl Detector for StalledDetector {
    async fn detect(&self, _images: &[PathBuf]) -> Result<Vec<RawDetection>, DetectorError> {
        std::future::pending().await
    }
}

/// Router over a scratch work directory.
pub struct TestApp {
    pub router: Router,
    pub work_dir: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new(detector: Arc<dyn Detector>) -> Self {
        Self::with_config(detector, |_| {}).await
    }

    pub async fn with_config(detector: Arc<dyn Detector>, tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = dir.path().join("work");

        let mut config = AppConfig {
            work_dir: work_dir.clone(),
            poll_interval_ms: 10,
            poll_max_attempts: 3000,
            ..AppConfig::default()
        };
        tweak(&mut config);

        let state = AppState::new(config, detector).unwrap();
        state.workspaces().init().await.unwrap();

        Self {
            router: routes::router(state, None),
            work_dir,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_text(&self, uri: &str) -> (StatusCode, String) {
        let (status, body) = self.get(uri).await;
        (status, String::from_utf8(body).unwrap())
    }

    pub async fn get_json(&self, uri: &str) -> serde_json::Value {
        let (status, body) = self.get(uri).await;
        assert_eq!(status, StatusCode::OK, "GET {uri} failed");
        serde_json::from_slice(&body).unwrap()
    }

    /// POST /process-bytes and return the job id.
    pub async fn submit_bytes(&self, bytes: Vec<u8>) -> String {
        let request = Request::post("/process-bytes")
            .header("content-type", "application/octet-stream")
            .body(Body::from(bytes))
            .unwrap();
        self.expect_job_id(request).await
    }

    /// POST /process-urls and return the job id.
    pub async fn submit_urls(&self, urls: &[String]) -> String {
        let request = Request::post("/process-urls")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({ "urls": urls }).to_string()))
            .unwrap();
        self.expect_job_id(request).await
    }

    /// POST /process-upload with one part per (field name, file name, bytes).
    ///
    /// Multipart goes over a real socket so the form is built by reqwest.
    pub async fn upload(&self, parts: &[(&str, Option<&str>, Vec<u8>)]) -> (StatusCode, String) {
        let base_url = self.serve().await;

        let mut form = multipart::Form::new().percent_encode_noop();
        for (field, filename, bytes) in parts {
            let mut part = multipart::Part::bytes(bytes.clone());
            if let Some(name) = filename {
                part = part.file_name(name.to_string());
            }
            form = form.part(field.to_string(), part);
        }

        let response = reqwest::Client::new()
            .post(format!("{base_url}/process-upload"))
            .multipart(form)
            .send()
            .await
            .expect("Upload failed");
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.text().await.unwrap())
    }

    /// Like [`TestApp::upload`], expecting a job id back.
    pub async fn submit_upload(&self, parts: &[(&str, Option<&str>, Vec<u8>)]) -> String {
        let (status, text) = self.upload(parts).await;
        assert_eq!(status, StatusCode::OK, "upload failed: {text}");
        assert_eq!(text.len(), 16, "unexpected job id {text:?}");
        text
    }

    /// Serve the router on a random local port and return its base URL.
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn expect_job_id(&self, request: Request<Body>) -> String {
        let (status, body) = self.send(request).await;
        let text = String::from_utf8(body).unwrap();
        assert_eq!(status, StatusCode::OK, "submission failed: {text}");
        assert_eq!(text.len(), 16, "unexpected job id {text:?}");
        text
    }

    /// Long-poll the done endpoint until the job is terminal.
    pub async fn wait(&self, job_id: &str) -> String {
        let (status, text) = self.get_text(&format!("/work/{job_id}/done")).await;
        assert_eq!(status, StatusCode::OK, "job {job_id} did not finish: {text}");
        text
    }
}
