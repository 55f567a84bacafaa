use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::detection::RawDetection;

/// Object-detection model.
///
/// One call covers a whole batch and returns one detection per input path,
/// in input order. Implementations are shared across jobs and must tolerate
/// concurrent calls; `InferenceRunner` limits how many are in flight.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, images: &[PathBuf]) -> Result<Vec<RawDetection>, DetectorError>;
}

/// Client for a detection model served over HTTP.
pub struct HttpDetector {
    http: Client,
    url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct DetectRequest {
    images: Vec<EncodedImage>,
}

#[derive(Serialize)]
struct EncodedImage {
    name: String,
    data: String,
}

#[derive(Deserialize)]
struct DetectResponse {
    results: Vec<RawDetection>,
}

impl HttpDetector {
    pub fn new(url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, DetectorError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            token: token.map(str::to_string),
        })
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, images: &[PathBuf]) -> Result<Vec<RawDetection>, DetectorError> {
        let mut encoded = Vec::with_capacity(images.len());
        for path in images {
            let bytes = tokio::fs::read(path).await?;
            encoded.push(EncodedImage {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            });
        }

        let mut request = self
            .http
            .post(&self.url)
            .json(&DetectRequest { images: encoded });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DetectResponse = response.json().await?;
        Ok(parsed.results)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("detector answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("cannot read staged image: {0}")]
    Io(#[from] std::io::Error),

    #[error("detector returned {got} results for {expected} images")]
    CountMismatch { expected: usize, got: usize },

    #[error("detector is shut down")]
    Closed,
}
