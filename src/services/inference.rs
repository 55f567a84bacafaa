use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::models::detection::RawDetection;
use crate::services::detector::{Detector, DetectorError};

/// Shared handle to the loaded detection model.
///
/// Every job goes through the same runner. A semaphore caps concurrent
/// detector calls; with one permit the runner is a single-flight queue and
/// callers wait their turn in FIFO order.
pub struct InferenceRunner {
    detector: Arc<dyn Detector>,
    permits: Semaphore,
}

impl InferenceRunner {
    pub fn new(detector: Arc<dyn Detector>, concurrency: usize) -> Self {
        Self {
            detector,
            permits: Semaphore::new(concurrency.max(1)),
        }
    }

    /// Run the model once over the whole batch.
    ///
    /// Returns one detection per path, in the same order. Any failure fails
    /// the whole batch; nothing is retried.
    pub async fn run(&self, images: &[PathBuf]) -> Result<Vec<RawDetection>, DetectorError> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DetectorError::Closed)?;

        let start = std::time::Instant::now();
        let detections = self.detector.detect(images).await?;
        tracing::debug!(
            batch = images.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Detector batch complete"
        );

        if detections.len() != images.len() {
            return Err(DetectorError::CountMismatch {
                expected: images.len(),
                got: detections.len(),
            });
        }
        Ok(detections)
    }
}
