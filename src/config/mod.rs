use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Root directory holding one workspace per job.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Endpoint of the object-detection service.
    #[serde(default = "default_detector_url")]
    pub detector_url: String,

    /// Optional bearer token sent to the detection service.
    #[serde(default)]
    pub detector_token: Option<String>,

    #[serde(default = "default_detector_timeout_secs")]
    pub detector_timeout_secs: u64,

    /// Number of detector calls allowed in flight at once (1 = single-flight).
    #[serde(default = "default_detector_concurrency")]
    pub detector_concurrency: usize,

    /// Jobs executing the pipeline at the same time.
    #[serde(default = "default_max_running_jobs")]
    pub max_running_jobs: usize,

    /// Jobs accepted but waiting for a run slot; submissions beyond this are rejected.
    #[serde(default = "default_max_queued_jobs")]
    pub max_queued_jobs: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Interval between marker checks on the status endpoints.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Checks performed before a status endpoint gives up and answers "pending".
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    /// Side of the square image handed to the detector.
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_max_urls_per_job")]
    pub max_urls_per_job: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./work")
}

fn default_detector_url() -> String {
    "http://127.0.0.1:8000/detect".to_string()
}

fn default_detector_timeout_secs() -> u64 {
    120
}

fn default_detector_concurrency() -> usize {
    1
}

fn default_max_running_jobs() -> usize {
    4
}

fn default_max_queued_jobs() -> usize {
    64
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_poll_max_attempts() -> u32 {
    60 * 60
}

fn default_image_size() -> u32 {
    640
}

fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_max_urls_per_job() -> usize {
    64
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            work_dir: default_work_dir(),
            detector_url: default_detector_url(),
            detector_token: None,
            detector_timeout_secs: default_detector_timeout_secs(),
            detector_concurrency: default_detector_concurrency(),
            max_running_jobs: default_max_running_jobs(),
            max_queued_jobs: default_max_queued_jobs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_max_attempts: default_poll_max_attempts(),
            image_size: default_image_size(),
            max_body_bytes: default_max_body_bytes(),
            max_urls_per_job: default_max_urls_per_job(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn detector_timeout(&self) -> Duration {
        Duration::from_secs(self.detector_timeout_secs)
    }
}
