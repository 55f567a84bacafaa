use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    detector::Detector,
    inference::InferenceRunner,
    jobs::{JobController, JobError},
    workspace::WorkspaceRoot,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jobs: Arc<JobController>,
}

impl AppState {
    pub fn new(config: AppConfig, detector: Arc<dyn Detector>) -> Result<Self, JobError> {
        let runner = Arc::new(InferenceRunner::new(detector, config.detector_concurrency));
        let workspaces = WorkspaceRoot::new(config.work_dir.clone());
        let jobs = JobController::new(&config, workspaces, runner)?;

        Ok(Self {
            config: Arc::new(config),
            jobs: Arc::new(jobs),
        })
    }

    pub fn workspaces(&self) -> &WorkspaceRoot {
        self.jobs.workspaces()
    }
}
