//! Job controller: allocation, admission and the background pipeline.
//!
//! A job moves `pending` → `running` → `done` | `error`. Submission creates
//! the workspace, writes a `pending` record and returns the id at once; the
//! pipeline then runs on its own task:
//!
//! 1. collect the source's images (URL jobs fetch them here),
//! 2. decode, crop and resize each image and stage it as PNG,
//! 3. run the detector once over the staged batch (`running`),
//! 4. persist annotated image, sidecar and manifest line per image,
//! 5. create the `done` marker.
//!
//! Any failure, panics included, ends in the `error` marker instead.

use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::AppConfig;
use crate::models::job::{FailureKind, JobId, JobRecord, JobState};
use crate::services::detector::DetectorError;
use crate::services::ident::generate_job_id;
use crate::services::inference::InferenceRunner;
use crate::services::ingest::{InputItem, JobSource};
use crate::services::normalize::{decode_and_normalize, encode_png, NormalizeError};
use crate::services::serializer::{self, SerializeError};
use crate::services::workspace::{JobWorkspace, Marker, WorkspaceError, WorkspaceRoot};

pub struct JobController {
    workspaces: WorkspaceRoot,
    runner: Arc<InferenceRunner>,
    http: Client,
    image_size: u32,
    /// Jobs accepted and not yet finished (running or waiting).
    admission: Arc<Semaphore>,
    /// Jobs allowed to execute the pipeline at once.
    run_slots: Arc<Semaphore>,
}

impl JobController {
    pub fn new(
        config: &AppConfig,
        workspaces: WorkspaceRoot,
        runner: Arc<InferenceRunner>,
    ) -> Result<Self, JobError> {
        let http = Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|e| JobError::new(FailureKind::Ingest, e))?;

        let running = config.max_running_jobs.max(1);
        Ok(Self {
            workspaces,
            runner,
            http,
            image_size: config.image_size,
            admission: Arc::new(Semaphore::new(running + config.max_queued_jobs)),
            run_slots: Arc::new(Semaphore::new(running)),
        })
    }

    pub fn workspaces(&self) -> &WorkspaceRoot {
        &self.workspaces
    }

    /// Accept a job and start it in the background.
    ///
    /// Returns as soon as the workspace and its `pending` record exist.
    pub async fn submit(self: &Arc<Self>, source: JobSource) -> Result<JobId, SubmitError> {
        let admission = self.admission.clone().try_acquire_owned().map_err(|_| {
            metrics::counter!("jobs_rejected_total").increment(1);
            SubmitError::QueueFull
        })?;

        let id = generate_job_id();
        let workspace = self.workspaces.create(&id).await?;
        let record = JobRecord::new(id.clone(), source.kind());
        workspace.write_record(&record).await?;

        metrics::counter!("jobs_submitted_total").increment(1);
        tracing::info!(job_id = %id, source = %record.source, "Job submitted");

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.drive(workspace, record, source, admission).await;
        });

        Ok(id)
    }

    /// Wait for a run slot, run the pipeline and write exactly one terminal marker.
    async fn drive(
        self: Arc<Self>,
        workspace: JobWorkspace,
        mut record: JobRecord,
        source: JobSource,
        _admission: OwnedSemaphorePermit,
    ) {
        let _slot = match self.run_slots.clone().acquire_owned().await {
            Ok(slot) => slot,
            Err(_) => {
                let err = JobError::new(FailureKind::Ingest, "job controller shut down");
                self.finish_with_error(&workspace, &mut record, err).await;
                return;
            }
        };

        metrics::gauge!("jobs_in_flight").increment(1.0);
        let start = Instant::now();

        // Nested task: a panic surfaces as a JoinError instead of killing the job silently.
        let pipeline = tokio::spawn({
            let controller = Arc::clone(&self);
            let workspace = workspace.clone();
            let record = record.clone();
            async move { controller.run_pipeline(&workspace, record, source).await }
        });

        let outcome = match pipeline.await {
            Ok(outcome) => outcome,
            Err(join) => Err((
                record.clone(),
                JobError::new(FailureKind::Panic, join.to_string()),
            )),
        };

        match outcome {
            Ok(mut done) => {
                done.transition(JobState::Done);
                if let Err(e) = self.commit_done(&workspace, &done).await {
                    self.finish_with_error(
                        &workspace,
                        &mut done,
                        JobError::new(FailureKind::Storage, e),
                    )
                    .await;
                } else {
                    metrics::counter!("jobs_completed_total").increment(1);
                    tracing::info!(
                        job_id = %workspace.id(),
                        images = done.inputs.len(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job done"
                    );
                }
            }
            Err((mut latest, err)) => {
                self.finish_with_error(&workspace, &mut latest, err).await;
            }
        }

        metrics::histogram!("job_processing_seconds").record(start.elapsed().as_secs_f64());
        metrics::gauge!("jobs_in_flight").decrement(1.0);
    }

    async fn run_pipeline(
        &self,
        workspace: &JobWorkspace,
        mut record: JobRecord,
        source: JobSource,
    ) -> Result<JobRecord, (JobRecord, JobError)> {
        match self.pipeline_steps(workspace, &mut record, source).await {
            Ok(()) => Ok(record),
            Err(e) => Err((record, e)),
        }
    }

    async fn pipeline_steps(
        &self,
        workspace: &JobWorkspace,
        record: &mut JobRecord,
        source: JobSource,
    ) -> Result<(), JobError> {
        let job_id = workspace.id().clone();

        let items = source.into_items(&self.http).await;
        tracing::debug!(job_id = %job_id, images = items.len(), "Inputs collected");

        let staged = self.stage(workspace, items).await?;
        record.inputs = staged.iter().map(|(name, _)| name.clone()).collect();
        record.transition(JobState::Running);
        workspace
            .write_record(record)
            .await
            .map_err(|e| JobError::new(FailureKind::Storage, e))?;

        let paths: Vec<PathBuf> = staged.iter().map(|(_, path)| path.clone()).collect();
        let detections = self.runner.run(&paths).await?;

        for ((filename, _), raw) in staged.iter().zip(detections) {
            serializer::persist(workspace, filename, raw).await?;
        }

        Ok(())
    }

    /// Normalize each item and write it into the workspace, keeping order.
    async fn stage(
        &self,
        workspace: &JobWorkspace,
        items: Vec<InputItem>,
    ) -> Result<Vec<(String, PathBuf)>, JobError> {
        let mut staged = Vec::with_capacity(items.len());
        for InputItem { filename, bytes } in items {
            let size = self.image_size;
            let png = tokio::task::spawn_blocking(move || {
                decode_and_normalize(&bytes, size).and_then(|image| encode_png(&image))
            })
            .await
            .map_err(|e| JobError::new(FailureKind::Panic, e))?
            .map_err(|e| JobError::new(FailureKind::Decode, format!("{filename}: {e}")))?;

            let path = workspace
                .write_input(&filename, &png)
                .await
                .map_err(|e| JobError::new(FailureKind::Storage, e))?;
            staged.push((filename, path));
        }
        Ok(staged)
    }

    async fn commit_done(
        &self,
        workspace: &JobWorkspace,
        record: &JobRecord,
    ) -> Result<(), WorkspaceError> {
        // The marker is the last write of a successful job.
        workspace.write_record(record).await?;
        workspace.write_marker(Marker::Done).await
    }

    async fn finish_with_error(&self, workspace: &JobWorkspace, record: &mut JobRecord, err: JobError) {
        metrics::counter!("jobs_failed_total").increment(1);
        tracing::error!(
            job_id = %workspace.id(),
            kind = %err.kind,
            error = %err.message,
            "Job failed"
        );

        record.fail(err.kind, err.message);
        if let Err(e) = workspace.write_record(record).await {
            tracing::error!(job_id = %workspace.id(), error = %e, "Cannot write job record");
        }
        // Written even when the record could not be, and always last.
        if let Err(e) = workspace.write_marker(Marker::Error).await {
            tracing::error!(job_id = %workspace.id(), error = %e, "Cannot write error marker");
        }
    }
}

/// Pipeline failure with the reason code persisted in the job record.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct JobError {
    pub kind: FailureKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: FailureKind, message: impl ToString) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

impl From<DetectorError> for JobError {
    fn from(e: DetectorError) -> Self {
        JobError::new(FailureKind::Inference, e)
    }
}

impl From<SerializeError> for JobError {
    fn from(e: SerializeError) -> Self {
        let kind = match &e {
            SerializeError::Workspace(_) => FailureKind::Storage,
            SerializeError::Image(NormalizeError::Image(_)) => FailureKind::Decode,
            _ => FailureKind::Serialize,
        };
        JobError::new(kind, e)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("too many jobs in progress, try again later")]
    QueueFull,

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}
