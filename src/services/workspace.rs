//! On-disk job workspaces.
//!
//! Layout under the shared root:
//!
//! ```text
//! work/<id>/
//!     <input files>        normalized PNGs handed to the detector
//!     status.json          current JobRecord, replaced atomically
//!     filenames.txt        manifest, one filename per line, in processing order
//!     done | error         terminal marker, at most one ever exists
//!     results/<name>       annotated image
//!     results/<name>.box   JSON sidecar [boxes, labels, verdict]
//! ```
//!
//! Workspaces are never removed by the service. Disk usage grows with every
//! submitted job until something outside the process prunes the root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::models::detection::DetectionResult;
use crate::models::job::{JobId, JobRecord, JobState};

const RESULTS_DIR: &str = "results";
const MANIFEST_FILE: &str = "filenames.txt";
const STATUS_FILE: &str = "status.json";
const SIDECAR_SUFFIX: &str = ".box";

/// Terminal sentinel file of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Done,
    Error,
}

impl Marker {
    pub fn file_name(self) -> &'static str {
        match self {
            Marker::Done => "done",
            Marker::Error => "error",
        }
    }

    fn other(self) -> Marker {
        match self {
            Marker::Done => Marker::Error,
            Marker::Error => Marker::Done,
        }
    }

    pub fn state(self) -> JobState {
        match self {
            Marker::Done => JobState::Done,
            Marker::Error => JobState::Error,
        }
    }
}

/// Shared directory that holds every job workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create the root directory. An existing root is fine.
    pub async fn init(&self) -> Result<(), WorkspaceError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Create the workspace of a new job. Fails if it already exists.
    pub async fn create(&self, id: &JobId) -> Result<JobWorkspace, WorkspaceError> {
        let dir = self.root.join(id.as_str());
        fs::create_dir(&dir).await.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => WorkspaceError::AlreadyExists(id.clone()),
            _ => WorkspaceError::Io(e),
        })?;
        fs::create_dir(dir.join(RESULTS_DIR)).await?;

        Ok(JobWorkspace {
            id: id.clone(),
            dir,
        })
    }

    /// Open the workspace of an existing job, if there is one.
    pub async fn open(&self, id: &JobId) -> Result<Option<JobWorkspace>, WorkspaceError> {
        let dir = self.root.join(id.as_str());
        if fs::try_exists(&dir).await? {
            Ok(Some(JobWorkspace {
                id: id.clone(),
                dir,
            }))
        } else {
            Ok(None)
        }
    }

    /// Probe that the root accepts writes (used by the health check).
    pub async fn check_writable(&self) -> Result<(), WorkspaceError> {
        let probe = self.root.join(".health");
        fs::write(&probe, b"ok").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }
}

/// Directory tree of a single job.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    id: JobId,
    dir: PathBuf,
}

impl JobWorkspace {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn input_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    pub fn result_image_path(&self, filename: &str) -> PathBuf {
        self.dir.join(RESULTS_DIR).join(filename)
    }

    pub fn sidecar_path(&self, filename: &str) -> PathBuf {
        self.dir
            .join(RESULTS_DIR)
            .join(format!("{filename}{SIDECAR_SUFFIX}"))
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn marker_path(&self, marker: Marker) -> PathBuf {
        self.dir.join(marker.file_name())
    }

    /// Stage one normalized input image.
    pub async fn write_input(&self, filename: &str, png: &[u8]) -> Result<PathBuf, WorkspaceError> {
        let path = self.input_path(filename);
        fs::write(&path, png).await?;
        Ok(path)
    }

    pub async fn write_result_image(&self, filename: &str, png: &[u8]) -> Result<(), WorkspaceError> {
        fs::write(self.result_image_path(filename), png).await?;
        Ok(())
    }

    pub async fn write_sidecar(
        &self,
        filename: &str,
        result: &DetectionResult,
    ) -> Result<(), WorkspaceError> {
        let json = serde_json::to_vec(result)?;
        fs::write(self.sidecar_path(filename), json).await?;
        Ok(())
    }

    /// Append a filename to the manifest.
    pub async fn append_manifest(&self, filename: &str) -> Result<(), WorkspaceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.manifest_path())
            .await?;
        file.write_all(format!("{filename}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read the manifest. A job that has not produced results yet has an empty one.
    pub async fn read_manifest(&self) -> Result<Vec<String>, WorkspaceError> {
        match fs::read_to_string(self.manifest_path()).await {
            Ok(content) => Ok(content
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn manifest_contains(&self, filename: &str) -> Result<bool, WorkspaceError> {
        Ok(self.read_manifest().await?.iter().any(|f| f == filename))
    }

    /// Create a terminal marker.
    ///
    /// The file is created with create-new semantics and synced to disk. It
    /// is refused when either marker already exists, so a job never carries
    /// both `done` and `error`.
    pub async fn write_marker(&self, marker: Marker) -> Result<(), WorkspaceError> {
        if fs::try_exists(self.marker_path(marker.other())).await? {
            return Err(WorkspaceError::AlreadyTerminal(self.id.clone()));
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.marker_path(marker))
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => WorkspaceError::AlreadyTerminal(self.id.clone()),
                _ => WorkspaceError::Io(e),
            })?;
        file.write_all(marker.file_name().as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// The terminal marker present on disk, if any.
    pub async fn terminal_marker(&self) -> Result<Option<Marker>, WorkspaceError> {
        for marker in [Marker::Done, Marker::Error] {
            if fs::try_exists(self.marker_path(marker)).await? {
                return Ok(Some(marker));
            }
        }
        Ok(None)
    }

    /// Replace `status.json` by writing a temporary file and renaming it over.
    pub async fn write_record(&self, record: &JobRecord) -> Result<(), WorkspaceError> {
        let tmp = self.dir.join(format!("{STATUS_FILE}.tmp"));
        let json = serde_json::to_vec_pretty(record)?;

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, self.dir.join(STATUS_FILE)).await?;
        Ok(())
    }

    pub async fn read_record(&self) -> Result<JobRecord, WorkspaceError> {
        let bytes = fs::read(self.dir.join(STATUS_FILE)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn read_result_image(&self, filename: &str) -> Result<Vec<u8>, WorkspaceError> {
        Ok(fs::read(self.result_image_path(filename)).await?)
    }

    pub async fn read_sidecar(&self, filename: &str) -> Result<Vec<u8>, WorkspaceError> {
        Ok(fs::read(self.sidecar_path(filename)).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("workspace for job {0} already exists")]
    AlreadyExists(JobId),

    #[error("job {0} already has a terminal marker")]
    AlreadyTerminal(JobId),

    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workspace JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::SourceKind;
    use crate::services::ident::generate_job_id;

    async fn scratch() -> (tempfile::TempDir, WorkspaceRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path().join("work"));
        root.init().await.unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn test_init_tolerates_existing_root() {
        let (_dir, root) = scratch().await;
        root.init().await.unwrap();
        assert!(root.path().is_dir());
    }

    #[tokio::test]
    async fn test_create_lays_out_results_dir_once() {
        let (_dir, root) = scratch().await;
        let id = generate_job_id();

        let ws = root.create(&id).await.unwrap();
        assert!(ws.dir().join("results").is_dir());

        let again = root.create(&id).await;
        assert!(matches!(again, Err(WorkspaceError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_open_unknown_job_is_none() {
        let (_dir, root) = scratch().await;
        assert!(root.open(&generate_job_id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_manifest_preserves_order() {
        let (_dir, root) = scratch().await;
        let ws = root.create(&generate_job_id()).await.unwrap();

        assert!(ws.read_manifest().await.unwrap().is_empty());
        for name in ["2.png", "0.png", "b.png"] {
            ws.append_manifest(name).await.unwrap();
        }

        assert_eq!(ws.read_manifest().await.unwrap(), vec!["2.png", "0.png", "b.png"]);
        assert!(ws.manifest_contains("0.png").await.unwrap());
        assert!(!ws.manifest_contains("1.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_only_one_terminal_marker() {
        let (_dir, root) = scratch().await;
        let ws = root.create(&generate_job_id()).await.unwrap();

        assert_eq!(ws.terminal_marker().await.unwrap(), None);
        ws.write_marker(Marker::Done).await.unwrap();
        assert_eq!(ws.terminal_marker().await.unwrap(), Some(Marker::Done));

        assert!(matches!(
            ws.write_marker(Marker::Error).await,
            Err(WorkspaceError::AlreadyTerminal(_))
        ));
        assert!(matches!(
            ws.write_marker(Marker::Done).await,
            Err(WorkspaceError::AlreadyTerminal(_))
        ));
        assert_eq!(ws.terminal_marker().await.unwrap(), Some(Marker::Done));
    }

    #[tokio::test]
    async fn test_record_round_trips_through_disk() {
        let (_dir, root) = scratch().await;
        let id = generate_job_id();
        let ws = root.create(&id).await.unwrap();

        let mut record = JobRecord::new(id.clone(), SourceKind::Urls);
        record.inputs = vec!["0.png".to_string()];
        record.transition(JobState::Running);
        ws.write_record(&record).await.unwrap();

        let read = ws.read_record().await.unwrap();
        assert_eq!(read.id, id);
        assert_eq!(read.state, JobState::Running);
        assert_eq!(read.inputs, vec!["0.png"]);
        assert!(!ws.dir().join("status.json.tmp").exists());
    }
}
