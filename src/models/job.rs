use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Length of every job identifier.
pub const JOB_ID_LEN: usize = 16;

/// Unguessable job identifier: exactly 16 lowercase ASCII letters.
///
/// The identifier is both the primary key of a job and the only credential
/// needed to read its results, so it is also the name of the job's workspace
/// directory. Parsing rejects anything else, which keeps path separators and
/// `..` out of workspace paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Wrap a string the caller has already built from lowercase letters.
    pub(crate) fn from_letters(letters: String) -> Self {
        debug_assert!(letters.len() == JOB_ID_LEN && letters.bytes().all(|b| b.is_ascii_lowercase()));
        Self(letters)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed job id")]
pub struct InvalidJobId;

impl FromStr for JobId {
    type Err = InvalidJobId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == JOB_ID_LEN && s.bytes().all(|b| b.is_ascii_lowercase()) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidJobId)
        }
    }
}

impl TryFrom<String> for JobId {
    type Error = InvalidJobId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a job. `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Error,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }
}

/// How the job's images reached the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
    Urls,
    Upload,
    Bytes,
}

/// Machine-readable reason attached to a failed job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Ingest,
    Decode,
    Inference,
    Storage,
    Serialize,
    Panic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

/// Persisted `status.json` of a job workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub state: JobState,
    pub source: SourceKind,
    /// Staged input filenames, in submission order.
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: JobId, source: SourceKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Pending,
            source,
            inputs: Vec::new(),
            reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.reason = Some(FailureReason {
            kind,
            message: message.into(),
        });
        self.transition(JobState::Error);
    }
}
