use std::time::Duration;

use crate::services::workspace::{JobWorkspace, Marker, WorkspaceError};

/// What a status poll observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Terminal(Marker),
    /// The ceiling was reached with no marker on disk; the job may still finish.
    TimedOut,
}

impl PollOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            PollOutcome::Terminal(marker) => marker.file_name(),
            PollOutcome::TimedOut => "pending",
        }
    }
}

/// Check for a terminal marker every `interval`, at most `max_sleeps` times.
///
/// The job itself is never cancelled by a poll giving up.
pub async fn wait_for_terminal(
    workspace: &JobWorkspace,
    interval: Duration,
    max_sleeps: u32,
) -> Result<PollOutcome, WorkspaceError> {
    let mut sleeps = 0;
    loop {
        if let Some(marker) = workspace.terminal_marker().await? {
            return Ok(PollOutcome::Terminal(marker));
        }
        if sleeps >= max_sleeps {
            return Ok(PollOutcome::TimedOut);
        }
        tokio::time::sleep(interval).await;
        sleeps += 1;
    }
}
