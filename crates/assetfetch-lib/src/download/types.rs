use crate::manifest::DownloadEntry;
use serde::{Deserialize, Serialize};

/// What to do when an entry's parent directory cannot be created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryErrorPolicy {
    /// Record the entry as failed and move on to the next one.
    #[default]
    Continue,
    /// Stop the run before any further entry is attempted.
    Abort,
}

#[derive(Clone, Copy, Debug)]
pub struct DownloadOptions {
    pub parallelism: usize,
    pub max_concurrency_per_host: usize,
    pub on_directory_error: DirectoryErrorPolicy,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            max_concurrency_per_host: 8,
            on_directory_error: DirectoryErrorPolicy::Continue,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success { bytes_written: u64 },
    Failure { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryOutcome {
    pub entry: DownloadEntry,
    pub outcome: Outcome,
}

impl EntryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }
}

/// Per-entry outcomes of a run, in manifest order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: Vec<EntryOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}
