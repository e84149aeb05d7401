use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::State;
use crate::descriptor::JobDescriptor;

/// Why a job ended in FAILED. The `Display` text is the reason recorded in the
/// sidecar's `[Status]` section and sent to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The payload was no longer at its origin (already relocated by a duplicate).
    NotFound(PathBuf),
    /// The sidecar could not be read as sectioned key-value text.
    MalformedDescriptor(String),
    /// Declared and computed digests differ.
    ChecksumMismatch {
        file_name: String,
        declared: String,
        computed: String,
    },
    /// The output device rejected the job or could not be invoked.
    DispatchFailure(String),
    /// Any other error raised while the job was being processed.
    Unexpected(String),
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::NotFound(path) => write!(f, "not found: {}", path.display()),
            FailureKind::MalformedDescriptor(detail) => write!(f, "malformed descriptor: {detail}"),
            FailureKind::ChecksumMismatch {
                file_name,
                declared,
                computed,
            } => write!(
                f,
                "checksum mismatch for {file_name}: declared {declared}, computed {computed}"
            ),
            FailureKind::DispatchFailure(detail) => write!(f, "printing error: {detail}"),
            FailureKind::Unexpected(detail) => write!(f, "unexpected error: {detail}"),
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Succeeded,
    Failed(FailureKind),
    Skipped,
}

/// What happened to the submitter notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStatus {
    /// No address known (no descriptor, or empty `EmailAddress`), or no
    /// notification applies (SKIPPED, duplicate).
    NotAttempted,
    Delivered,
    Failed(String),
}

/// One payload moving through the intake pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub payload_path: PathBuf,
    pub sidecar_path: PathBuf,
    pub descriptor: Option<JobDescriptor>,
    pub state: State,
    pub state_history: Vec<State>,
    pub outcome: Option<JobOutcome>,
    pub relocated_to: Option<PathBuf>,
    pub notification: NotificationStatus,
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A freshly detected job. The sidecar path is `<payload-filename>.<sidecar_extension>`.
    pub fn detected(payload_path: PathBuf, sidecar_extension: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            sidecar_path: sidecar_path_for(&payload_path, sidecar_extension),
            payload_path,
            descriptor: None,
            state: State::Detected,
            state_history: Vec::new(),
            outcome: None,
            relocated_to: None,
            notification: NotificationStatus::NotAttempted,
            detected_at: now,
            updated_at: now,
        }
    }

    /// File name of the payload, as shown to the submitter.
    pub fn file_name(&self) -> String {
        self.payload_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Submitter address, if the descriptor was parsed and carries one.
    pub fn submitter_address(&self) -> Option<&str> {
        self.descriptor
            .as_ref()
            .and_then(|d| d.submitter_address.as_deref())
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Derive the sidecar path by appending `.<extension>` to the full payload file name.
pub fn sidecar_path_for(payload_path: &Path, extension: &str) -> PathBuf {
    let mut raw: OsString = payload_path.as_os_str().to_owned();
    raw.push(".");
    raw.push(extension);
    PathBuf::from(raw)
}

/// Structured audit record produced when a job reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub job_id: String,
    pub payload: PathBuf,
    pub final_state: State,
    pub state_transitions: Vec<State>,
    pub reason: Option<String>,
    pub relocated_to: Option<PathBuf>,
    pub notification: NotificationStatus,
    pub submitter: Option<String>,
    pub detected_at: DateTime<Utc>,
    /// When the job entered its final state.
    pub last_transition_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl AuditRecord {
    /// Generate an audit record from a finished job.
    pub fn from_job(job: &Job) -> Self {
        let now = Utc::now();
        let duration = now - job.detected_at;
        let mut transitions = job.state_history.clone();
        transitions.push(job.state);

        let reason = match &job.outcome {
            Some(JobOutcome::Failed(kind)) => Some(kind.to_string()),
            _ => None,
        };

        Self {
            job_id: job.id.clone(),
            payload: job.payload_path.clone(),
            final_state: job.state,
            state_transitions: transitions,
            reason,
            relocated_to: job.relocated_to.clone(),
            notification: job.notification.clone(),
            submitter: job.submitter_address().map(str::to_string),
            detected_at: job.detected_at,
            last_transition_at: job.updated_at,
            completed_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}
