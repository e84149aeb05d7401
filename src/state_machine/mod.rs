mod job;
mod state;

pub use job::{AuditRecord, FailureKind, Job, JobOutcome, NotificationStatus};
pub use state::{State, StateMachine};
