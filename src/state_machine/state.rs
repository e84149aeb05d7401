use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{Job, JobOutcome};
use crate::error::TransitionError;

/// The lifecycle states of a print job.
///
/// Each job flows through:
/// DETECTED → AWAITING_SIDECAR → (VERIFYING | SKIPPED) → DISPATCHING → (SUCCEEDED | FAILED)
///
/// FAILED is also reachable straight from AWAITING_SIDECAR (payload already gone)
/// and from VERIFYING (bad descriptor, checksum mismatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Detected,
    AwaitingSidecar,
    Verifying,
    Dispatching,
    Succeeded,
    Failed,
    Skipped,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Succeeded | State::Failed | State::Skipped)
    }

    /// Whether `next` is a legal successor. States are never revisited.
    pub fn can_advance_to(self, next: State) -> bool {
        matches!(
            (self, next),
            (State::Detected, State::AwaitingSidecar)
                | (State::AwaitingSidecar, State::Verifying)
                | (State::AwaitingSidecar, State::Skipped)
                | (State::AwaitingSidecar, State::Failed)
                | (State::Verifying, State::Dispatching)
                | (State::Verifying, State::Failed)
                | (State::Dispatching, State::Succeeded)
                | (State::Dispatching, State::Failed)
        )
    }

    /// True once the job has committed to a terminal relocation.
    pub fn requires_relocation(self) -> bool {
        matches!(self, State::Verifying | State::Dispatching)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Detected => write!(f, "DETECTED"),
            State::AwaitingSidecar => write!(f, "AWAITING_SIDECAR"),
            State::Verifying => write!(f, "VERIFYING"),
            State::Dispatching => write!(f, "DISPATCHING"),
            State::Succeeded => write!(f, "SUCCEEDED"),
            State::Failed => write!(f, "FAILED"),
            State::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Drives a `Job` through the state machine.
pub struct StateMachine;

impl StateMachine {
    /// Move the job to `next`, recording the state it leaves.
    pub fn advance(job: &mut Job, next: State) -> Result<(), TransitionError> {
        if !job.state.can_advance_to(next) {
            return Err(TransitionError {
                from: job.state,
                to: next,
            });
        }
        job.state_history.push(job.state);
        job.state = next;
        job.touch();
        Ok(())
    }

    /// Move the job into the terminal state matching `outcome` and remember it.
    pub fn finish(job: &mut Job, outcome: JobOutcome) -> Result<(), TransitionError> {
        let next = match &outcome {
            JobOutcome::Succeeded => State::Succeeded,
            JobOutcome::Failed(_) => State::Failed,
            JobOutcome::Skipped => State::Skipped,
        };
        Self::advance(job, next)?;
        job.outcome = Some(outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::job::FailureKind;
    use std::path::PathBuf;

    fn make_job() -> Job {
        Job::detected(PathBuf::from("/drop/report.pdf"), "ini")
    }

    #[test]
    fn happy_path_walks_all_states() {
        let mut job = make_job();
        assert_eq!(job.state, State::Detected);

        StateMachine::advance(&mut job, State::AwaitingSidecar).unwrap();
        StateMachine::advance(&mut job, State::Verifying).unwrap();
        StateMachine::advance(&mut job, State::Dispatching).unwrap();
        StateMachine::finish(&mut job, JobOutcome::Succeeded).unwrap();

        assert_eq!(job.state, State::Succeeded);
        assert_eq!(
            job.state_history,
            vec![
                State::Detected,
                State::AwaitingSidecar,
                State::Verifying,
                State::Dispatching
            ]
        );
        assert_eq!(job.outcome, Some(JobOutcome::Succeeded));
    }

    #[test]
    fn states_are_never_revisited() {
        let mut job = make_job();
        StateMachine::advance(&mut job, State::AwaitingSidecar).unwrap();
        StateMachine::advance(&mut job, State::Verifying).unwrap();

        let err = StateMachine::advance(&mut job, State::AwaitingSidecar).unwrap_err();
        assert_eq!(err.from, State::Verifying);
        assert_eq!(err.to, State::AwaitingSidecar);
        assert_eq!(job.state, State::Verifying);
    }

    #[test]
    fn terminal_states_have_no_successor() {
        for terminal in [State::Succeeded, State::Failed, State::Skipped] {
            assert!(terminal.is_terminal());
            for next in [
                State::Detected,
                State::AwaitingSidecar,
                State::Verifying,
                State::Dispatching,
                State::Succeeded,
                State::Failed,
                State::Skipped,
            ] {
                assert!(!terminal.can_advance_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn skipped_only_from_awaiting_sidecar() {
        assert!(State::AwaitingSidecar.can_advance_to(State::Skipped));
        assert!(!State::Verifying.can_advance_to(State::Skipped));
        assert!(!State::Dispatching.can_advance_to(State::Skipped));
    }

    #[test]
    fn verification_failure_finishes_failed() {
        let mut job = make_job();
        StateMachine::advance(&mut job, State::AwaitingSidecar).unwrap();
        StateMachine::advance(&mut job, State::Verifying).unwrap();
        let kind = FailureKind::MalformedDescriptor("no sections".into());
        StateMachine::finish(&mut job, JobOutcome::Failed(kind.clone())).unwrap();
        assert_eq!(job.state, State::Failed);
        assert_eq!(job.outcome, Some(JobOutcome::Failed(kind)));
    }

    #[test]
    fn cannot_dispatch_straight_from_detection() {
        let mut job = make_job();
        assert!(StateMachine::advance(&mut job, State::Dispatching).is_err());
    }

    #[test]
    fn relocation_required_from_verifying_onward() {
        assert!(!State::Detected.requires_relocation());
        assert!(!State::AwaitingSidecar.requires_relocation());
        assert!(State::Verifying.requires_relocation());
        assert!(State::Dispatching.requires_relocation());
    }

    #[test]
    fn state_display() {
        assert_eq!(State::Detected.to_string(), "DETECTED");
        assert_eq!(State::AwaitingSidecar.to_string(), "AWAITING_SIDECAR");
        assert_eq!(State::Verifying.to_string(), "VERIFYING");
        assert_eq!(State::Dispatching.to_string(), "DISPATCHING");
        assert_eq!(State::Succeeded.to_string(), "SUCCEEDED");
        assert_eq!(State::Failed.to_string(), "FAILED");
        assert_eq!(State::Skipped.to_string(), "SKIPPED");
    }
}
