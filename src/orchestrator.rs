use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::PaygConfig;
use crate::descriptor::{JobDescriptor, OutcomeRecord};
use crate::dispatcher::{Dispatcher, PrintOptions};
use crate::error::TransitionError;
use crate::integrity;
use crate::notifier::{NotifyError, OutcomeNotifier, Recipient};
use crate::relocation::relocate_pair;
use crate::state_machine::{
    AuditRecord, FailureKind, Job, JobOutcome, NotificationStatus, State, StateMachine,
};

/// Drives jobs through the full state machine lifecycle.
///
/// The orchestrator is the only component that moves job files or rewrites a
/// sidecar. It is shared between workers behind an `Arc`.
pub struct JobOrchestrator {
    config: Arc<PaygConfig>,
    dispatcher: Dispatcher,
    notifier: OutcomeNotifier,
    /// Bounds the number of jobs past the grace period.
    permits: Semaphore,
    /// Payload paths currently owned by a job.
    in_flight: Mutex<HashSet<PathBuf>>,
}

/// Exclusive ownership of one (payload, sidecar) pair, released on drop.
struct PairClaim<'a> {
    in_flight: &'a Mutex<HashSet<PathBuf>>,
    payload: PathBuf,
}

impl Drop for PairClaim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.payload);
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

impl JobOrchestrator {
    pub fn new(config: Arc<PaygConfig>, dispatcher: Dispatcher, notifier: OutcomeNotifier) -> Self {
        let permits = Semaphore::new(config.max_concurrent_jobs.max(1));
        Self {
            config,
            dispatcher,
            notifier,
            permits,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &PaygConfig {
        &self.config
    }

    /// Create the `Complete/` and `Error/` subfolders. Idempotent.
    pub fn prepare_layout(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config.complete_path())?;
        std::fs::create_dir_all(self.config.error_path())?;
        Ok(())
    }

    /// Process one detected payload with the configured grace period.
    pub async fn run_job(&self, payload: PathBuf) -> AuditRecord {
        self.run_job_with_grace(payload, self.config.grace_period())
            .await
    }

    /// Process one detected payload to a terminal state and return its audit
    /// record. Never fails: every per-job error ends as a FAILED or SKIPPED job.
    pub async fn run_job_with_grace(&self, payload: PathBuf, grace: Duration) -> AuditRecord {
        let mut job = Job::detected(payload, &self.config.sidecar_extension);
        let span = info_span!("job", job_id = %job.id, file = %job.file_name());

        async {
            info!(payload = %job.payload_path.display(), "job detected");
            if let Err(e) = self.lifecycle(&mut job, grace).await {
                error!(error = %e, state = %job.state, "job aborted");
            }
            if !job.state.is_terminal() {
                warn!(state = %job.state, "job stopped outside a terminal state");
            }

            let record = AuditRecord::from_job(&job);
            match serde_json::to_string(&record) {
                Ok(json) => info!(state = %job.state, audit = %json, "job finished"),
                Err(e) => warn!(state = %job.state, error = %e, "job finished; audit record not serializable"),
            }
            record
        }
        .instrument(span)
        .await
    }

    async fn lifecycle(&self, job: &mut Job, grace: Duration) -> Result<(), TransitionError> {
        // DETECTED → AWAITING_SIDECAR: give the sidecar time to land.
        if !grace.is_zero() {
            debug!(grace_ms = grace.as_millis() as u64, "waiting for sidecar");
            sleep(grace).await;
        }
        StateMachine::advance(job, State::AwaitingSidecar)?;

        // The payload at its origin is the single source of truth: a duplicate
        // signal for an already-relocated pair ends here.
        if !file_exists(&job.payload_path).await {
            return self.fail_fast(job);
        }
        let Some(_claim) = self.claim(&job.payload_path) else {
            return self.fail_fast(job);
        };
        if !file_exists(&job.payload_path).await {
            return self.fail_fast(job);
        }

        if !self.await_sidecar(job).await {
            info!(
                sidecar = %job.sidecar_path.display(),
                "no sidecar found; payload left in place"
            );
            return StateMachine::finish(job, JobOutcome::Skipped);
        }

        let _permit = self.permits.acquire().await.ok();

        StateMachine::advance(job, State::Verifying)?;
        match self.verify_and_dispatch(job).await {
            Ok(()) => self.complete_success(job).await,
            Err(kind) => self.complete_failure(job, kind).await,
        }
    }

    fn fail_fast(&self, job: &mut Job) -> Result<(), TransitionError> {
        warn!(
            payload = %job.payload_path.display(),
            "payload not found at origin or already claimed; duplicate signal ignored"
        );
        let kind = FailureKind::NotFound(job.payload_path.clone());
        StateMachine::finish(job, JobOutcome::Failed(kind))
    }

    fn claim(&self, payload: &Path) -> Option<PairClaim<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(payload.to_path_buf()) {
            return None;
        }
        Some(PairClaim {
            in_flight: &self.in_flight,
            payload: payload.to_path_buf(),
        })
    }

    async fn await_sidecar(&self, job: &Job) -> bool {
        if file_exists(&job.sidecar_path).await {
            return true;
        }
        let attempts = self.config.sidecar_recheck_attempts;
        for attempt in 1..=attempts {
            sleep(self.config.sidecar_recheck_interval()).await;
            if file_exists(&job.sidecar_path).await {
                debug!(attempt, "sidecar arrived on recheck");
                return true;
            }
            debug!(attempt, attempts, "sidecar still missing");
        }
        false
    }

    /// VERIFYING → DISPATCHING → device. Any error is returned as the failure
    /// classification; the caller performs the failure path.
    async fn verify_and_dispatch(&self, job: &mut Job) -> Result<(), FailureKind> {
        let descriptor = JobDescriptor::load(&job.sidecar_path)
            .map_err(|e| FailureKind::MalformedDescriptor(e.to_string()))?;
        info!(
            page_size = %descriptor.page_size,
            orientation = %descriptor.orientation,
            color = %descriptor.color_mode,
            checksum = descriptor.declared_checksum.as_deref().unwrap_or(""),
            submitter = %descriptor.submitter_name,
            email = descriptor.submitter_address.as_deref().unwrap_or(""),
            "descriptor parsed"
        );
        if let Some(at) = &descriptor.deferred_output_time {
            debug!(delay_print_time = %at, "DelayPrintTime is reserved and not applied");
        }
        job.descriptor = Some(descriptor.clone());

        match &descriptor.declared_checksum {
            None => debug!("no declared checksum; verification skipped"),
            Some(declared) => {
                let check = integrity::verify(job.payload_path.clone(), declared.clone())
                    .await
                    .map_err(|e| FailureKind::Unexpected(format!("cannot read payload: {e}")))?;
                if !check.matches() {
                    return Err(FailureKind::ChecksumMismatch {
                        file_name: job.file_name(),
                        declared: check.declared,
                        computed: check.computed,
                    });
                }
                info!(md5 = %check.computed, "checksum verified");
            }
        }

        StateMachine::advance(job, State::Dispatching)
            .map_err(|e| FailureKind::Unexpected(e.to_string()))?;

        let options = PrintOptions::from_descriptor(&descriptor);
        let response = self
            .dispatcher
            .dispatch(&job.payload_path, &options)
            .await
            .map_err(|e| FailureKind::DispatchFailure(e.to_string()))?;
        info!(diagnostic = %response.diagnostic, "printer accepted job");
        Ok(())
    }

    async fn complete_success(&self, job: &mut Job) -> Result<(), TransitionError> {
        StateMachine::finish(job, JobOutcome::Succeeded)?;
        info!(printer = %self.dispatcher.printer_name(), "job printed");

        self.relocate(job, self.config.complete_path()).await;

        let file_name = job.file_name();
        let status = match recipient_of(job) {
            Some((name, address)) => {
                let recipient = Recipient {
                    name: &name,
                    address: &address,
                };
                notification_status(self.notifier.notify_success(recipient, &file_name).await)
            }
            None => {
                info!("no submitter address; success notification skipped");
                NotificationStatus::NotAttempted
            }
        };
        job.notification = status;
        Ok(())
    }

    async fn complete_failure(&self, job: &mut Job, kind: FailureKind) -> Result<(), TransitionError> {
        let reason = kind.to_string();
        error!(reason = %reason, state = %job.state, "job failed");
        debug_assert!(job.state.requires_relocation());
        StateMachine::finish(job, JobOutcome::Failed(kind))?;

        // Record first so it survives a failed relocation.
        match OutcomeRecord::new(reason.clone()).write_into(&job.sidecar_path) {
            Ok(()) => debug!(sidecar = %job.sidecar_path.display(), "status record written"),
            Err(e) => error!(
                sidecar = %job.sidecar_path.display(),
                error = %e,
                "could not write status record"
            ),
        }

        self.relocate(job, self.config.error_path()).await;

        let file_name = job.file_name();
        let status = match recipient_of(job) {
            Some((name, address)) => {
                let recipient = Recipient {
                    name: &name,
                    address: &address,
                };
                notification_status(
                    self.notifier
                        .notify_failure(recipient, &file_name, &reason)
                        .await,
                )
            }
            None => {
                if job.descriptor.is_none() {
                    error!(reason = %reason, "failure before submitter was known; nobody to notify");
                } else {
                    info!("no submitter address; failure notification skipped");
                }
                NotificationStatus::NotAttempted
            }
        };
        job.notification = status;
        Ok(())
    }

    /// Terminal relocation. A failure is logged for the operator; the job's
    /// terminal state stands.
    async fn relocate(&self, job: &mut Job, dest: PathBuf) {
        match relocate_pair(&job.payload_path, &job.sidecar_path, &dest).await {
            Ok(moved) => {
                debug!(sidecar = %moved.sidecar.display(), "pair relocated");
                job.relocated_to = Some(moved.payload);
            }
            Err(e) => error!(
                error = %e,
                dest = %dest.display(),
                "relocation failed; files remain at origin and need operator attention"
            ),
        }
    }
}

fn recipient_of(job: &Job) -> Option<(String, String)> {
    let descriptor = job.descriptor.as_ref()?;
    let address = descriptor.submitter_address.as_ref()?;
    Some((descriptor.submitter_name.clone(), address.clone()))
}

fn notification_status(result: Result<(), NotifyError>) -> NotificationStatus {
    match result {
        Ok(()) => NotificationStatus::Delivered,
        Err(e) => NotificationStatus::Failed(e.to_string()),
    }
}
