//! Long-lived listener: reads candidates from the watch source and hands each
//! one to its own worker task.
//!
//! Shutdown stops the listener from scheduling new work, then waits for every
//! in-flight job to finish relocation and notification.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::error::PaygError;
use crate::orchestrator::JobOrchestrator;
use crate::watch::WatchSource;

/// Run until `shutdown` is cancelled or the watch source fails.
///
/// A watch source failure is returned after in-flight jobs have drained; it is
/// the only error that ends the listener.
pub async fn run(
    orchestrator: Arc<JobOrchestrator>,
    shutdown: CancellationToken,
) -> Result<(), PaygError> {
    let config = orchestrator.config();
    if !config.monitor_dir.is_dir() {
        return Err(PaygError::MonitorDirMissing(config.monitor_dir.clone()));
    }
    orchestrator.prepare_layout()?;
    let mut source = WatchSource::open(config)?;
    info!(
        dir = %config.monitor_dir.display(),
        printer = %config.printer_name,
        grace_ms = config.grace_period_ms,
        "monitoring folder"
    );

    let tracker = TaskTracker::new();
    let result = loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown requested; no new jobs will be scheduled");
                break Ok(());
            }

            candidate = source.next_candidate() => match candidate {
                Ok(payload) => {
                    let worker = Arc::clone(&orchestrator);
                    tracker.spawn(async move {
                        worker.run_job(payload).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "watch source lost");
                    break Err(PaygError::from(e));
                }
            },
        }
    };

    tracker.close();
    if !tracker.is_empty() {
        info!(in_flight = tracker.len(), "waiting for in-flight jobs");
    }
    tracker.wait().await;
    info!("listener stopped");
    result
}
