mod cli;
mod config;
mod descriptor;
mod dispatcher;
mod error;
mod integrity;
mod logging;
mod notifier;
mod orchestrator;
mod relocation;
mod service;
mod state_machine;
mod ui;
mod watch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cli::{Cli, Command};
use config::PaygConfig;
use dispatcher::{Dispatcher, LpDevice};
use notifier::{OutcomeNotifier, SmtpMailer, Transport, UnconfiguredTransport};
use orchestrator::JobOrchestrator;
use ui::{FolderStatus, JobProgress};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PaygConfig::load_from(path)?,
        None => PaygConfig::load()?,
    };
    logging::init(cli.verbose, Some(config.log_file.as_path()))?;
    let config = Arc::new(config);

    match cli.command {
        Command::Watch => {
            let orchestrator = Arc::new(build_orchestrator(&config));
            let shutdown = CancellationToken::new();
            let on_signal = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "cannot listen for Ctrl-C");
                    return;
                }
                info!("Ctrl-C received");
                on_signal.cancel();
            });
            service::run(orchestrator, shutdown).await?;
        }
        Command::Process { payload } => {
            let orchestrator = build_orchestrator(&config);
            orchestrator.prepare_layout()?;
            let file_name = payload
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let progress = JobProgress::start(&file_name);
            let record = orchestrator
                .run_job_with_grace(payload, Duration::ZERO)
                .await;
            progress.complete(&record);
            progress.print_audit(&record);
        }
        Command::Status => {
            let status = FolderStatus::collect(&config)?;
            ui::print_status(&config, &status);
        }
    }

    Ok(())
}

fn build_orchestrator(config: &Arc<PaygConfig>) -> JobOrchestrator {
    let device = Arc::new(LpDevice::new(config.print_command.clone()));
    let dispatcher = Dispatcher::new(device, config.printer_name.clone(), config.print_timeout());

    let transport: Arc<dyn Transport> = match SmtpMailer::from_config(&config.smtp) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            warn!(error = %e, "email notifications disabled");
            Arc::new(UnconfiguredTransport)
        }
    };
    let notifier = OutcomeNotifier::new(transport, config);

    JobOrchestrator::new(Arc::clone(config), dispatcher, notifier)
}
