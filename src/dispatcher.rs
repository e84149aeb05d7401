//! Submission of a verified payload to the output device.
//!
//! [`Dispatcher`] derives the CUPS options from a [`JobDescriptor`] and hands the
//! file to an [`OutputDevice`]. The production device shells out to `lp`; tests
//! plug in a recorder.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::descriptor::JobDescriptor;

/// Color mode value that selects grayscale output.
const GRAYSCALE_COLOR_MODE: &str = "Black and white";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("could not start print command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("printer rejected job (exit code {}): {diagnostic}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Rejected {
        code: Option<i32>,
        diagnostic: String,
    },

    #[error("print command timed out after {0:?}")]
    TimedOut(Duration),
}

/// Options derived from the descriptor for one print submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    pub page_size: String,
    pub orientation: String,
    pub grayscale: bool,
}

impl PrintOptions {
    pub fn from_descriptor(descriptor: &JobDescriptor) -> Self {
        Self {
            page_size: descriptor.page_size.clone(),
            orientation: descriptor.orientation.clone(),
            grayscale: descriptor
                .color_mode
                .trim()
                .eq_ignore_ascii_case(GRAYSCALE_COLOR_MODE),
        }
    }

    /// CUPS `name=value` options. Color output is the device default, so only
    /// grayscale adds an option.
    pub fn cups_options(&self) -> Vec<String> {
        let mut options = vec![
            format!("PageSize={}", self.page_size),
            format!("Orientation={}", self.orientation),
        ];
        if self.grayscale {
            options.push("ColorModel=Gray".to_string());
        }
        options
    }
}

/// Raw result of one device invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceResponse {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub diagnostic: String,
}

/// The physical print subsystem.
#[async_trait]
pub trait OutputDevice: Send + Sync {
    async fn submit(
        &self,
        printer: &str,
        options: &[String],
        file: &Path,
    ) -> Result<DeviceResponse, DispatchError>;
}

/// Prints through the CUPS `lp` command: `lp -d <printer> -o k=v ... <file>`.
pub struct LpDevice {
    command: String,
}

impl LpDevice {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn args(printer: &str, options: &[String], file: &Path) -> Vec<String> {
        let mut args = vec!["-d".to_string(), printer.to_string()];
        for option in options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push(file.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl OutputDevice for LpDevice {
    async fn submit(
        &self,
        printer: &str,
        options: &[String],
        file: &Path,
    ) -> Result<DeviceResponse, DispatchError> {
        let args = Self::args(printer, options, file);
        debug!(command = %self.command, ?args, "invoking print command");

        let output = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DispatchError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let mut diagnostic = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            if !diagnostic.is_empty() {
                diagnostic.push(' ');
            }
            diagnostic.push_str(stderr);
        }

        Ok(DeviceResponse {
            success: output.status.success(),
            exit_code: output.status.code(),
            diagnostic,
        })
    }
}

/// Sends payloads to one named printer through an [`OutputDevice`].
pub struct Dispatcher {
    device: Arc<dyn OutputDevice>,
    printer_name: String,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(device: Arc<dyn OutputDevice>, printer_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            device,
            printer_name: printer_name.into(),
            timeout,
        }
    }

    pub fn printer_name(&self) -> &str {
        &self.printer_name
    }

    /// Submit `payload` and wait for the device. A non-zero exit, a spawn error
    /// or a timeout all come back as `Err`; none of them is fatal to the process.
    pub async fn dispatch(
        &self,
        payload: &Path,
        options: &PrintOptions,
    ) -> Result<DeviceResponse, DispatchError> {
        let cups_options = options.cups_options();
        info!(
            payload = %payload.display(),
            printer = %self.printer_name,
            options = ?cups_options,
            "dispatching to printer"
        );

        let response = tokio::time::timeout(
            self.timeout,
            self.device.submit(&self.printer_name, &cups_options, payload),
        )
        .await
        .map_err(|_| DispatchError::TimedOut(self.timeout))??;

        if response.success {
            Ok(response)
        } else {
            Err(DispatchError::Rejected {
                code: response.exit_code,
                diagnostic: response.diagnostic,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// One recorded call to [`RecordingDevice`].
    #[derive(Debug, Clone)]
    pub struct Submission {
        pub printer: String,
        pub options: Vec<String>,
        pub file: PathBuf,
    }

    /// Output device that records submissions and answers with a fixed response.
    pub struct RecordingDevice {
        pub submissions: Mutex<Vec<Submission>>,
        response: DeviceResponse,
        delay: Duration,
    }

    impl RecordingDevice {
        pub fn succeeding() -> Self {
            Self::with_response(DeviceResponse {
                success: true,
                exit_code: Some(0),
                diagnostic: "request id is PDF-1 (1 file(s))".into(),
            })
        }

        pub fn failing(diagnostic: &str) -> Self {
            Self::with_response(DeviceResponse {
                success: false,
                exit_code: Some(1),
                diagnostic: diagnostic.into(),
            })
        }

        pub fn with_response(response: DeviceResponse) -> Self {
            Self {
                submissions: Mutex::new(Vec::new()),
                response,
                delay: Duration::ZERO,
            }
        }

        pub fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> Vec<Submission> {
            self.submissions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OutputDevice for RecordingDevice {
        async fn submit(
            &self,
            printer: &str,
            options: &[String],
            file: &Path,
        ) -> Result<DeviceResponse, DispatchError> {
            self.submissions.lock().unwrap().push(Submission {
                printer: printer.to_string(),
                options: options.to_vec(),
                file: file.to_path_buf(),
            });
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.response.clone())
        }
    }
}
