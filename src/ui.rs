//! Interface de terminal do PAYG: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente um job
//! executado com `payg process`; [`FolderStatus`] alimenta `payg status`.

use std::io;
use std::path::Path;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::PaygConfig;
use crate::state_machine::{AuditRecord, NotificationStatus, State};

/// Indicador visual de progresso para um job executado no terminal.
///
/// Exibe um spinner durante o processamento e mensagens coloridas para
/// sucesso (verde), falha (vermelho) e job ignorado (amarelo).
pub struct JobProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner com o nome do arquivo e retorna a instância de progresso.
    pub fn start(file_name: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("{}: {file_name}", State::Detected));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o estado terminal do job.
    pub fn complete(&self, record: &AuditRecord) {
        self.pb.finish_and_clear();
        match record.final_state {
            State::Succeeded => {
                println!("  {} Job printed successfully", self.green.apply_to("✓"));
            }
            State::Skipped => {
                println!(
                    "  {} Job skipped: no sidecar next to the payload",
                    self.yellow.apply_to("–")
                );
            }
            _ => {
                let reason = record.reason.as_deref().unwrap_or("unknown");
                println!("  {} Job failed: {reason}", self.red.apply_to("✗"));
            }
        }
        if let NotificationStatus::Failed(e) = &record.notification {
            println!("  {} Notification not delivered: {e}", self.yellow.apply_to("!"));
        }
    }

    /// Imprime o registro de auditoria formatado em JSON com estilo colorido.
    pub fn print_audit(&self, record: &AuditRecord) {
        let status_style = match record.final_state {
            State::Succeeded => &self.green,
            State::Failed => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", status_style.apply_to("─── Audit Record ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(record).unwrap_or_default()
        );
    }
}

/// Contagem de arquivos na pasta monitorada e nas subpastas terminais.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderStatus {
    pub pending: usize,
    pub complete: usize,
    pub error: usize,
}

impl FolderStatus {
    /// Conta documentos (pela extensão configurada) em cada pasta.
    pub fn collect(config: &PaygConfig) -> io::Result<Self> {
        let ext = &config.payload_extension;
        Ok(Self {
            pending: count_payloads(&config.monitor_dir, ext)?,
            complete: count_payloads(&config.complete_path(), ext)?,
            error: count_payloads(&config.error_path(), ext)?,
        })
    }
}

fn count_payloads(dir: &Path, extension: &str) -> io::Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path.is_file()
            && path
                .extension()
                .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(extension));
        if matches {
            count += 1;
        }
    }
    Ok(count)
}

/// Imprime o resumo das pastas.
pub fn print_status(config: &PaygConfig, status: &FolderStatus) {
    let bold = Style::new().bold();
    println!("{}", bold.apply_to(format!("Monitoring {}", config.monitor_dir.display())));
    println!("  pending   {}", Style::new().yellow().apply_to(status.pending));
    println!(
        "  {:<9} {}",
        config.complete_dir,
        Style::new().green().apply_to(status.complete)
    );
    println!(
        "  {:<9} {}",
        config.error_dir,
        Style::new().red().apply_to(status.error)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn status_counts_payloads_per_folder() {
        let tmp = TempDir::new().unwrap();
        let config = PaygConfig {
            monitor_dir: tmp.path().to_path_buf(),
            ..PaygConfig::default()
        };
        std::fs::create_dir(config.complete_path()).unwrap();
        std::fs::write(tmp.path().join("a.pdf"), b"").unwrap();
        std::fs::write(tmp.path().join("a.pdf.ini"), b"").unwrap();
        std::fs::write(tmp.path().join("B.PDF"), b"").unwrap();
        std::fs::write(config.complete_path().join("c.pdf"), b"").unwrap();

        let status = FolderStatus::collect(&config).unwrap();
        assert_eq!(
            status,
            FolderStatus {
                pending: 2,
                complete: 1,
                error: 0
            }
        );
    }
}
