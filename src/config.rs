//! Configuração do PAYG carregada a partir de `payg.toml`.
//!
//! A struct [`PaygConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `PAYG_SMTP_PASSWORD` tem precedência sobre o arquivo.

use anyhow::{Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "payg.toml";

/// Configuração de nível superior carregada de `payg.toml`.
///
/// Construída uma única vez na inicialização e compartilhada via `Arc`;
/// nunca é alterada depois disso.
#[derive(Debug, Clone, Deserialize)]
pub struct PaygConfig {
    /// Diretório monitorado (não recursivo).
    #[serde(default = "default_monitor_dir")]
    pub monitor_dir: PathBuf,

    /// Nome da impressora CUPS de destino.
    #[serde(default = "default_printer_name")]
    pub printer_name: String,

    /// Rótulo do local do servidor, usado nas mensagens ao remetente.
    #[serde(default)]
    pub site_location: String,

    /// Espera após a detecção antes de procurar o arquivo de metadados.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Verificações extras do arquivo de metadados antes de desistir.
    #[serde(default)]
    pub sidecar_recheck_attempts: u32,

    /// Intervalo entre as verificações extras.
    #[serde(default = "default_sidecar_recheck_interval_ms")]
    pub sidecar_recheck_interval_ms: u64,

    /// Máximo de jobs processados em paralelo após o período de espera.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Extensão dos documentos a imprimir (sem o ponto).
    #[serde(default = "default_payload_extension")]
    pub payload_extension: String,

    /// Extensão do arquivo de metadados, anexada ao nome do documento.
    #[serde(default = "default_sidecar_extension")]
    pub sidecar_extension: String,

    /// Subpasta para jobs impressos com sucesso.
    #[serde(default = "default_complete_dir")]
    pub complete_dir: String,

    /// Subpasta para jobs com falha.
    #[serde(default = "default_error_dir")]
    pub error_dir: String,

    /// Arquivo de log (somente anexação).
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Comando usado para enviar o documento à impressora.
    #[serde(default = "default_print_command")]
    pub print_command: String,

    /// Tempo máximo de espera pelo comando de impressão.
    #[serde(default = "default_print_timeout_secs")]
    pub print_timeout_secs: u64,

    /// Parâmetros do servidor de e-mail.
    #[serde(default)]
    pub smtp: SmtpConfig,
}

/// Parâmetros de envio de e-mail.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Endereço usado no campo `From`.
    #[serde(default)]
    pub from_address: String,

    /// Assunto da mensagem de sucesso; `{file_name}` é substituído.
    #[serde(default = "default_success_subject")]
    pub success_subject: String,

    /// Assunto da mensagem de erro; `{file_name}` é substituído.
    #[serde(default = "default_error_subject")]
    pub error_subject: String,

    /// Endereço de suporte exibido no rodapé das mensagens.
    #[serde(default)]
    pub support_address: Option<String>,
}

fn default_monitor_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_printer_name() -> String {
    "PDF".to_string()
}

// Tempo suficiente para o cliente terminar de gravar o arquivo de metadados.
fn default_grace_period_ms() -> u64 {
    4000
}

fn default_sidecar_recheck_interval_ms() -> u64 {
    500
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_payload_extension() -> String {
    "pdf".to_string()
}

fn default_sidecar_extension() -> String {
    "ini".to_string()
}

fn default_complete_dir() -> String {
    "Complete".to_string()
}

fn default_error_dir() -> String {
    "Error".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("print_log.txt")
}

fn default_print_command() -> String {
    "lp".to_string()
}

fn default_print_timeout_secs() -> u64 {
    120
}

fn default_smtp_port() -> u16 {
    587
}

fn default_success_subject() -> String {
    "Print Job Completed - {file_name}".to_string()
}

fn default_error_subject() -> String {
    "Print Job Error - {file_name}".to_string()
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_address: String::new(),
            success_subject: default_success_subject(),
            error_subject: default_error_subject(),
            support_address: None,
        }
    }
}

impl Default for PaygConfig {
    fn default() -> Self {
        Self {
            monitor_dir: default_monitor_dir(),
            printer_name: default_printer_name(),
            site_location: String::new(),
            grace_period_ms: default_grace_period_ms(),
            sidecar_recheck_attempts: 0,
            sidecar_recheck_interval_ms: default_sidecar_recheck_interval_ms(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            payload_extension: default_payload_extension(),
            sidecar_extension: default_sidecar_extension(),
            complete_dir: default_complete_dir(),
            error_dir: default_error_dir(),
            log_file: default_log_file(),
            print_command: default_print_command(),
            print_timeout_secs: default_print_timeout_secs(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl PaygConfig {
    /// Carrega a configuração de `payg.toml` no diretório atual.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Carrega a configuração do caminho informado.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<PaygConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para a senha SMTP.
        if let Ok(password) = std::env::var("PAYG_SMTP_PASSWORD") {
            if !password.is_empty() {
                config.smtp.password = password;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejeita combinações que impediriam o processamento de qualquer job.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            bail!("max_concurrent_jobs must be at least 1");
        }
        if self.payload_extension.trim().is_empty() || self.sidecar_extension.trim().is_empty() {
            bail!("payload_extension and sidecar_extension must not be empty");
        }
        if self.complete_dir == self.error_dir {
            bail!("complete_dir and error_dir must differ");
        }
        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn sidecar_recheck_interval(&self) -> Duration {
        Duration::from_millis(self.sidecar_recheck_interval_ms)
    }

    pub fn print_timeout(&self) -> Duration {
        Duration::from_secs(self.print_timeout_secs)
    }

    /// Caminho absoluto (ou relativo ao cwd) da subpasta de sucesso.
    pub fn complete_path(&self) -> PathBuf {
        self.monitor_dir.join(&self.complete_dir)
    }

    /// Caminho da subpasta de erro.
    pub fn error_path(&self) -> PathBuf {
        self.monitor_dir.join(&self.error_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = PaygConfig::default();
        assert_eq!(config.printer_name, "PDF");
        assert_eq!(config.grace_period_ms, 4000);
        assert_eq!(config.sidecar_recheck_attempts, 0);
        assert_eq!(config.payload_extension, "pdf");
        assert_eq!(config.sidecar_extension, "ini");
        assert_eq!(config.complete_dir, "Complete");
        assert_eq!(config.error_dir, "Error");
        assert_eq!(config.smtp.port, 587);
        assert!(config.smtp.password.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            monitor_dir = "/srv/print-drop"
            printer_name = "Office_Laser"
            grace_period_ms = 250

            [smtp]
            host = "mail.example.com"
            from_address = "printer@example.com"
        "#;
        let config: PaygConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.monitor_dir, PathBuf::from("/srv/print-drop"));
        assert_eq!(config.printer_name, "Office_Laser");
        assert_eq!(config.grace_period(), Duration::from_millis(250));
        assert_eq!(config.smtp.host, "mail.example.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.success_subject, "Print Job Completed - {file_name}");
        assert_eq!(config.max_concurrent_jobs, 4);
    }

    #[test]
    fn subfolder_paths_hang_off_monitor_dir() {
        let config = PaygConfig {
            monitor_dir: PathBuf::from("/drop"),
            ..Default::default()
        };
        assert_eq!(config.complete_path(), PathBuf::from("/drop/Complete"));
        assert_eq!(config.error_path(), PathBuf::from("/drop/Error"));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let config = PaygConfig {
            max_concurrent_jobs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_shared_subfolder() {
        let config = PaygConfig {
            error_dir: "Complete".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = PaygConfig::load_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.grace_period_ms, 4000);
    }

    #[test]
    fn load_from_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("payg.toml");
        std::fs::write(&path, "printer_name = \"Lobby\"\nmax_concurrent_jobs = 2\n").unwrap();
        let config = PaygConfig::load_from(&path).unwrap();
        assert_eq!(config.printer_name, "Lobby");
        assert_eq!(config.max_concurrent_jobs, 2);
    }
}
