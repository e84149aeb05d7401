//! Interface de linha de comando do PAYG baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (watch, process, status)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// PAYG (Print As You Go): monitora uma pasta, imprime e notifica o remetente.
#[derive(Debug, Parser)]
#[command(name = "payg", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./payg.toml).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Monitora a pasta configurada até receber Ctrl-C.
    Watch,

    /// Processa um único documento imediatamente, sem período de espera.
    Process {
        /// Caminho do documento; o arquivo de metadados deve estar ao lado.
        payload: PathBuf,
    },

    /// Mostra quantos documentos estão pendentes, concluídos e com erro.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_watch_subcommand() {
        let cli = Cli::parse_from(["payg", "watch"]);
        assert!(matches!(cli.command, Command::Watch));
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn cli_parses_process_subcommand() {
        let cli = Cli::parse_from(["payg", "process", "/drop/report.pdf"]);
        match cli.command {
            Command::Process { payload } => {
                assert_eq!(payload, PathBuf::from("/drop/report.pdf"));
            }
            _ => panic!("expected Process command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["payg", "--config", "/etc/payg.toml", "--verbose", "status"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/payg.toml")));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
