//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{LogFormat, OutputFormat};
use crate::criteria::client_certificate;

/// Compile client-certificate allow-lists into policy rules
#[derive(Parser, Debug)]
#[command(name = "certmatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "CERTMATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CERTMATCH_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format
    #[arg(long, value_enum, env = "CERTMATCH_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a policy document into rules
    ///
    /// A document whose top-level keys are all registered criterion names is
    /// compiled one rule per key. Any other document is compiled as a single
    /// instance of `--criterion`.
    Compile {
        /// Path to the policy document (YAML or JSON)
        #[arg(required = true)]
        file: PathBuf,

        /// Criterion to compile a bare document with
        #[arg(long, default_value = client_certificate::NAME)]
        criterion: String,

        /// Label attached to log events (defaults to the file name)
        #[arg(long)]
        label: Option<String>,

        /// Output format (overrides `compiler.output`)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Print the facts a rule would derive from a certificate
    Inspect {
        /// Path to a PEM or DER certificate
        #[arg(required = true)]
        cert: PathBuf,
    },

    /// List registered criteria
    Criteria,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compile_defaults_to_client_certificate() {
        let cli = Cli::try_parse_from(["certmatch", "compile", "policy.yaml"]).unwrap();
        let Command::Compile {
            criterion, format, ..
        } = cli.command
        else {
            panic!("expected compile");
        };
        assert_eq!(criterion, "client_certificate");
        assert_eq!(format, None);
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "certmatch",
            "inspect",
            "leaf.pem",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(matches!(cli.command, Command::Inspect { .. }));
    }

    #[test]
    fn format_flag_parses() {
        let cli =
            Cli::try_parse_from(["certmatch", "compile", "p.yaml", "-f", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Compile {
                format: Some(OutputFormat::Json),
                ..
            }
        ));
    }
}
