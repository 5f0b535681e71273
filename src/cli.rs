use crate::audit::{AuditAction, AuditEvent};
use crate::commands::{
    conclude, render_failure, render_pass, render_sealed, run_check_registry, run_enforce,
    run_show_registry, run_update_seal,
};
use crate::config::{load_config, ConfigOverrides};
use crate::content_hasher::DirectoryHashMode;
use crate::errors::{ExitStatus, SealError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI interface for the runtime seal gate
#[derive(Parser, Debug)]
#[command(
    name = "runtime-seal",
    version,
    about = "Tamper-evidence gate for runtime module composition"
)]
pub struct Cli {
    /// Repository root all configured paths resolve against
    #[arg(long, global = true)]
    pub repo_root: Option<PathBuf>,

    /// Configuration file (default: <repo-root>/runtime_seal.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full check: canonical order, module hashes and the sealed registry hash
    Enforce {
        /// Seal document to compare against
        #[arg(long)]
        seal: Option<PathBuf>,
    },

    /// Ordering and completeness only; the seal is not read
    CheckRegistry,

    /// Rebuild the seal and replace the persisted baseline
    UpdateSeal {
        #[arg(long)]
        seal: Option<PathBuf>,
        #[arg(long, value_enum)]
        directory_hash_mode: Option<DirectoryHashMode>,
    },

    /// Print the freshly composed registry as JSON
    ShowRegistry,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let (seal_path, directory_hash_mode) = match &self.command {
            Commands::Enforce { seal } => (seal.clone(), None),
            Commands::UpdateSeal {
                seal,
                directory_hash_mode,
            } => (seal.clone(), *directory_hash_mode),
            Commands::CheckRegistry | Commands::ShowRegistry => (None, None),
        };
        ConfigOverrides {
            repo_root: self.repo_root.clone(),
            seal_path,
            directory_hash_mode,
            config_file: self.config.clone(),
        }
    }

    fn action(&self) -> AuditAction {
        match self.command {
            Commands::Enforce { .. } => AuditAction::Enforce,
            Commands::CheckRegistry => AuditAction::CheckRegistry,
            Commands::UpdateSeal { .. } => AuditAction::UpdateSeal,
            Commands::ShowRegistry => AuditAction::ShowRegistry,
        }
    }
}

/// Run the selected command. Pass output goes to stdout, diagnostics to stderr.
pub fn dispatch(cli: Cli) -> ExitStatus {
    let action = cli.action();
    let config = match load_config(&cli.overrides()) {
        Ok(config) => config,
        Err(err) => return fail(action, &err),
    };

    match cli.command {
        Commands::Enforce { .. } | Commands::CheckRegistry => {
            let result = if action == AuditAction::Enforce {
                run_enforce(&config)
            } else {
                run_check_registry(&config)
            };
            match &result {
                Ok(report) => {
                    AuditEvent::gate_passed(action, report).emit();
                    print_lines(&render_pass(action, report));
                }
                Err(err) => print_failure(err),
            }
            conclude(action, &result)
        }
        Commands::UpdateSeal { .. } => {
            let result = run_update_seal(&config);
            match &result {
                Ok(doc) => {
                    AuditEvent::resealed(doc).emit();
                    print_lines(&render_sealed(doc));
                }
                Err(err) => print_failure(err),
            }
            conclude(action, &result)
        }
        Commands::ShowRegistry => {
            let result = run_show_registry(&config).and_then(|registry| {
                serde_json::to_string_pretty(&registry)
                    .map_err(|e| SealError::serialization("rendering registry", e))
            });
            match &result {
                Ok(json) => println!("{json}"),
                Err(err) => print_failure(err),
            }
            conclude(action, &result)
        }
    }
}

fn fail(action: AuditAction, err: &SealError) -> ExitStatus {
    print_failure(err);
    AuditEvent::gate_failed(action, err).emit();
    err.exit_status()
}

fn print_failure(err: &SealError) {
    for line in render_failure(err) {
        eprintln!("{line}");
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
