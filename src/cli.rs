//! Install Command Orchestration
//!
//! Wires the pipeline together: collect requirements (from an editable
//! project and/or the command line), filter by environment markers,
//! translate names to conda equivalents, partition by channel
//! availability, then hand each side to its package manager.

use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use thiserror::Error;

use crate::conda::{
    self, check_conda_availability, condafy_reqs, InstallError, NameMap, Partition,
};
use crate::requirements::{self, EditableSpec, MarkerEnvironment, ProjectError, Requirement};

/// Errors raised by the install command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Install(#[from] InstallError),
}

impl CliError {
    /// The subprocess exit status to propagate, when one exists.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CliError::Install(e) => e.exit_code(),
            CliError::Project(_) => None,
        }
    }
}

/// Options for the install command.
#[derive(Debug, Default)]
pub struct InstallOptions {
    /// Local project to install editable, as `PATH` or `PATH[extras]`.
    pub editable: Option<String>,

    /// Free-form requirement specifiers from the command line.
    pub requirements: Vec<String>,

    /// Print the partition instead of installing.
    pub dry_run: bool,

    /// Channels to check availability against.
    pub channels: Vec<String>,

    /// Bound on concurrent availability lookups (0 means one per CPU).
    pub max_workers: usize,
}

impl InstallOptions {
    fn channels(&self) -> Vec<String> {
        if self.channels.is_empty() {
            conda::DEFAULT_CHANNELS
                .iter()
                .map(|c| c.to_string())
                .collect()
        } else {
            self.channels.clone()
        }
    }
}

/// Runs the install command. `conda_args` are flags the argument parser did
/// not recognize, forwarded verbatim to the conda invocation.
pub fn install(opts: &InstallOptions, conda_args: &[String]) -> Result<(), CliError> {
    let mut requires: Vec<String> = Vec::new();
    let mut extras: Vec<String> = Vec::new();
    let mut editable_path: Option<PathBuf> = None;

    if let Some(ref editable) = opts.editable {
        let spec = EditableSpec::parse(editable);
        let path = absolute_path(&spec.path);
        extras = spec.extras.clone();

        let pb = spinner(format!("Collecting requirements for {} ...", spec.name()));
        let collected = requirements::read_requirements(&path);
        pb.finish_and_clear();

        requires = collected?;
        editable_path = Some(path);
    }

    requires.extend(opts.requirements.iter().cloned());

    let pb = spinner("Converting requirements to conda ...".to_string());
    let env = MarkerEnvironment::detect();
    let cleaned = requirements::clean_requires(&requires, &extras, &env);
    let condafied = condafy_reqs(cleaned, &NameMap::load());
    pb.finish_and_clear();

    let pb = spinner("Checking conda availability ...".to_string());
    let partition = check_conda_availability(condafied, &opts.channels(), opts.max_workers);
    pb.finish_and_clear();

    if opts.dry_run {
        print_dry_run(&partition, editable_path.as_deref());
        return Ok(());
    }

    if !partition.conda.is_empty() {
        info!("Installing conda deps");
        conda::conda_install(&conda_specs(&partition), &conda_install_args(opts, conda_args))?;
    }

    if !partition.pip.is_empty() {
        info!("Installing remaining pip deps");
        conda::pip_install(&pip_specs(&partition), &[])?;
    }

    if let Some(path) = editable_path {
        info!("Installing {} in editable mode", path.display());
        conda::pip_install(
            &[path.display().to_string()],
            &["-e".to_string()],
        )?;
    }

    Ok(())
}

/// Arguments for the conda invocation: the configured channels, then the
/// flags forwarded from the command line. Availability was checked against
/// these channels, so the install must resolve against them too.
fn conda_install_args(opts: &InstallOptions, conda_args: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(opts.channels.len() * 2 + conda_args.len());
    for channel in &opts.channels {
        args.push("-c".to_string());
        args.push(channel.clone());
    }
    args.extend(conda_args.iter().cloned());
    args
}

/// Conda command-line specifiers for the conda side of a partition.
pub fn conda_specs(partition: &Partition) -> Vec<String> {
    partition.conda.iter().map(Requirement::conda_spec).collect()
}

/// Pip command-line specifiers for the pip side of a partition.
pub fn pip_specs(partition: &Partition) -> Vec<String> {
    partition.pip.iter().map(Requirement::pip_spec).collect()
}

fn print_dry_run(partition: &Partition, editable: Option<&std::path::Path>) {
    if !partition.conda.is_empty() {
        println!("{}", "Would install from conda:".green().bold());
        for spec in conda_specs(partition) {
            println!("  - {}", spec);
        }
    }
    if !partition.pip.is_empty() {
        println!("{}", "Would install from pip:".yellow().bold());
        for spec in pip_specs(partition) {
            println!("  - {}", spec);
        }
    }
    if let Some(path) = editable {
        println!(
            "{} {}",
            "Would install editable:".yellow().bold(),
            path.display()
        );
    }
    if partition.is_empty() && editable.is_none() {
        println!("Nothing to install");
    }
}

/// Expands a leading `~` against `$HOME` and makes the path absolute.
fn absolute_path(path: &std::path::Path) -> PathBuf {
    let expanded = match path.to_str().and_then(|s| s.strip_prefix("~/")) {
        Some(rest) => {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.yellow} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::Requirement;

    fn partition() -> Partition {
        Partition {
            conda: vec![
                Requirement::parse("numpy >=1.20").unwrap(),
                Requirement::parse("pytorch").unwrap(),
            ],
            pip: vec![Requirement::parse("some-pypi-only-pkg==0.1").unwrap()],
        }
    }

    #[test]
    fn test_conda_specs_use_spaced_constraints() {
        assert_eq!(conda_specs(&partition()), vec!["numpy >=1.20", "pytorch"]);
    }

    #[test]
    fn test_pip_specs_use_tight_constraints() {
        assert_eq!(pip_specs(&partition()), vec!["some-pypi-only-pkg==0.1"]);
    }

    #[test]
    fn test_default_channels_applied() {
        let opts = InstallOptions::default();
        assert_eq!(opts.channels(), vec!["conda-forge"]);

        let opts = InstallOptions {
            channels: vec!["bioconda".to_string()],
            ..Default::default()
        };
        assert_eq!(opts.channels(), vec!["bioconda"]);
    }

    #[test]
    fn test_user_channels_reach_conda_invocation() {
        let opts = InstallOptions {
            channels: vec!["bioconda".to_string(), "conda-forge".to_string()],
            ..Default::default()
        };
        let args = conda_install_args(&opts, &["-y".to_string()]);
        assert_eq!(args, vec!["-c", "bioconda", "-c", "conda-forge", "-y"]);
    }

    #[test]
    fn test_no_channels_means_only_forwarded_flags() {
        let opts = InstallOptions::default();
        let args = conda_install_args(&opts, &["--force-reinstall".to_string()]);
        assert_eq!(args, vec!["--force-reinstall"]);
    }

    #[test]
    fn test_absolute_path_expands_home() {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let path = absolute_path(std::path::Path::new("~/project"));
        assert!(path.starts_with(home));
        assert!(path.ends_with("project"));
    }

    #[test]
    fn test_absolute_path_keeps_absolute() {
        let path = absolute_path(std::path::Path::new("/opt/project"));
        assert_eq!(path, PathBuf::from("/opt/project"));
    }

    #[test]
    fn test_cli_error_exit_code_passthrough() {
        let err = CliError::Install(InstallError::CommandFailed {
            program: "mamba".to_string(),
            code: 2,
        });
        assert_eq!(err.exit_code(), Some(2));

        let err = CliError::Install(InstallError::NoCondaBinary);
        assert_eq!(err.exit_code(), None);
    }
}
