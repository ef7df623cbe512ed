//! pamba CLI Entry Point
//!
//! # Usage
//!
//! ```bash
//! # Install requirements, preferring conda
//! pamba install numpy "requests>=2.28"
//!
//! # Resolve a local project's metadata and install it editable
//! pamba install -e path/to/project[test]
//!
//! # Preview the partition without installing
//! pamba install --dry-run numpy torch
//!
//! # Check and install against a specific channel
//! pamba install -c bioconda samtools
//!
//! # Unrecognized flags are forwarded to the conda invocation
//! pamba install --force-reinstall numpy
//! ```

use std::env;
use std::process::ExitCode;

use log::error;

use pamba::cli::{self, InstallOptions};
use pamba::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    install: InstallOptions,
    conda_args: Vec<String>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: pamba install [OPTIONS] <REQUIREMENT>...");
    println!();
    println!("Installs pip requirements from conda where possible, pip for the rest.");
    println!();
    println!("Arguments:");
    println!("  <REQUIREMENT>...       Requirement specifiers (PEP 508 style)");
    println!();
    println!("Options:");
    println!("  -e, --editable PATH    Local project to resolve and install editable,");
    println!("                         optionally with extras: path/to/proj[test,docs]");
    println!("  -n, --dry-run          Print what would be installed, install nothing");
    println!("  -c, --channel NAME     Conda channel to check and install from");
    println!("                         (repeatable, default: conda-forge)");
    println!("  --workers N            Bound on concurrent availability lookups");
    println!("  -v, --verbose          Enable debug logging");
    println!("  --help                 Show this help message");
    println!("  --version              Show version information");
    println!();
    println!("Any other flag is forwarded verbatim to the conda install command.");
    println!();
    println!("Examples:");
    println!("  pamba install numpy \"requests>=2.28\"");
    println!("  pamba install -e ./myproject[test] --dry-run");
}

/// Parses command-line arguments. Flags pamba doesn't recognize are
/// collected for forwarding to the conda binary, mirroring argparse's
/// `parse_known_args`.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut saw_install = false;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "install" if !saw_install => {
                saw_install = true;
            }
            "-e" | "--editable" => {
                i += 1;
                if i >= args.len() {
                    return Err("--editable requires a path argument".to_string());
                }
                config.install.editable = Some(args[i].clone());
            }
            "-n" | "--dry-run" => {
                config.install.dry_run = true;
            }
            "-c" | "--channel" => {
                i += 1;
                if i >= args.len() {
                    return Err("--channel requires a name argument".to_string());
                }
                config.install.channels.push(args[i].clone());
            }
            "--workers" => {
                i += 1;
                if i >= args.len() {
                    return Err("--workers requires a number argument".to_string());
                }
                config.install.max_workers = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid workers value: {}", args[i]))?;
            }
            "-v" | "--verbose" => {
                config.verbose = true;
            }
            arg if arg.starts_with('-') => {
                // Unknown flag: forward to the conda invocation
                config.conda_args.push(arg.to_string());
            }
            _ => {
                config.install.requirements.push(arg.clone());
            }
        }
        i += 1;
    }

    if !saw_install {
        return Err("missing subcommand: expected 'install'".to_string());
    }

    Ok(config)
}

/// Main application entry point.
fn run() -> Result<(), cli::CliError> {
    let args: Vec<String> = env::args().collect();

    let config = match parse_arguments(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    setup_logging(config.verbose);

    cli::install(&config.install, &config.conda_args)
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            match e.exit_code() {
                // Propagate the failing package manager's status
                Some(code) => ExitCode::from(code.clamp(1, 255) as u8),
                None => ExitCode::FAILURE,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        std::iter::once("pamba")
            .chain(raw.iter().copied())
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_parse_basic_install() {
        let config = parse_arguments(&args(&["install", "numpy", "requests>=2"])).unwrap();
        assert_eq!(config.install.requirements, vec!["numpy", "requests>=2"]);
        assert!(!config.install.dry_run);
        assert!(config.conda_args.is_empty());
    }

    #[test]
    fn test_parse_editable_and_dry_run() {
        let config =
            parse_arguments(&args(&["install", "-e", "./proj[test]", "-n"])).unwrap();
        assert_eq!(config.install.editable.as_deref(), Some("./proj[test]"));
        assert!(config.install.dry_run);
    }

    #[test]
    fn test_unknown_flags_forwarded_to_conda() {
        let config = parse_arguments(&args(&[
            "install", "--force-reinstall", "-y", "numpy",
        ]))
        .unwrap();
        assert_eq!(config.conda_args, vec!["--force-reinstall", "-y"]);
        assert_eq!(config.install.requirements, vec!["numpy"]);
    }

    #[test]
    fn test_channels_accumulate() {
        let config = parse_arguments(&args(&[
            "install", "-c", "bioconda", "--channel", "conda-forge", "samtools",
        ]))
        .unwrap();
        assert_eq!(config.install.channels, vec!["bioconda", "conda-forge"]);
    }

    #[test]
    fn test_workers_parse() {
        let config = parse_arguments(&args(&["install", "--workers", "8", "numpy"])).unwrap();
        assert_eq!(config.install.max_workers, 8);

        assert!(parse_arguments(&args(&["install", "--workers", "lots"])).is_err());
        assert!(parse_arguments(&args(&["install", "--workers"])).is_err());
    }

    #[test]
    fn test_missing_subcommand_rejected() {
        assert!(parse_arguments(&args(&["numpy"])).is_err());
        assert!(parse_arguments(&args(&[])).is_err());
    }

    #[test]
    fn test_editable_requires_value() {
        assert!(parse_arguments(&args(&["install", "-e"])).is_err());
    }
}
