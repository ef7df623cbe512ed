//! Isolated Conda Environments
//!
//! Provisions a throwaway conda prefix with a pinned Python interpreter,
//! standing in for a virtual environment during build isolation. The prefix
//! lives in a temporary directory and is removed when the environment is
//! dropped, unless it is explicitly kept.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};
use tempfile::TempDir;
use thiserror::Error;

use crate::conda::install::{self, conda_binary, InstallError};

/// Errors raised while provisioning an isolated environment.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error(transparent)]
    Install(#[from] InstallError),

    #[error("failed to create environment directory: {0}")]
    TempDir(#[from] std::io::Error),

    #[error("could not determine a Python version for the environment")]
    NoPythonVersion,
}

/// Builder for isolated conda environments.
#[derive(Debug, Default)]
pub struct IsolatedEnvBuilder {
    python_version: Option<String>,
}

impl IsolatedEnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the Python version (e.g. `"3.11.4"`). When unset, the version of
    /// the interpreter on PATH is used.
    pub fn python_version(mut self, version: impl Into<String>) -> Self {
        self.python_version = Some(version.into());
        self
    }

    /// Creates the environment: a temporary prefix populated by
    /// `conda create -p <prefix> -y python==<version>`.
    pub fn create(self) -> Result<IsolatedCondaEnv, EnvError> {
        let version = match self.python_version {
            Some(version) => version,
            None => detect_python_version().ok_or(EnvError::NoPythonVersion)?,
        };

        let tempdir = tempfile::Builder::new().prefix("pamba-build-env-").tempdir()?;
        let prefix = tempdir.path().to_path_buf();

        info!(
            "Creating isolated environment at {} (python=={})",
            prefix.display(),
            version
        );

        let mut cmd = Command::new(conda_binary()?);
        cmd.arg("create")
            .arg("-p")
            .arg(&prefix)
            .arg("-y")
            .arg(format!("python=={}", version));
        install::run(cmd)?;

        Ok(IsolatedCondaEnv {
            prefix,
            tempdir: Some(tempdir),
        })
    }
}

/// A provisioned isolated conda environment.
#[derive(Debug)]
pub struct IsolatedCondaEnv {
    prefix: PathBuf,
    tempdir: Option<TempDir>,
}

impl IsolatedCondaEnv {
    /// Wraps an existing prefix without taking ownership of its lifetime.
    pub fn at_prefix(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            tempdir: None,
        }
    }

    /// The location of the isolated environment.
    pub fn path(&self) -> &Path {
        &self.prefix
    }

    /// The scripts directory of the environment.
    pub fn scripts_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.prefix.join("Scripts")
        } else {
            self.prefix.join("bin")
        }
    }

    /// The Python executable of the environment.
    pub fn python_executable(&self) -> PathBuf {
        if cfg!(windows) {
            self.prefix.join("python.exe")
        } else {
            self.scripts_dir().join("python")
        }
    }

    /// Installs requirement specifiers into the environment prefix.
    pub fn install(&self, specs: &[String]) -> Result<(), EnvError> {
        if specs.is_empty() {
            return Ok(());
        }

        let mut sorted = specs.to_vec();
        sorted.sort();
        info!(
            "Installing packages in isolated environment ({})",
            sorted.join(", ")
        );

        let mut cmd = Command::new(conda_binary()?);
        cmd.arg("install")
            .arg("-p")
            .arg(&self.prefix)
            .arg("-y")
            .args(specs);
        install::run(cmd)?;
        Ok(())
    }

    /// Keeps the prefix on disk instead of removing it on drop, returning
    /// its path.
    pub fn keep(mut self) -> PathBuf {
        if let Some(tempdir) = self.tempdir.take() {
            let path = tempdir.keep();
            debug!("Keeping isolated environment at {}", path.display());
            path
        } else {
            self.prefix.clone()
        }
    }
}

/// Queries the version of the Python interpreter on PATH.
fn detect_python_version() -> Option<String> {
    for python in ["python3", "python"] {
        if let Ok(output) = Command::new(python).arg("--version").output() {
            if output.status.success() {
                // "Python 3.11.4"
                let text = String::from_utf8_lossy(&output.stdout);
                let text = if text.trim().is_empty() {
                    String::from_utf8_lossy(&output.stderr)
                } else {
                    text
                };
                if let Some(version) = text.trim().strip_prefix("Python ") {
                    return Some(version.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_path_layout() {
        let env = IsolatedCondaEnv::at_prefix("/tmp/pamba-env");
        assert_eq!(env.path(), Path::new("/tmp/pamba-env"));
        if cfg!(windows) {
            assert_eq!(env.scripts_dir(), PathBuf::from("/tmp/pamba-env/Scripts"));
            assert_eq!(
                env.python_executable(),
                PathBuf::from("/tmp/pamba-env/python.exe")
            );
        } else {
            assert_eq!(env.scripts_dir(), PathBuf::from("/tmp/pamba-env/bin"));
            assert_eq!(
                env.python_executable(),
                PathBuf::from("/tmp/pamba-env/bin/python")
            );
        }
    }

    #[test]
    fn test_install_empty_specs_is_noop() {
        // Must not touch the conda binary at all
        let env = IsolatedCondaEnv::at_prefix("/nonexistent/prefix");
        assert!(env.install(&[]).is_ok());
    }

    #[test]
    fn test_keep_on_borrowed_prefix_returns_path() {
        let env = IsolatedCondaEnv::at_prefix("/tmp/pamba-env");
        assert_eq!(env.keep(), PathBuf::from("/tmp/pamba-env"));
    }

    #[test]
    fn test_builder_records_python_version() {
        let builder = IsolatedEnvBuilder::new().python_version("3.12.1");
        assert_eq!(builder.python_version.as_deref(), Some("3.12.1"));
    }
}
