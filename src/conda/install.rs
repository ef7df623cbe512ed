//! Package Manager Invocation
//!
//! Shells out to the conda-family binary (`mamba` preferred, `conda`
//! fallback) and to `pip`. Subprocess failures propagate the underlying
//! exit status so the tool can exit with it.

use std::path::PathBuf;
use std::process::Command;

use log::{debug, info};
use once_cell::sync::Lazy;
use thiserror::Error;

/// Errors raised while invoking package managers.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("neither mamba nor conda available on PATH")]
    NoCondaBinary,

    #[error("{0} not available on PATH")]
    MissingBinary(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code}")]
    CommandFailed { program: String, code: i32 },
}

impl InstallError {
    /// The exit status to propagate for this error, when one exists.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            InstallError::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Lazily-resolved conda-family binary, `mamba` preferred over `conda`.
pub static CONDA_BIN: Lazy<Option<PathBuf>> = Lazy::new(|| {
    for name in ["mamba", "conda"] {
        if let Ok(path) = which::which(name) {
            info!("Using conda binary: {}", path.display());
            return Some(path);
        }
    }
    None
});

/// Resolves the conda binary, erroring when none is on PATH.
pub fn conda_binary() -> Result<&'static PathBuf, InstallError> {
    CONDA_BIN.as_ref().ok_or(InstallError::NoCondaBinary)
}

/// Runs a command to completion, propagating a non-zero exit status.
pub(crate) fn run(mut cmd: Command) -> Result<(), InstallError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!("Running: {:?}", cmd);

    let status = cmd.status().map_err(|source| InstallError::Spawn {
        program: program.clone(),
        source,
    })?;

    if status.success() {
        Ok(())
    } else {
        // Signal-terminated processes carry no code
        Err(InstallError::CommandFailed {
            program,
            code: status.code().unwrap_or(-1),
        })
    }
}

/// Installs specifiers with the conda binary, forwarding extra arguments.
pub fn conda_install(specs: &[String], extra_args: &[String]) -> Result<(), InstallError> {
    let binary = conda_binary()?;
    let mut cmd = Command::new(binary);
    cmd.arg("install").args(extra_args).args(specs);
    run(cmd)
}

/// Installs specifiers with pip, forwarding extra arguments.
pub fn pip_install(specs: &[String], extra_args: &[String]) -> Result<(), InstallError> {
    let pip = which::which("pip").map_err(|_| InstallError::MissingBinary("pip".to_string()))?;
    let mut cmd = Command::new(pip);
    cmd.arg("install").args(extra_args).args(specs);
    run(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_propagates_exit_status() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 3");
        let err = run(cmd).unwrap_err();
        match err {
            InstallError::CommandFailed { ref program, code } => {
                assert_eq!(program, "sh");
                assert_eq!(code, 3);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.exit_code(), Some(3));
    }

    #[test]
    fn test_run_success() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("true");
        assert!(run(cmd).is_ok());
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let cmd = Command::new("/nonexistent/binary/pamba-test");
        let err = run(cmd).unwrap_err();
        assert!(matches!(err, InstallError::Spawn { .. }));
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_no_conda_binary_has_no_exit_code() {
        assert_eq!(InstallError::NoCondaBinary.exit_code(), None);
    }
}
