//! pamba - Install pip requirements from conda
//!
//! Resolves a project's Python dependency specifiers (or a free-form
//! requirement list), translates each name to its conda channel
//! equivalent, checks availability against the anaconda.org package index,
//! installs what conda knows about via `mamba`/`conda`, and falls back to
//! `pip` for the rest.
//!
//! # Architecture
//!
//! The library is organized into three main modules:
//!
//! - [`requirements`]: Specifier parsing, project metadata loading, and
//!   environment marker evaluation
//! - [`conda`]: Name translation, index availability checks, and package
//!   manager invocation
//! - [`env`]: Conda-backed isolated environments for build isolation
//!
//! # Example
//!
//! ```rust,no_run
//! use pamba::conda::{check_conda_availability, condafy_reqs, NameMap};
//! use pamba::requirements::{clean_requires, MarkerEnvironment};
//!
//! fn main() {
//!     let raw = vec!["numpy>=1.20".to_string(), "torch".to_string()];
//!     let env = MarkerEnvironment::detect();
//!     let cleaned = clean_requires(&raw, &[], &env);
//!     let condafied = condafy_reqs(cleaned, &NameMap::load());
//!     let partition =
//!         check_conda_availability(condafied, &["conda-forge".to_string()], 0);
//!     println!(
//!         "{} from conda, {} from pip",
//!         partition.conda.len(),
//!         partition.pip.len()
//!     );
//! }
//! ```

pub mod cli;
pub mod conda;
pub mod env;
pub mod requirements;

// Re-export commonly used types
pub use cli::{install, CliError, InstallOptions};
pub use conda::{check_conda_availability, condafy_reqs, NameMap, Partition};
pub use env::{IsolatedCondaEnv, IsolatedEnvBuilder};
pub use requirements::{clean_requires, MarkerEnvironment, Requirement};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "pamba";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "pamba");
    }

    #[test]
    fn test_module_exports_requirement() {
        let req = Requirement::parse("numpy>=1.20").unwrap();
        assert_eq!(req.name, "numpy");
        assert_eq!(req.constraint, ">=1.20");
    }

    #[test]
    fn test_module_exports_partition() {
        let partition = Partition::default();
        assert!(partition.is_empty());
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
