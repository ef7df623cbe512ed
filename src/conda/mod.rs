//! Conda Integration Module
//!
//! Name translation to conda channel equivalents, availability checks
//! against the package index, and package manager invocation.

pub mod api;
pub mod install;
pub mod map;

pub use api::{check_conda_availability, Partition, DEFAULT_CHANNELS};
pub use install::{conda_binary, conda_install, pip_install, InstallError, CONDA_BIN};
pub use map::{condafy_reqs, NameMap, NAME_MAP_PATH};
