//! Isolated Build Environments
//!
//! Conda-backed replacement for virtual environments during build
//! isolation.

pub mod isolated;

pub use isolated::{EnvError, IsolatedCondaEnv, IsolatedEnvBuilder};
