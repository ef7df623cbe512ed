//! PyPI → Conda Name Translation
//!
//! Conda channels publish a handful of well-known packages under names that
//! differ from their PyPI distribution names. Translation is a normalization
//! pass plus an override table: built-in entries for the common divergent
//! names, merged with an optional user map on disk.
//!
//! # Override Map Resolution
//!
//! The user map is a flat JSON object of pypi-name → conda-name. Its path is
//! resolved in the following order:
//! 1. `$PAMBA_NAME_MAP`
//! 2. `$XDG_CONFIG_HOME/pamba/name_map.json`
//! 3. `~/.config/pamba/name_map.json`

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::requirements::{normalize_name, Requirement};

/// Built-in overrides for PyPI names that differ on conda channels.
const BUILTIN_OVERRIDES: &[(&str, &str)] = &[
    ("torch", "pytorch"),
    ("tables", "pytables"),
    ("msgpack", "msgpack-python"),
    ("opencv-python", "opencv"),
    ("opencv-contrib-python", "opencv"),
    ("graphviz", "python-graphviz"),
    ("pyqt5", "pyqt"),
    ("apache-airflow", "airflow"),
    ("memory-profiler", "memory_profiler"),
];

/// Lazily-resolved path to the user override map.
pub static NAME_MAP_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(path) = std::env::var("PAMBA_NAME_MAP") {
        return PathBuf::from(path);
    }

    let config_home = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });

    config_home.join("pamba").join("name_map.json")
});

/// Mapping of normalized PyPI names to conda package names.
#[derive(Deserialize, Debug, Clone)]
#[serde(transparent)]
pub struct NameMap {
    map: HashMap<String, String>,
}

impl NameMap {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// The built-in override table.
    pub fn builtin() -> Self {
        let map = BUILTIN_OVERRIDES
            .iter()
            .map(|&(pypi, conda)| (pypi.to_string(), conda.to_string()))
            .collect();
        Self { map }
    }

    /// Loads the effective mapping: built-ins merged with the user map on
    /// disk, user entries winning.
    pub fn load() -> Self {
        let mut merged = Self::builtin();
        if NAME_MAP_PATH.exists() {
            let content = fs::read_to_string(&*NAME_MAP_PATH).unwrap_or_default();
            match serde_json::from_str::<Self>(&content) {
                Ok(user) => {
                    info!("Using name overrides from {}", NAME_MAP_PATH.display());
                    for (pypi, conda) in user.map {
                        merged.set(normalize_name(&pypi), conda);
                    }
                }
                Err(e) => warn!(
                    "Ignoring malformed name map {}: {}",
                    NAME_MAP_PATH.display(),
                    e
                ),
            }
        }
        merged
    }

    /// Gets the conda name for a normalized PyPI name.
    pub fn get(&self, pypi_name: &str) -> Option<&String> {
        self.map.get(pypi_name)
    }

    /// Sets an override.
    pub fn set(&mut self, pypi_name: impl Into<String>, conda_name: impl Into<String>) {
        self.map.insert(pypi_name.into(), conda_name.into());
    }
}

impl Default for NameMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Translates requirements to their conda equivalents.
///
/// Names are normalized, the override map is applied, and the `python`
/// requirement itself is dropped (the target environment already has one).
pub fn condafy_reqs(requires: Vec<Requirement>, names: &NameMap) -> Vec<Requirement> {
    requires
        .into_iter()
        .filter_map(|req| {
            let normalized = req.normalized_name();
            if normalized == "python" {
                debug!("Dropping the python requirement itself");
                return None;
            }
            match names.get(&normalized) {
                Some(conda_name) if *conda_name != normalized => {
                    debug!("Translating '{}' -> '{}'", req.name, conda_name);
                    Some(req.renamed(conda_name.clone()))
                }
                _ => {
                    // Keep extras: conda ignores them, but a pip fallback
                    // still needs them
                    let mut req = req;
                    req.name = normalized;
                    Some(req)
                }
            }
        })
        .collect()
}
