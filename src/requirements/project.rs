//! Project Metadata Loading
//!
//! Collects dependency specifiers from a local project's `pyproject.toml`.
//! Only static `[project]` metadata is read; invoking a Python build backend
//! to compute dynamic dependencies is out of scope, matching the behavior of
//! declaring such projects unsupported.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while reading project metadata.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("path doesn't exist: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("no pyproject.toml found in {}; only pyproject.toml projects are supported", .0.display())]
    NoPyproject(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{} declares dynamic dependencies; static [project] metadata is required", .0.display())]
    DynamicDependencies(PathBuf),

    #[error("pyproject.toml in {} has no [project] table", .0.display())]
    NoProjectTable(PathBuf),
}

#[derive(Deserialize, Debug)]
struct PyProject {
    project: Option<ProjectTable>,
}

#[derive(Deserialize, Debug)]
struct ProjectTable {
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default, rename = "optional-dependencies")]
    optional_dependencies: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    dynamic: Vec<String>,
}

/// Reads the dependency specifiers of the project at `srcdir`.
///
/// Optional dependencies are folded in with an `extra == "<name>"` marker,
/// and-combined with any marker the specifier already carries, so the usual
/// marker filtering decides whether they apply.
pub fn read_requirements(srcdir: &Path) -> Result<Vec<String>, ProjectError> {
    if !srcdir.exists() {
        return Err(ProjectError::MissingPath(srcdir.to_path_buf()));
    }

    let pyproject_path = srcdir.join("pyproject.toml");
    if !pyproject_path.exists() {
        return Err(ProjectError::NoPyproject(srcdir.to_path_buf()));
    }

    let content = fs::read_to_string(&pyproject_path).map_err(|source| ProjectError::Read {
        path: pyproject_path.clone(),
        source,
    })?;
    let pyproject: PyProject =
        toml::from_str(&content).map_err(|source| ProjectError::Parse {
            path: pyproject_path.clone(),
            source,
        })?;

    let project = pyproject
        .project
        .ok_or_else(|| ProjectError::NoProjectTable(srcdir.to_path_buf()))?;

    if project.dynamic.iter().any(|d| d == "dependencies") {
        return Err(ProjectError::DynamicDependencies(pyproject_path));
    }

    let mut requires = project.dependencies;
    for (extra, specifiers) in &project.optional_dependencies {
        for specifier in specifiers {
            requires.push(with_extra_marker(specifier, extra));
        }
    }

    debug!(
        "Collected {} requirement(s) from {}",
        requires.len(),
        pyproject_path.display()
    );
    Ok(requires)
}

/// Attaches an `extra == "<name>"` marker to a specifier line.
fn with_extra_marker(specifier: &str, extra: &str) -> String {
    match specifier.split_once(';') {
        Some((dep, marker)) => format!(
            "{} ; ({}) and extra == \"{}\"",
            dep.trim(),
            marker.trim(),
            extra
        ),
        None => format!("{} ; extra == \"{}\"", specifier.trim(), extra),
    }
}

/// A local project path with optional requested extras, as written on the
/// command line: `path/to/project[test,docs]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableSpec {
    pub path: PathBuf,
    pub extras: Vec<String>,
}

impl EditableSpec {
    /// Parses an editable install argument.
    pub fn parse(arg: &str) -> Self {
        let (path, extras) = match arg.split_once('[') {
            Some((path, rest)) => {
                let extras = rest
                    .trim_end_matches(']')
                    .split(',')
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .collect();
                (path, extras)
            }
            None => (arg, Vec::new()),
        };
        Self {
            path: PathBuf::from(path),
            extras,
        }
    }

    /// The project directory name, for display.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project_with(pyproject: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pyproject.toml"), pyproject).unwrap();
        dir
    }

    #[test]
    fn test_read_static_dependencies() {
        let dir = project_with(
            r#"
[project]
name = "demo"
dependencies = ["numpy>=1.20", "requests"]
"#,
        );
        let requires = read_requirements(dir.path()).unwrap();
        assert_eq!(requires, vec!["numpy>=1.20", "requests"]);
    }

    #[test]
    fn test_optional_dependencies_gain_extra_marker() {
        let dir = project_with(
            r#"
[project]
name = "demo"
dependencies = ["numpy"]

[project.optional-dependencies]
test = ["pytest>=7"]
"#,
        );
        let requires = read_requirements(dir.path()).unwrap();
        assert_eq!(
            requires,
            vec!["numpy", "pytest>=7 ; extra == \"test\""]
        );
    }

    #[test]
    fn test_optional_dependency_existing_marker_is_combined() {
        let dir = project_with(
            r#"
[project]
name = "demo"

[project.optional-dependencies]
win = ["colorama ; sys_platform == 'win32'"]
"#,
        );
        let requires = read_requirements(dir.path()).unwrap();
        assert_eq!(
            requires,
            vec!["colorama ; (sys_platform == 'win32') and extra == \"win\""]
        );
    }

    #[test]
    fn test_dynamic_dependencies_rejected() {
        let dir = project_with(
            r#"
[project]
name = "demo"
dynamic = ["dependencies"]
"#,
        );
        assert!(matches!(
            read_requirements(dir.path()),
            Err(ProjectError::DynamicDependencies(_))
        ));
    }

    #[test]
    fn test_missing_pyproject_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_requirements(dir.path()),
            Err(ProjectError::NoPyproject(_))
        ));
    }

    #[test]
    fn test_missing_path_rejected() {
        assert!(matches!(
            read_requirements(Path::new("/nonexistent/project/path")),
            Err(ProjectError::MissingPath(_))
        ));
    }

    #[test]
    fn test_editable_spec_parse() {
        let spec = EditableSpec::parse("~/code/demo[test, docs]");
        assert_eq!(spec.path, PathBuf::from("~/code/demo"));
        assert_eq!(spec.extras, vec!["test", "docs"]);

        let plain = EditableSpec::parse("./demo");
        assert_eq!(plain.path, PathBuf::from("./demo"));
        assert!(plain.extras.is_empty());
        assert_eq!(plain.name(), "demo");
    }
}
