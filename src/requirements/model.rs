//! Requirement Data Model
//!
//! A parsed PEP 508-style requirement specifier: package name, optional
//! extras, optional version constraint text, optional environment marker.
//!
//! ```text
//! requests[security,socks]>=2.8.1,!=2.9.* ; python_version < "2.7"
//! ^name    ^extras         ^constraint      ^marker
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing a requirement specifier line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequirementError {
    #[error("empty requirement specifier")]
    Empty,

    #[error("requirement '{0}' has an unterminated extras list")]
    UnterminatedExtras(String),
}

/// A single dependency requirement.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Package name as written (not normalized).
    pub name: String,

    /// Extras requested from the package (`name[extra1,extra2]`).
    #[serde(default)]
    pub extras: Vec<String>,

    /// Version constraint text, e.g. `>=2.8.1,<3`. Empty when unconstrained.
    #[serde(default)]
    pub constraint: String,

    /// Environment marker text (the part after `;`), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl Requirement {
    /// Creates an unconstrained requirement on a package.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extras: Vec::new(),
            constraint: String::new(),
            marker: None,
        }
    }

    /// Parses a requirement specifier line.
    pub fn parse(line: &str) -> Result<Self, RequirementError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(RequirementError::Empty);
        }

        // Marker is everything after the first ';'
        let (spec, marker) = match line.split_once(';') {
            Some((spec, marker)) => (spec.trim(), Some(marker.trim().to_string())),
            None => (line, None),
        };

        // Name runs up to the first extras bracket, constraint char, or space
        let name_end = spec
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
            .unwrap_or(spec.len());
        let name = spec[..name_end].to_string();
        if name.is_empty() {
            return Err(RequirementError::Empty);
        }
        let mut rest = spec[name_end..].trim_start();

        let mut extras = Vec::new();
        if let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped
                .find(']')
                .ok_or_else(|| RequirementError::UnterminatedExtras(line.to_string()))?;
            extras = stripped[..close]
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            rest = stripped[close + 1..].trim_start();
        }

        Ok(Self {
            name,
            extras,
            constraint: rest.replace(' ', ""),
            marker: marker.filter(|m| !m.is_empty()),
        })
    }

    /// Package name normalized per PEP 503: runs of `-`, `_`, `.` collapse
    /// to a single `-`, lowercased.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Specifier string for a conda install command line, e.g. `numpy >=1.20`.
    pub fn conda_spec(&self) -> String {
        if self.constraint.is_empty() {
            self.normalized_name()
        } else {
            format!("{} {}", self.normalized_name(), self.constraint)
        }
    }

    /// Specifier string for a pip install command line, e.g. `numpy>=1.20`.
    pub fn pip_spec(&self) -> String {
        if self.extras.is_empty() {
            format!("{}{}", self.name, self.constraint)
        } else {
            format!("{}[{}]{}", self.name, self.extras.join(","), self.constraint)
        }
    }

    /// Returns this requirement under a different package name, keeping the
    /// constraint and dropping extras (conda packages carry no extras).
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extras: Vec::new(),
            constraint: self.constraint.clone(),
            marker: self.marker.clone(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if !self.constraint.is_empty() {
            write!(f, "{}", self.constraint)?;
        }
        if let Some(ref marker) = self.marker {
            write!(f, " ; {}", marker)?;
        }
        Ok(())
    }
}

/// Normalizes a package name per PEP 503.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for c in name.chars() {
        if c == '-' || c == '_' || c == '.' {
            if !last_was_sep && !normalized.is_empty() {
                normalized.push('-');
            }
            last_was_sep = true;
        } else {
            normalized.extend(c.to_lowercase());
            last_was_sep = false;
        }
    }
    if normalized.ends_with('-') {
        normalized.pop();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let req = Requirement::parse("numpy").unwrap();
        assert_eq!(req.name, "numpy");
        assert!(req.extras.is_empty());
        assert!(req.constraint.is_empty());
        assert!(req.marker.is_none());
    }

    #[test]
    fn test_parse_with_constraint() {
        let req = Requirement::parse("requests >=2.8.1, <3").unwrap();
        assert_eq!(req.name, "requests");
        assert_eq!(req.constraint, ">=2.8.1,<3");
    }

    #[test]
    fn test_parse_with_extras_and_marker() {
        let req =
            Requirement::parse("requests[security,socks]>=2.8.1 ; python_version < '2.7'").unwrap();
        assert_eq!(req.name, "requests");
        assert_eq!(req.extras, vec!["security", "socks"]);
        assert_eq!(req.constraint, ">=2.8.1");
        assert_eq!(req.marker.as_deref(), Some("python_version < '2.7'"));
    }

    #[test]
    fn test_parse_marker_only() {
        let req = Requirement::parse("colorama ; sys_platform == 'win32'").unwrap();
        assert_eq!(req.name, "colorama");
        assert!(req.constraint.is_empty());
        assert_eq!(req.marker.as_deref(), Some("sys_platform == 'win32'"));
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert_eq!(Requirement::parse("   "), Err(RequirementError::Empty));
        assert_eq!(
            Requirement::parse(">=1.0"),
            Err(RequirementError::Empty)
        );
    }

    #[test]
    fn test_parse_unterminated_extras() {
        assert!(matches!(
            Requirement::parse("requests[security"),
            Err(RequirementError::UnterminatedExtras(_))
        ));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Django"), "django");
        assert_eq!(normalize_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_name("ruamel__yaml"), "ruamel-yaml");
        assert_eq!(normalize_name("typing_extensions"), "typing-extensions");
    }

    #[test]
    fn test_conda_and_pip_specs() {
        let req = Requirement::parse("Typing_Extensions>=4.0").unwrap();
        assert_eq!(req.conda_spec(), "typing-extensions >=4.0");
        assert_eq!(req.pip_spec(), "Typing_Extensions>=4.0");

        let bare = Requirement::new("numpy");
        assert_eq!(bare.conda_spec(), "numpy");
        assert_eq!(bare.pip_spec(), "numpy");
    }

    #[test]
    fn test_pip_spec_keeps_extras() {
        let req = Requirement::parse("uvicorn[standard]>=0.20").unwrap();
        assert_eq!(req.pip_spec(), "uvicorn[standard]>=0.20");
    }

    #[test]
    fn test_renamed_drops_extras() {
        let req = Requirement::parse("torch[cuda]>=2.0").unwrap();
        let renamed = req.renamed("pytorch");
        assert_eq!(renamed.name, "pytorch");
        assert!(renamed.extras.is_empty());
        assert_eq!(renamed.constraint, ">=2.0");
    }

    #[test]
    fn test_display_round_trip() {
        let req = Requirement::parse("requests[socks]>=2.8 ; os_name == 'posix'").unwrap();
        assert_eq!(req.to_string(), "requests[socks]>=2.8 ; os_name == 'posix'");
    }
}
