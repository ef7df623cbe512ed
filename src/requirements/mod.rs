//! Requirement Resolution Module
//!
//! Parses PEP 508-style requirement specifiers, loads them from project
//! metadata, and filters them by environment markers.

pub mod marker;
pub mod model;
pub mod project;

pub use marker::{MarkerEnvironment, MarkerError};
pub use model::{normalize_name, Requirement, RequirementError};
pub use project::{read_requirements, EditableSpec, ProjectError};

use log::{debug, warn};

/// Filters requirement lines by their environment markers.
///
/// - Lines without a marker are kept.
/// - Lines whose marker references `extra` are kept when the marker holds
///   for any of the requested extras.
/// - Other markers are evaluated once against the plain environment.
///
/// Lines that fail to parse are dropped with a warning rather than aborting
/// the whole resolution.
pub fn clean_requires(
    requires: &[String],
    extras: &[String],
    env: &MarkerEnvironment,
) -> Vec<Requirement> {
    let mut kept = Vec::new();

    for line in requires {
        let req = match Requirement::parse(line) {
            Ok(req) => req,
            Err(e) => {
                warn!("Skipping unparseable requirement '{}': {}", line, e);
                continue;
            }
        };

        let Some(ref marker_text) = req.marker else {
            kept.push(req);
            continue;
        };

        let applies = if marker::references_extra(marker_text) {
            extras.iter().any(|extra| {
                marker::evaluate(marker_text, &env.with_extra(extra)).unwrap_or_else(|e| {
                    warn!("Skipping requirement '{}': {}", line, e);
                    false
                })
            })
        } else {
            marker::evaluate(marker_text, env).unwrap_or_else(|e| {
                warn!("Skipping requirement '{}': {}", line, e);
                false
            })
        };

        if applies {
            kept.push(req);
        } else {
            debug!("Marker excluded requirement '{}'", line);
        }
    }

    kept
}
