//! Conda Channel Availability Checks
//!
//! Queries the anaconda.org package index to decide which requirements can
//! be installed from conda channels and which must fall back to pip.
//!
//! Lookups are independent GETs issued from a bounded pool of worker
//! threads pulling from a shared queue; all lookups complete before the
//! partition is produced. A requirement counts as available on the first
//! channel that knows it. There is no retry or backoff: a network failure
//! is logged and the requirement falls back to pip.

use std::collections::VecDeque;
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::Client;
use serde_json::Value;

use crate::requirements::Requirement;

/// Channels searched when none are configured.
pub const DEFAULT_CHANNELS: &[&str] = &["conda-forge"];

/// Base URL of the package index API.
const API_BASE_URL: &str = "https://api.anaconda.org/package";

/// Per-request timeout for index lookups.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of partitioning requirements by conda availability.
///
/// Input order is preserved within each side.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Requirements available on at least one channel.
    pub conda: Vec<Requirement>,
    /// Requirements no channel knows about.
    pub pip: Vec<Requirement>,
}

impl Partition {
    pub fn is_empty(&self) -> bool {
        self.conda.is_empty() && self.pip.is_empty()
    }
}

/// Checks which requirements are available on the given channels.
///
/// `max_workers` bounds the lookup thread pool; it is additionally capped by
/// the number of requirements. Zero workers means "one per CPU".
pub fn check_conda_availability(
    requires: Vec<Requirement>,
    channels: &[String],
    max_workers: usize,
) -> Partition {
    if requires.is_empty() {
        return Partition::default();
    }

    let client = match Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("pamba/", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("Could not build HTTP client, falling back to pip for everything: {}", e);
            return Partition {
                conda: Vec::new(),
                pip: requires,
            };
        }
    };

    let workers = if max_workers == 0 {
        num_cpus::get()
    } else {
        max_workers
    }
    .min(requires.len());

    let queue: Arc<Mutex<VecDeque<(usize, String)>>> = Arc::new(Mutex::new(
        requires
            .iter()
            .enumerate()
            .map(|(idx, req)| (idx, req.normalized_name()))
            .collect(),
    ));

    let (tx, rx) = channel::<(usize, bool)>();
    let channels: Arc<Vec<String>> = Arc::new(channels.to_vec());

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let channels = Arc::clone(&channels);
        let client = client.clone();
        let tx = tx.clone();

        handles.push(thread::spawn(move || {
            loop {
                let job = queue.lock().ok().and_then(|mut q| q.pop_front());
                let Some((idx, name)) = job else {
                    break;
                };
                let available = probe_channels(&client, &name, &channels);
                if tx.send((idx, available)).is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    // Barrier join: collect every lookup before partitioning
    let mut available = vec![false; requires.len()];
    for (idx, hit) in rx {
        available[idx] = hit;
    }
    for handle in handles {
        if handle.join().is_err() {
            warn!("Availability worker panicked");
        }
    }

    let mut partition = Partition::default();
    for (req, hit) in requires.into_iter().zip(available) {
        if hit {
            partition.conda.push(req);
        } else {
            partition.pip.push(req);
        }
    }
    partition
}

/// Probes the channels for a package name, stopping at the first hit.
fn probe_channels(client: &Client, name: &str, channels: &[String]) -> bool {
    for channel in channels {
        let url = format!("{}/{}/{}", API_BASE_URL, channel, name);
        match client.get(&url).send() {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>() {
                    Ok(body) if package_found(&body) => {
                        debug!("'{}' available on channel '{}'", name, channel);
                        return true;
                    }
                    Ok(_) => debug!("'{}' not on channel '{}'", name, channel),
                    Err(e) => warn!("Malformed index response for '{}': {}", name, e),
                }
            }
            Ok(response) => {
                debug!(
                    "'{}' not on channel '{}' ({})",
                    name,
                    channel,
                    response.status()
                );
            }
            Err(e) => {
                // Treated as unavailable, but surfaced: a transient outage
                // should be visible in the log, not mistaken for a missing
                // package silently.
                warn!("Index lookup failed for '{}' on '{}': {}", name, channel, e);
            }
        }
    }
    false
}

/// Interprets an index API response body: a JSON object without an `error`
/// key describes a known package.
fn package_found(body: &Value) -> bool {
    match body {
        Value::Object(fields) => !fields.contains_key("error"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_package_found_on_plain_object() {
        let body = json!({"name": "numpy", "versions": ["1.26.0"]});
        assert!(package_found(&body));
    }

    #[test]
    fn test_error_body_means_missing() {
        let body = json!({"error": "404 Not Found"});
        assert!(!package_found(&body));
    }

    #[test]
    fn test_non_object_body_means_missing() {
        assert!(!package_found(&json!("nope")));
        assert!(!package_found(&json!(null)));
        assert!(!package_found(&json!([1, 2])));
    }

    #[test]
    fn test_empty_input_skips_lookups() {
        let partition =
            check_conda_availability(Vec::new(), &["conda-forge".to_string()], 4);
        assert!(partition.is_empty());
    }

    #[test]
    fn test_partition_default_is_empty() {
        let partition = Partition::default();
        assert!(partition.is_empty());
        assert!(partition.conda.is_empty());
        assert!(partition.pip.is_empty());
    }
}
