//! The canonical Argo CD application descriptor.
//!
//! An [`Application`] is what remains of an `argoproj.io/v1alpha1`
//! `Application` document once labels, annotations and werf plugin variables
//! have been merged. It is everything the pipeline needs to clone, render and
//! place one sub-application.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fully resolved sub-application.
///
/// # Invariants
///
/// - `repo_url` is never empty.
/// - `values_files` is ordered by the numeric suffix of the `WERF_VALUES_<n>`
///   variables they came from; helm applies them in this order.
/// - `setters` carries the resolved instance/env under the global override
///   keys whenever they are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub instance: String,
    pub env: String,
    pub repo_url: String,
    pub path: String,
    pub target_revision: String,
    pub setters: BTreeMap<String, String>,
    pub values_files: Vec<String>,
}

impl Application {
    /// Instance as an option, `None` when empty.
    pub fn instance(&self) -> Option<&str> {
        non_empty(&self.instance)
    }

    /// Environment as an option, `None` when empty.
    pub fn env(&self) -> Option<&str> {
        non_empty(&self.env)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// One entry of `spec.source.plugin.env`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identity_reads_as_none() {
        let app = Application {
            name: "api".to_string(),
            env: "prod".to_string(),
            ..Default::default()
        };
        assert_eq!(app.env(), Some("prod"));
        assert_eq!(app.instance(), None);
    }

    #[test]
    fn application_serializes_with_ordered_setters() {
        let mut app = Application {
            name: "api".to_string(),
            repo_url: "git@example.com:org/api.git".to_string(),
            path: ".".to_string(),
            ..Default::default()
        };
        app.setters.insert("z.key".to_string(), "1".to_string());
        app.setters.insert("a.key".to_string(), "2".to_string());

        let json = serde_json::to_string(&app).unwrap();
        let a = json.find("a.key").unwrap();
        let z = json.find("z.key").unwrap();
        assert!(a < z);
    }
}
