//! Helm chart rendering.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

use crate::domain::{Result, RoarError};

/// Everything needed to render one chart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderRequest {
    /// Empty means helm picks a generated name.
    pub release_name: String,
    pub chart_path: PathBuf,
    /// Absolute values file paths, lowest precedence first.
    pub values_files: Vec<PathBuf>,
    pub set_values: BTreeMap<String, String>,
}

impl RenderRequest {
    pub fn new(release_name: impl Into<String>, chart_path: impl Into<PathBuf>) -> Self {
        Self {
            release_name: release_name.into(),
            chart_path: chart_path.into(),
            ..Default::default()
        }
    }

    /// Arguments of the `helm` invocation for this request.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["template".to_string()];
        if !self.release_name.is_empty() {
            args.push(self.release_name.clone());
        }
        args.push(self.chart_path.display().to_string());
        for file in &self.values_files {
            args.push("--values".to_string());
            args.push(file.display().to_string());
        }
        for (key, value) in &self.set_values {
            args.push("--set".to_string());
            args.push(format!("{key}={value}"));
        }
        args
    }
}

/// Renders a chart to a manifest stream.
pub trait TemplateRenderer {
    fn template(&self, request: &RenderRequest) -> Result<Vec<u8>>;
}

/// [`TemplateRenderer`] backed by the `helm` binary.
#[derive(Debug, Clone)]
pub struct HelmRenderer {
    binary: PathBuf,
}

impl HelmRenderer {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("helm"),
        }
    }

    /// Use a specific helm executable.
    pub fn with_binary(binary: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
        }
    }
}

impl Default for HelmRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for HelmRenderer {
    fn template(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(request.args());
        info!(cmd = ?cmd, "[CMD]");

        let output = cmd
            .output()
            .map_err(|e| RoarError::RenderFailed(format!("failed to run helm: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!("{}", stderr.trim());
        }

        if !output.status.success() {
            return Err(RoarError::RenderFailed(format!(
                "{}\nStderr:\n{stderr}",
                output.status
            )));
        }

        Ok(output.stdout)
    }
}
