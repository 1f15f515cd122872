//! Configuration for application resolution and rendering.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::filter::ParseOptions;
use crate::stream::ApplicationKind;

/// Reserved label, annotation and plugin variable names used while
/// resolving an [`Application`](crate::Application).
///
/// Defaults follow the werf plugin conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub api_version: String,
    pub kind: String,
    pub instance_label: String,
    pub env_label: String,
    /// Plugin variables carrying `key=value` overrides.
    pub set_prefix: String,
    /// Plugin variables carrying values files, suffixed with a numeric index.
    pub values_prefix: String,
    pub instance_var: String,
    pub env_var: String,
    pub repository_annotation: String,
    pub path_annotation: String,
    /// Override key the resolved instance is passed to helm under.
    pub instance_key: String,
    /// Override key the resolved env is passed to helm under.
    pub env_key: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            api_version: "argoproj.io/v1alpha1".to_string(),
            kind: "Application".to_string(),
            instance_label: "instance".to_string(),
            env_label: "env".to_string(),
            set_prefix: "WERF_SET_".to_string(),
            values_prefix: "WERF_VALUES_".to_string(),
            instance_var: "WERF_SET_INSTANCE".to_string(),
            env_var: "WERF_SET_ENV".to_string(),
            repository_annotation: "rawRepository".to_string(),
            path_annotation: "rawPath".to_string(),
            instance_key: "global.instance".to_string(),
            env_key: "global.env".to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn application_kind(&self) -> ApplicationKind {
        ApplicationKind::new(&self.api_version, &self.kind)
    }
}

/// Release name of the umbrella chart.
pub const APP_OF_APPS_RELEASE: &str = "app-of-apps";

/// Chart directory inside an application's path (werf layout).
pub const CHART_DIR: &str = ".helm";

/// Options for one end-to-end render run.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Path to the app-of-apps chart.
    pub chart_path: PathBuf,
    /// Values files for the app-of-apps chart, in order.
    pub values_files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    /// Raw `path OP value` filter strings.
    pub filters: Vec<String>,
    pub filter_syntax: ParseOptions,
    pub resolver: ResolverConfig,
}

impl RenderConfig {
    pub fn new(chart_path: impl Into<PathBuf>) -> Self {
        Self {
            chart_path: chart_path.into(),
            values_files: Vec::new(),
            output_dir: PathBuf::from("rendered"),
            filters: Vec::new(),
            filter_syntax: ParseOptions::strict(),
            resolver: ResolverConfig::default(),
        }
    }

    pub fn with_values_files(mut self, values_files: Vec<PathBuf>) -> Self {
        self.values_files = values_files;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_filters(mut self, filters: Vec<String>, syntax: ParseOptions) -> Self {
        self.filters = filters;
        self.filter_syntax = syntax;
        self
    }
}
