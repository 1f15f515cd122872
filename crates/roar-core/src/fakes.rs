//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `MemoryRenderer` and `MemoryFetcher`, which record every call and
//! never touch helm or git.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::APP_OF_APPS_RELEASE;
use crate::domain::{Result, RoarError};
use crate::git::SourceFetcher;
use crate::helm::{RenderRequest, TemplateRenderer};

// ---------------------------------------------------------------------------
// MemoryRenderer
// ---------------------------------------------------------------------------

/// Renderer returning canned output per release name.
///
/// Releases without canned output render to `rendered: <release>\n`.
#[derive(Debug, Default)]
pub struct MemoryRenderer {
    outputs: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    requests: Mutex<Vec<RenderRequest>>,
}

impl MemoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer whose app-of-apps release renders to `manifests`.
    pub fn with_app_of_apps(manifests: &str) -> Self {
        Self::new().with_output(APP_OF_APPS_RELEASE, manifests)
    }

    pub fn with_output(mut self, release: &str, output: &str) -> Self {
        self.outputs
            .insert(release.to_string(), output.as_bytes().to_vec());
        self
    }

    /// Make rendering `release` fail.
    pub fn failing(mut self, release: &str) -> Self {
        self.failing.insert(release.to_string());
        self
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TemplateRenderer for MemoryRenderer {
    fn template(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.release_name) {
            return Err(RoarError::RenderFailed(format!(
                "release {} is configured to fail",
                request.release_name
            )));
        }
        Ok(self
            .outputs
            .get(&request.release_name)
            .cloned()
            .unwrap_or_else(|| format!("rendered: {}\n", request.release_name).into_bytes()))
    }
}

// ---------------------------------------------------------------------------
// MemoryFetcher
// ---------------------------------------------------------------------------

/// A recorded fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub url: String,
    pub revision: String,
    pub target: PathBuf,
}

/// Fetcher that creates the target directory instead of cloning.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    failing: HashSet<String>,
    calls: Mutex<Vec<FetchCall>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make fetching `url` fail.
    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl SourceFetcher for MemoryFetcher {
    fn fetch(&self, url: &str, revision: &str, target: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(FetchCall {
            url: url.to_string(),
            revision: revision.to_string(),
            target: target.to_path_buf(),
        });
        if self.failing.contains(url) {
            return Err(RoarError::FetchFailed(format!(
                "repository {url} is configured to fail"
            )));
        }
        std::fs::create_dir_all(target)?;
        Ok(())
    }
}
