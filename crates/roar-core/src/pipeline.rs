//! End-to-end rendering of an app-of-apps chart.
//!
//! 1. render the umbrella chart and resolve its applications;
//! 2. for each application, check out its repository (once per location and
//!    revision), render its `.helm` chart, and write the result.
//!
//! Failures of a single application are logged and skipped; only setup
//! errors, invalid filters and malformed documents abort the run.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, info, info_span, warn};

use crate::config::{RenderConfig, APP_OF_APPS_RELEASE, CHART_DIR};
use crate::domain::{Application, Result, RoarError};
use crate::filter::Filters;
use crate::git::SourceFetcher;
use crate::helm::{RenderRequest, TemplateRenderer};
use crate::locator::CacheKey;
use crate::output::write_manifest;
use crate::resolver::Resolver;

/// An application left out of the run and why.
#[derive(Debug)]
pub struct Skipped {
    pub application: String,
    pub error: RoarError,
}

/// Applications resolved from the umbrella chart.
#[derive(Debug, Default)]
pub struct Plan {
    pub applications: Vec<Application>,
    /// Applications that failed resolution.
    pub skipped: Vec<Skipped>,
}

/// Outcome of [`Pipeline::run`].
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Manifests written, in application order.
    pub written: Vec<PathBuf>,
    pub skipped: Vec<Skipped>,
    /// Number of repository checkouts performed.
    pub clones: usize,
}

/// Drives rendering through a [`TemplateRenderer`] and a [`SourceFetcher`].
pub struct Pipeline<R, F> {
    config: RenderConfig,
    renderer: R,
    fetcher: F,
}

impl<R: TemplateRenderer, F: SourceFetcher> Pipeline<R, F> {
    pub fn new(config: RenderConfig, renderer: R, fetcher: F) -> Self {
        Self {
            config,
            renderer,
            fetcher,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Render the umbrella chart and resolve its applications.
    ///
    /// Filters are parsed before anything is rendered.
    pub fn plan(&self) -> Result<Plan> {
        let filters = Filters::parse(&self.config.filters, self.config.filter_syntax)?;
        let resolver = Resolver::new(self.config.resolver.clone(), filters);

        info!("Rendering the main 'app-of-apps' chart...");
        let mut request = RenderRequest::new(APP_OF_APPS_RELEASE, &self.config.chart_path);
        request.values_files = self.config.values_files.clone();
        let manifests = self.renderer.template(&request)?;

        info!("Parsing for Argo CD applications...");
        let mut plan = Plan::default();
        for resolved in resolver.applications(manifests.as_slice()) {
            match resolved {
                Ok(app) => plan.applications.push(app),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    let application = application_name(&err);
                    error!(application = %application, "Could not resolve application: {err}. Skipping.");
                    plan.skipped.push(Skipped { application, error: err });
                }
            }
        }

        info!("Found {} applications to process.", plan.applications.len());
        Ok(plan)
    }

    /// Render every application of the plan into the output directory.
    pub fn run(&self) -> Result<RunSummary> {
        let plan = self.plan()?;
        std::fs::create_dir_all(&self.config.output_dir)?;

        let mut checkouts = Checkouts::new()?;
        let mut summary = RunSummary {
            skipped: plan.skipped,
            ..Default::default()
        };

        for app in &plan.applications {
            let _span = info_span!("application", application = %app.name).entered();
            info!("Processing application...");
            match self.render_application(app, &mut checkouts) {
                Ok(path) => summary.written.push(path),
                Err(err) => {
                    error!(application = %app.name, "Could not process application: {err}. Skipping.");
                    summary.skipped.push(Skipped {
                        application: app.name.clone(),
                        error: err,
                    });
                }
            }
        }

        summary.clones = checkouts.len();
        info!(
            written = summary.written.len(),
            skipped = summary.skipped.len(),
            "All done!"
        );
        Ok(summary)
    }

    fn render_application(&self, app: &Application, checkouts: &mut Checkouts) -> Result<PathBuf> {
        let key = CacheKey::new(&app.repo_url, &app.target_revision)?;
        let repo = checkouts.checkout(&key, &self.fetcher)?;

        let service = repo.join(&app.path);
        let request = RenderRequest {
            release_name: app.name.clone(),
            chart_path: service.join(CHART_DIR),
            values_files: app.values_files.iter().map(|f| service.join(f)).collect(),
            set_values: app.setters.clone(),
        };
        info!(
            "Found {} --set values and {} --values files in manifest.",
            request.set_values.len(),
            request.values_files.len()
        );

        let rendered = self.renderer.template(&request)?;
        write_manifest(&self.config.output_dir, app, &rendered)
    }
}

fn application_name(err: &RoarError) -> String {
    match err {
        RoarError::ConflictingIdentity { application, .. }
        | RoarError::MissingRepository { application } => application.clone(),
        _ => String::new(),
    }
}

/// Repository checkouts of one run, keyed by location and revision.
///
/// Checkouts live in a temporary directory removed on drop.
struct Checkouts {
    root: tempfile::TempDir,
    paths: HashMap<CacheKey, PathBuf>,
}

impl Checkouts {
    fn new() -> Result<Self> {
        let root = tempfile::Builder::new().prefix("argo-charts-").tempdir()?;
        info!("Using temporary directory for clones: {}", root.path().display());
        Ok(Self {
            root,
            paths: HashMap::new(),
        })
    }

    fn len(&self) -> usize {
        self.paths.len()
    }

    fn checkout<F: SourceFetcher>(&mut self, key: &CacheKey, fetcher: &F) -> Result<PathBuf> {
        if let Some(path) = self.paths.get(key) {
            info!("Using cached repository from path: {}", path.display());
            return Ok(path.clone());
        }

        let path = self.root.path().join(clone_dir_name(key));
        info!("Cloning {key} to {}", path.display());
        if let Err(err) = fetcher.fetch(&key.location, &key.revision, &path) {
            if path.exists() {
                if let Err(cleanup) = std::fs::remove_dir_all(&path) {
                    warn!("Could not remove partial clone {}: {cleanup}", path.display());
                }
            }
            return Err(err);
        }

        self.paths.insert(key.clone(), path.clone());
        Ok(path)
    }
}

/// `clone-<first 12 hex chars of sha256(key)>`.
fn clone_dir_name(key: &CacheKey) -> String {
    let digest = Sha256::digest(key.to_string().as_bytes());
    format!("clone-{}", &hex::encode(digest)[..12])
}
