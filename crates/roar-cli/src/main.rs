//! roar - render the applications of an Argo CD app-of-apps chart
//!
//! The `roar` command renders the umbrella chart, resolves every `Application`
//! it produces, clones each application's repository and renders its chart
//! into `<output-dir>[/<env>][/<instance>]/<name>.yaml`.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn, Level};

use roar_core::{
    Application, GitFetcher, HelmRenderer, ParseOptions, Pipeline, RenderConfig,
};

#[derive(Parser, Debug)]
#[command(name = "roar")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Render Argo CD applications from an app-of-apps Helm chart",
    long_about = None
)]
struct Cli {
    /// Path to the app-of-apps chart
    chart_path: PathBuf,

    /// Values file passed to the app-of-apps render (repeatable)
    #[arg(short = 'f', long = "values")]
    values: Vec<PathBuf>,

    /// Directory receiving the rendered manifests
    #[arg(short, long, env = "ROAR_OUTPUT_DIR", default_value = "rendered")]
    output_dir: PathBuf,

    /// Log verbosity (RUST_LOG takes precedence)
    #[arg(short, long, env = "ROAR_LOG_LEVEL", value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Only process applications matching `path==value` or `path!=value` (repeatable)
    #[arg(long = "filter", env = "ROAR_FILTER")]
    filters: Vec<String>,

    /// Also accept a single `=` as equality in filters
    #[arg(long)]
    lenient_filters: bool,

    /// Print the resolved applications as JSON instead of rendering them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl Cli {
    fn render_config(&self) -> RenderConfig {
        let syntax = if self.lenient_filters {
            ParseOptions::lenient()
        } else {
            ParseOptions::strict()
        };
        RenderConfig::new(&self.chart_path)
            .with_values_files(self.values.clone())
            .with_output_dir(&self.output_dir)
            .with_filters(self.filters.clone(), syntax)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    roar_core::init_tracing(cli.json, cli.log_level.into());

    let pipeline = Pipeline::new(cli.render_config(), HelmRenderer::new(), GitFetcher);

    if cli.dry_run {
        let plan = pipeline
            .plan()
            .context("Failed to resolve applications")?;
        println!("{}", render_plan(&plan.applications)?);
        return Ok(());
    }

    let summary = pipeline.run().context("Failed to render applications")?;
    for skipped in &summary.skipped {
        warn!(application = %skipped.application, "Skipped: {}", skipped.error);
    }
    info!(
        written = summary.written.len(),
        clones = summary.clones,
        output_dir = %cli.output_dir.display(),
        "Rendering finished"
    );
    Ok(())
}

fn render_plan(applications: &[Application]) -> Result<String> {
    serde_json::to_string_pretty(applications).context("Failed to serialize applications")
}
