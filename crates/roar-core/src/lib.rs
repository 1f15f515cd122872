//! roar core library
//!
//! Resolves the Argo CD `Application` documents rendered by an app-of-apps
//! chart into [`Application`] descriptors and renders each of them with helm.
//!
//! The resolution engine ([`node`], [`filter`], [`stream`], [`resolver`],
//! [`locator`]) is pure; [`helm`], [`git`] and [`output`] talk to the outside
//! world and [`pipeline`] ties everything together.

pub mod config;
pub mod domain;
pub mod fakes;
pub mod filter;
pub mod git;
pub mod helm;
pub mod locator;
pub mod node;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod stream;
pub mod telemetry;

pub use config::{RenderConfig, ResolverConfig, APP_OF_APPS_RELEASE, CHART_DIR};
pub use domain::{Application, EnvVar, IdentityField, Result, RoarError};
pub use filter::{Filters, Operator, ParseOptions, Predicate};
pub use git::{is_git_available, GitFetcher, SourceFetcher};
pub use helm::{HelmRenderer, RenderRequest, TemplateRenderer};
pub use locator::{normalize, CacheKey};
pub use node::Node;
pub use output::{output_path, write_manifest};
pub use pipeline::{Pipeline, Plan, RunSummary, Skipped};
pub use resolver::{parse_applications, Applications, Resolver};
pub use stream::{ApplicationKind, Classified, Document, DocumentStream};
pub use telemetry::init_tracing;

/// roar version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
