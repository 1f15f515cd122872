//! Application resolution.
//!
//! Turns classified `Application` documents into canonical [`Application`]
//! descriptors:
//!
//! 1. filters are evaluated on the raw tree, before any decoding;
//! 2. the relevant parts of the document are decoded;
//! 3. instance/env are merged from labels and werf plugin variables;
//! 4. `WERF_SET_*` overrides and ordered `WERF_VALUES_<n>` files are extracted;
//! 5. repository and path fall back from annotations to `spec.source`.

use std::collections::BTreeMap;
use std::io::Read;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::domain::{Application, EnvVar, IdentityField, Result, RoarError};
use crate::filter::{self, Filters};
use crate::node::Node;
use crate::stream::{Classified, Document, DocumentStream};

// ---------------------------------------------------------------------------
// Structural decoding
// ---------------------------------------------------------------------------

/// The parts of an `Application` document resolution reads.
#[derive(Debug, Default)]
struct RawApplication {
    name: String,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    repo_url: String,
    target_revision: String,
    path: String,
    env_vars: Vec<EnvVar>,
}

/// Decoding failure, as `<field>: <problem>`.
type Decoded<T> = std::result::Result<T, String>;

impl RawApplication {
    /// Decode from a document tree.
    ///
    /// Absent and null sections decode as empty. A section of the wrong shape
    /// or a repeated key in any decoded mapping is an error.
    fn decode(root: &Node) -> Decoded<Self> {
        let root = mapping(Some(root), "document")?;
        let metadata = mapping(entry(root, "metadata"), "metadata")?;
        let spec = mapping(entry(root, "spec"), "spec")?;
        let source = mapping(entry(spec, "source"), "spec.source")?;

        let env_vars = match entry(source, "plugin") {
            None | Some(Node::Null) => Vec::new(),
            plugin => {
                let plugin = mapping(plugin, "spec.source.plugin")?;
                sequence(entry(plugin, "env"), "spec.source.plugin.env")?
                    .iter()
                    .enumerate()
                    .map(|(i, item)| env_var(item, &format!("spec.source.plugin.env[{i}]")))
                    .collect::<Decoded<Vec<_>>>()?
            }
        };

        Ok(Self {
            name: scalar(entry(metadata, "name"), "metadata.name")?,
            labels: string_map(entry(metadata, "labels"), "metadata.labels")?,
            annotations: string_map(entry(metadata, "annotations"), "metadata.annotations")?,
            repo_url: scalar(entry(source, "repoURL"), "spec.source.repoURL")?,
            target_revision: scalar(entry(source, "targetRevision"), "spec.source.targetRevision")?,
            path: scalar(entry(source, "path"), "spec.source.path")?,
            env_vars,
        })
    }
}

fn entry<'n>(entries: &'n [(String, Node)], key: &str) -> Option<&'n Node> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn mapping<'n>(node: Option<&'n Node>, field: &str) -> Decoded<&'n [(String, Node)]> {
    match node {
        None | Some(Node::Null) => Ok(&[]),
        Some(Node::Mapping(entries)) => {
            for (i, (key, _)) in entries.iter().enumerate() {
                if entries[..i].iter().any(|(k, _)| k == key) {
                    return Err(format!("{field}: mapping key \"{key}\" already defined"));
                }
            }
            Ok(entries)
        }
        Some(_) => Err(format!("{field}: expected a mapping")),
    }
}

fn sequence<'n>(node: Option<&'n Node>, field: &str) -> Decoded<&'n [Node]> {
    match node {
        None | Some(Node::Null) => Ok(&[]),
        Some(Node::Sequence(items)) => Ok(items),
        Some(_) => Err(format!("{field}: expected a sequence")),
    }
}

/// Scalar text as written; null is empty.
fn scalar(node: Option<&Node>, field: &str) -> Decoded<String> {
    match node {
        None | Some(Node::Null) => Ok(String::new()),
        Some(Node::Scalar(text)) => Ok(text.clone()),
        Some(_) => Err(format!("{field}: expected a scalar value")),
    }
}

fn string_map(node: Option<&Node>, field: &str) -> Decoded<BTreeMap<String, String>> {
    mapping(node, field)?
        .iter()
        .map(|(key, value)| Ok((key.clone(), scalar(Some(value), &format!("{field}.{key}"))?)))
        .collect()
}

fn env_var(node: &Node, field: &str) -> Decoded<EnvVar> {
    let var = mapping(Some(node), field)?;
    Ok(EnvVar::new(
        scalar(entry(var, "name"), &format!("{field}.name"))?,
        scalar(entry(var, "value"), &format!("{field}.value"))?,
    ))
}

fn lookup<'a>(map: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(key).map(String::as_str)
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves classified documents into [`Application`]s.
///
/// Resolution is pure; the same document always produces the same result.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
    filters: Filters,
}

impl Resolver {
    pub fn new(config: ResolverConfig, filters: Filters) -> Self {
        for predicate in &filters {
            info!(
                "Applying filter configuration: {} {} '{}'",
                predicate.path, predicate.operator, predicate.value
            );
        }
        Self { config, filters }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Iterate the applications of a rendered app-of-apps stream.
    ///
    /// Per-application errors are yielded and iteration continues; a
    /// malformed document ends the iteration after its error.
    pub fn applications<R: Read>(&self, reader: R) -> Applications<'_> {
        Applications {
            resolver: self,
            documents: DocumentStream::from_reader(reader)
                .classified(self.config.application_kind()),
        }
    }

    /// Resolve one classified document. `Ok(None)` means a filter rejected it.
    pub fn resolve(&self, doc: &Document) -> Result<Option<Application>> {
        if !self.accepts(doc) {
            return Ok(None);
        }

        let raw = RawApplication::decode(&doc.node).map_err(|message| {
            RoarError::MalformedDocument {
                index: doc.index,
                location: None,
                message: format!("failed to decode application: {message}"),
            }
        })?;

        if raw.name.is_empty() {
            return Err(RoarError::MalformedDocument {
                index: doc.index,
                location: None,
                message: "application has no metadata.name".to_string(),
            });
        }

        self.build(raw).map(Some)
    }

    fn accepts(&self, doc: &Document) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        let name = doc.name().unwrap_or_default();

        let Some(failed) = self.filters.first_failure(Some(&doc.node)) else {
            debug!(application = %name, "Passed filter criteria");
            return true;
        };

        let (found_value, field_exists) = filter::observed(Some(&doc.node), failed);
        info!(
            application = %name,
            filter_path = %failed.path,
            operator = %failed.operator,
            expected = %failed.value,
            found_value = %found_value,
            field_exists,
            "Skipped by filter ({failed})"
        );
        false
    }

    fn build(&self, raw: RawApplication) -> Result<Application> {
        let config = &self.config;
        let RawApplication {
            name,
            labels,
            annotations,
            repo_url,
            target_revision,
            path,
            env_vars,
        } = raw;

        let instance = merge_identity(
            &name,
            IdentityField::Instance,
            lookup(&labels, &config.instance_label).unwrap_or_default(),
            &plugin_identity(&name, &env_vars, &config.instance_var),
        )?;
        let env = merge_identity(
            &name,
            IdentityField::Env,
            lookup(&labels, &config.env_label).unwrap_or_default(),
            &plugin_identity(&name, &env_vars, &config.env_var),
        )?;

        let mut setters = extract_setters(&name, &env_vars, config);
        if !instance.is_empty() {
            setters.insert(config.instance_key.clone(), instance.clone());
        }
        if !env.is_empty() {
            setters.insert(config.env_key.clone(), env.clone());
        }
        let values_files = extract_values_files(&name, &env_vars, &config.values_prefix);

        let repo_url = resolve_repository(
            &name,
            lookup(&annotations, &config.repository_annotation),
            &repo_url,
        )?;
        let path = resolve_path(
            &name,
            lookup(&annotations, &config.path_annotation),
            &path,
        );

        debug!(
            application = %name,
            setters = setters.len(),
            values_files = values_files.len(),
            "Resolved application"
        );

        Ok(Application {
            name,
            instance,
            env,
            repo_url,
            path,
            target_revision,
            setters,
            values_files,
        })
    }
}

/// Iterator over the resolved applications of a stream.
pub struct Applications<'r> {
    resolver: &'r Resolver,
    documents: Classified,
}

impl Iterator for Applications<'_> {
    type Item = Result<Application>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let doc = match self.documents.next()? {
                Ok(doc) => doc,
                Err(err) => return Some(Err(err)),
            };
            match self.resolver.resolve(&doc) {
                Ok(Some(app)) => return Some(Ok(app)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Resolve every application in `reader`. The first error of any kind aborts.
pub fn parse_applications<R: Read>(
    reader: R,
    filters: Filters,
    config: ResolverConfig,
) -> Result<Vec<Application>> {
    let resolver = Resolver::new(config, filters);
    let applications: Result<Vec<_>> = resolver.applications(reader).collect();
    applications
}

// ---------------------------------------------------------------------------
// Field resolution
// ---------------------------------------------------------------------------

/// `key=value` split at the first `=`. An empty key is not an assignment.
fn split_assignment(s: &str) -> Option<(&str, &str)> {
    s.split_once('=').filter(|(key, _)| !key.is_empty())
}

/// Right-hand side of the last valid `var_name` plugin variable, or empty.
fn plugin_identity(app: &str, env_vars: &[EnvVar], var_name: &str) -> String {
    let mut identity = String::new();
    for var in env_vars.iter().filter(|v| v.name == var_name) {
        match split_assignment(&var.value) {
            Some((_, value)) => identity = value.to_string(),
            None => warn!(
                application = %app,
                "Skipping invalid WERF_SET variable '{}' with value '{}'", var.name, var.value
            ),
        }
    }
    identity
}

fn merge_identity(app: &str, field: IdentityField, label: &str, plugin: &str) -> Result<String> {
    match (label.is_empty(), plugin.is_empty()) {
        (false, false) if label != plugin => Err(RoarError::ConflictingIdentity {
            application: app.to_string(),
            field,
            label: label.to_string(),
            plugin: plugin.to_string(),
        }),
        (false, _) => Ok(label.to_string()),
        (true, _) => Ok(plugin.to_string()),
    }
}

/// `key=value` overrides from `WERF_SET_*` variables, excluding the identity
/// variables. Later keys overwrite earlier ones.
fn extract_setters(
    app: &str,
    env_vars: &[EnvVar],
    config: &ResolverConfig,
) -> BTreeMap<String, String> {
    let mut setters = BTreeMap::new();
    for var in env_vars {
        if !var.name.starts_with(&config.set_prefix)
            || var.name == config.instance_var
            || var.name == config.env_var
        {
            continue;
        }
        match split_assignment(&var.value) {
            Some((key, value)) => {
                setters.insert(key.to_string(), value.to_string());
            }
            None => warn!(
                application = %app,
                "Skipping invalid WERF_SET variable '{}' with value '{}'", var.name, var.value
            ),
        }
    }
    setters
}

/// Values files from `<prefix><n>` variables, ordered by `n`. Equal indices
/// keep their declaration order.
fn extract_values_files(app: &str, env_vars: &[EnvVar], prefix: &str) -> Vec<String> {
    let mut indexed: Vec<(i64, &str)> = Vec::new();
    for var in env_vars {
        let Some(suffix) = var.name.strip_prefix(prefix) else {
            continue;
        };
        match suffix.parse::<i64>() {
            Ok(index) => indexed.push((index, var.value.as_str())),
            Err(_) => warn!(
                application = %app,
                "Could not parse index from '{}'. Skipping.", var.name
            ),
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, path)| path.to_string()).collect()
}

fn resolve_repository(app: &str, annotation: Option<&str>, spec_repo: &str) -> Result<String> {
    match annotation {
        Some(repo) if !repo.is_empty() => Ok(repo.to_string()),
        _ => {
            warn!(
                application = %app,
                "missing 'rawRepository' annotation. Falling back to spec.source.repoURL='{spec_repo}'"
            );
            if spec_repo.is_empty() {
                return Err(RoarError::MissingRepository {
                    application: app.to_string(),
                });
            }
            Ok(spec_repo.to_string())
        }
    }
}

fn resolve_path(app: &str, annotation: Option<&str>, spec_path: &str) -> String {
    match annotation {
        Some("") => ".".to_string(),
        Some(path) => path.to_string(),
        None => {
            warn!(
                application = %app,
                "missing 'rawPath' annotation. Falling back to spec.source.path='{spec_path}'"
            );
            if spec_path.is_empty() {
                warn!(
                    application = %app,
                    "both 'rawPath' annotation and 'spec.source.path' are empty. Falling back to '.'"
                );
                return ".".to_string();
            }
            spec_path.to_string()
        }
    }
}
