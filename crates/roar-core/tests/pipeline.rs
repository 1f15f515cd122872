//! Integration tests for the render pipeline with in-memory collaborators.

use roar_core::fakes::{MemoryFetcher, MemoryRenderer};
use roar_core::{ParseOptions, Pipeline, RenderConfig, RoarError, APP_OF_APPS_RELEASE, CHART_DIR};
use std::path::PathBuf;

const UMBRELLA: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: api
  labels:
    env: prod
    instance: eu-1
  annotations:
    rawRepository: https://github.com/org/platform.git
    rawPath: services/api
spec:
  source:
    targetRevision: master
    plugin:
      env:
        - name: WERF_VALUES_1
          value: values/prod.yaml
        - name: WERF_SET_TAG
          value: image.tag=v1
---
apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: web
  labels:
    env: prod
  annotations:
    rawRepository: git@github.com:org/platform.git
    rawPath: services/web
spec:
  source:
    targetRevision: master
---
apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: batch
  annotations:
    rawRepository: git@github.com:org/batch.git
spec:
  source:
    targetRevision: main
    path: ""
"#;

fn config(output: &std::path::Path) -> RenderConfig {
    RenderConfig::new("charts/umbrella")
        .with_values_files(vec![PathBuf::from("charts/umbrella/values-prod.yaml")])
        .with_output_dir(output)
}

#[test]
fn test_run_writes_manifests_in_env_instance_layout() {
    let out = tempfile::tempdir().unwrap();
    let renderer = MemoryRenderer::with_app_of_apps(UMBRELLA).with_output("api", "kind: Deployment\n");
    let pipeline = Pipeline::new(config(out.path()), renderer, MemoryFetcher::new());

    let summary = pipeline.run().expect("run should succeed");

    assert!(summary.skipped.is_empty(), "unexpected skips: {:?}", summary.skipped);
    assert_eq!(
        summary.written,
        vec![
            out.path().join("prod/eu-1/api.yaml"),
            out.path().join("prod/web.yaml"),
            out.path().join("batch.yaml"),
        ]
    );
    assert_eq!(
        std::fs::read_to_string(out.path().join("prod/eu-1/api.yaml")).unwrap(),
        "kind: Deployment\n"
    );
    assert_eq!(
        std::fs::read_to_string(out.path().join("batch.yaml")).unwrap(),
        "rendered: batch\n"
    );
}

#[test]
fn test_repository_is_cloned_once_per_location_and_revision() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        config(out.path()),
        MemoryRenderer::with_app_of_apps(UMBRELLA),
        MemoryFetcher::new(),
    );

    let summary = pipeline.run().unwrap();

    // api and web share git@github.com:org/platform.git@master
    assert_eq!(summary.clones, 2);
    let calls = pipeline.fetcher().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].url, "git@github.com:org/platform.git");
    assert_eq!(calls[0].revision, "master");
    assert_eq!(calls[1].url, "git@github.com:org/batch.git");
    assert_eq!(calls[1].revision, "main");
}

#[test]
fn test_render_requests_carry_chart_values_and_setters() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        config(out.path()),
        MemoryRenderer::with_app_of_apps(UMBRELLA),
        MemoryFetcher::new(),
    );
    pipeline.run().unwrap();

    let requests = pipeline.renderer().requests();
    assert_eq!(requests.len(), 4);

    let umbrella = &requests[0];
    assert_eq!(umbrella.release_name, APP_OF_APPS_RELEASE);
    assert_eq!(umbrella.chart_path, PathBuf::from("charts/umbrella"));
    assert_eq!(
        umbrella.values_files,
        vec![PathBuf::from("charts/umbrella/values-prod.yaml")]
    );

    let clone = pipeline.fetcher().calls()[0].target.clone();
    let api = &requests[1];
    assert_eq!(api.release_name, "api");
    assert_eq!(api.chart_path, clone.join("services/api").join(CHART_DIR));
    assert_eq!(
        api.values_files,
        vec![clone.join("services/api").join("values/prod.yaml")]
    );
    assert_eq!(api.set_values["image.tag"], "v1");
    assert_eq!(api.set_values["global.env"], "prod");
    assert_eq!(api.set_values["global.instance"], "eu-1");

    let batch = &requests[3];
    let batch_clone = pipeline.fetcher().calls()[1].target.clone();
    assert_eq!(batch.chart_path, batch_clone.join(".").join(CHART_DIR));
    assert!(batch.set_values.is_empty());
}

#[test]
fn test_failed_fetch_skips_only_affected_applications() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        config(out.path()),
        MemoryRenderer::with_app_of_apps(UMBRELLA),
        MemoryFetcher::new().failing("git@github.com:org/platform.git"),
    );

    let summary = pipeline.run().unwrap();

    assert_eq!(summary.written, vec![out.path().join("batch.yaml")]);
    let skipped: Vec<&str> = summary
        .skipped
        .iter()
        .map(|s| s.application.as_str())
        .collect();
    assert_eq!(skipped, vec!["api", "web"]);
    assert!(summary
        .skipped
        .iter()
        .all(|s| matches!(s.error, RoarError::FetchFailed(_))));
}

#[test]
fn test_failed_application_render_is_skipped() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        config(out.path()),
        MemoryRenderer::with_app_of_apps(UMBRELLA).failing("web"),
        MemoryFetcher::new(),
    );

    let summary = pipeline.run().unwrap();

    assert_eq!(summary.written.len(), 2);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].application, "web");
    assert!(!out.path().join("prod/web.yaml").exists());
}

#[test]
fn test_filters_limit_the_plan() {
    let out = tempfile::tempdir().unwrap();
    let cfg = config(out.path()).with_filters(
        vec!["spec.source.targetRevision==master".to_string()],
        ParseOptions::strict(),
    );
    let pipeline = Pipeline::new(cfg, MemoryRenderer::with_app_of_apps(UMBRELLA), MemoryFetcher::new());

    let plan = pipeline.plan().unwrap();
    let names: Vec<&str> = plan.applications.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["api", "web"]);
    assert!(pipeline.fetcher().calls().is_empty());
}

#[test]
fn test_invalid_filter_fails_before_rendering() {
    let out = tempfile::tempdir().unwrap();
    let cfg = config(out.path()).with_filters(vec!["metadata.name".to_string()], ParseOptions::strict());
    let pipeline = Pipeline::new(cfg, MemoryRenderer::with_app_of_apps(UMBRELLA), MemoryFetcher::new());

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, RoarError::InvalidPredicate { .. }));
    assert!(pipeline.renderer().requests().is_empty());
}

#[test]
fn test_per_document_errors_are_skipped_in_plan() {
    let umbrella = format!(
        "{UMBRELLA}---\napiVersion: argoproj.io/v1alpha1\nkind: Application\nmetadata:\n  name: orphan\nspec:\n  source:\n    targetRevision: main\n"
    );
    let out = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        config(out.path()),
        MemoryRenderer::with_app_of_apps(&umbrella),
        MemoryFetcher::new(),
    );

    let plan = pipeline.plan().unwrap();
    assert_eq!(plan.applications.len(), 3);
    assert_eq!(plan.skipped.len(), 1);
    assert_eq!(plan.skipped[0].application, "orphan");
    assert!(matches!(
        plan.skipped[0].error,
        RoarError::MissingRepository { .. }
    ));
}

#[test]
fn test_malformed_umbrella_output_is_fatal() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        config(out.path()),
        MemoryRenderer::with_app_of_apps("kind: Application\nmetadata: [oops\n"),
        MemoryFetcher::new(),
    );

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, RoarError::MalformedDocument { index: 0, .. }));
    assert!(pipeline.fetcher().calls().is_empty());
}

#[test]
fn test_failed_umbrella_render_is_fatal() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        config(out.path()),
        MemoryRenderer::new().failing(APP_OF_APPS_RELEASE),
        MemoryFetcher::new(),
    );

    assert!(matches!(pipeline.run(), Err(RoarError::RenderFailed(_))));
}
