mod common;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tempfile::TempDir;

use siroc_core::build_config::{ConfigKind, Plugin};
use siroc_core::config::{ConfigStore, PackageOptions};
use siroc_core::hooks::{HookName, HookPayload, Hooks};
use siroc_core::orchestrator::{Orchestrator, Outcome, Phase};
use siroc_core::package::{Package, Services};
use siroc_core::vcs::{LogEntry, VersionControl};
use siroc_core::workspace::get_workspace_packages;

use common::{read_manifest, services, write_file, write_manifest, FakeBundler};

/// A two-package workspace where `a` depends on `b` and ships a binary.
fn canary_workspace() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_manifest(
        root,
        json!({ "name": "root", "version": "0.0.0", "private": true, "workspaces": ["packages/*"] }),
    );
    write_manifest(
        &root.join("packages/a"),
        json!({
            "name": "a",
            "version": "1.0.0",
            "main": "dist/index.js",
            "bin": "bin/a.js",
            "dependencies": { "b": "^1.0.0", "defu": "^3.0.0" }
        }),
    );
    write_file(&root.join("packages/a/src/index.ts"), "export * from 'b'");
    write_file(&root.join("packages/a/src/a.ts"), "console.log('a')");
    write_manifest(
        &root.join("packages/b"),
        json!({ "name": "b", "version": "1.0.0", "main": "dist/index.js" }),
    );
    write_file(&root.join("packages/b/src/index.ts"), "export const b = 1");
    temp_dir
}

async fn workspace(root: &Path, options: PackageOptions) -> Vec<Package> {
    let root_package = Package::load(options.for_root(root), services("abc1234"))
        .await
        .unwrap();
    get_workspace_packages(&root_package, None).await
}

#[tokio::test]
async fn test_canary_build_links_siblings() {
    let temp_dir = canary_workspace();
    let root = temp_dir.path();
    let mut packages = workspace(root, PackageOptions::new(root).with_suffix("-canary")).await;
    let bundler = Arc::new(FakeBundler::default());

    let summary = Orchestrator::new(bundler.clone()).run(&mut packages).await;

    assert!(!summary.has_failures(), "{:?}", summary.outcomes);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| matches!(o.outcome, Outcome::Built(_))));

    let b = read_manifest(&root.join("packages/b"));
    assert_eq!(b["name"], "b-canary");
    let b_version = b["version"].as_str().unwrap();
    let stamp = Regex::new(r"^1\.0\.0-\d+\.abc1234$").unwrap();
    assert!(stamp.is_match(b_version), "{}", b_version);

    let a = read_manifest(&root.join("packages/a"));
    assert_eq!(a["name"], "a-canary");
    let deps = a["dependencies"].as_object().unwrap();
    assert!(!deps.contains_key("b"));
    assert_eq!(deps["b-canary"], format!("^{}", b_version));
    assert_eq!(deps["defu"], "^3.0.0");
    assert_eq!(a["bin"], json!({ "a": "bin/a.js", "a-canary": "bin/a.js" }));

    let binary = root.join("packages/a/bin/a.js");
    assert!(binary.is_file());
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&binary).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    let inputs = bundler.built_inputs();
    assert!(inputs.contains(&root.join("packages/a/src/a.ts")));
    assert!(inputs.contains(&root.join("packages/a/src/index.ts")));
    assert!(inputs.contains(&root.join("packages/b/src/index.ts")));

    let built = bundler.built.lock().unwrap();
    let main_a = built
        .iter()
        .find(|c| c.kind == ConfigKind::Main && c.input.starts_with(root.join("packages/a")))
        .unwrap();
    match &main_a.plugins[0] {
        Plugin::Alias { entries } => assert_eq!(entries["b"], "b-canary"),
        other => panic!("unexpected first plugin {:?}", other),
    }
    match &main_a.plugins[1] {
        Plugin::Replace { values, .. } => assert_eq!(values["'b'"], "'b-canary'"),
        other => panic!("unexpected second plugin {:?}", other),
    }
}

#[tokio::test]
async fn test_bundler_failure_is_isolated() {
    let temp_dir = canary_workspace();
    let root = temp_dir.path();
    let mut packages = workspace(root, PackageOptions::new(root).with_suffix("-canary")).await;
    let bundler = Arc::new(FakeBundler::failing_under(&root.join("packages/a")));

    let summary = Orchestrator::new(bundler.clone()).run(&mut packages).await;

    assert!(summary.has_failures());
    for outcome in &summary.outcomes {
        match (outcome.package.as_str(), &outcome.outcome) {
            ("a-canary", Outcome::Failed { phase, message }) => {
                assert_eq!(*phase, Phase::Build);
                assert!(message.contains("[PARSE_ERROR] Unexpected token"), "{}", message);
            }
            ("b-canary", Outcome::Built(reports)) => assert_eq!(reports.len(), 1),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    // `a` never reached the finalize phase, so its dependency range is untouched.
    let a = read_manifest(&root.join("packages/a"));
    assert_eq!(a["dependencies"]["b-canary"], "^1.0.0");
    assert!(root.join("packages/b/dist/index.js").is_file());
}

#[tokio::test]
async fn test_watch_mode_skips_finalize() {
    let temp_dir = TempDir::new().unwrap();
    write_manifest(
        temp_dir.path(),
        json!({ "version": "1.0.0", "name": "watched", "main": "dist/index.js" }),
    );
    write_file(&temp_dir.path().join("src/index.ts"), "");
    let mut packages = vec![
        Package::load(PackageOptions::new(temp_dir.path()), services("abc1234"))
            .await
            .unwrap(),
    ];
    let bundler = Arc::new(FakeBundler::default());

    let summary = Orchestrator::new(bundler.clone())
        .with_watch(true)
        .run(&mut packages)
        .await;

    assert!(summary.is_watching());
    assert_eq!(summary.outcomes[0].outcome, Outcome::Watching);
    let written = read_manifest(temp_dir.path());
    let first_key = written.as_object().unwrap().keys().next().cloned();
    assert_eq!(first_key.as_deref(), Some("version"));
    assert!(bundler.built_inputs().is_empty());

    for watcher in summary.watchers {
        watcher.abort();
    }
}

#[tokio::test]
async fn test_disabled_build_is_still_finalized() {
    let temp_dir = TempDir::new().unwrap();
    write_manifest(
        temp_dir.path(),
        json!({ "version": "1.0.0", "name": "docs", "main": "dist/index.js" }),
    );
    write_file(&temp_dir.path().join("src/index.ts"), "");
    let mut options = PackageOptions::new(temp_dir.path());
    options.build = false;
    let mut packages = vec![Package::load(options, services("abc1234")).await.unwrap()];
    let bundler = Arc::new(FakeBundler::default());

    let summary = Orchestrator::new(bundler.clone()).run(&mut packages).await;

    assert_eq!(summary.outcomes[0].outcome, Outcome::Skipped);
    assert!(bundler.built_inputs().is_empty());
    let written = read_manifest(temp_dir.path());
    let first_key = written.as_object().unwrap().keys().next().cloned();
    assert_eq!(first_key.as_deref(), Some("name"));
}

#[tokio::test]
async fn test_hooks_shape_the_build() {
    let temp_dir = TempDir::new().unwrap();
    write_manifest(
        temp_dir.path(),
        json!({ "name": "hooked", "version": "1.0.0", "main": "dist/index.js", "types": "dist/index.d.ts" }),
    );
    write_file(&temp_dir.path().join("src/index.ts"), "");

    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    let mut hooks = Hooks::new();
    hooks.register(HookName::ExtendConfig, |_, payload| {
        if let HookPayload::ExtendConfig(configs) = payload {
            configs.retain(|c| c.kind != ConfigKind::Types);
        }
        Ok(())
    });
    hooks.register(HookName::Done, move |_, payload| {
        if let HookPayload::Done(report) = payload {
            counter.fetch_add(report.outputs.len(), Ordering::SeqCst);
        }
        Ok(())
    });
    let mut packages = vec![Package::load(
        PackageOptions::new(temp_dir.path()).with_hooks(hooks),
        services("abc1234"),
    )
    .await
    .unwrap()];
    let bundler = Arc::new(FakeBundler::default());

    let summary = Orchestrator::new(bundler.clone()).run(&mut packages).await;

    assert!(!summary.has_failures());
    assert_eq!(bundler.built.lock().unwrap().len(), 1);
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prepare_writes_stubs() {
    let temp_dir = canary_workspace();
    let root = temp_dir.path();
    write_file(&root.join("packages/b/dist/stale.js"), "");
    let packages = workspace(root, PackageOptions::new(root)).await;
    let orchestrator = Orchestrator::new(Arc::new(FakeBundler::default()));

    let results = orchestrator.prepare(&packages).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert!(!root.join("packages/b/dist/stale.js").exists());
    assert_eq!(
        fs::read_to_string(root.join("packages/b/dist/index.js")).unwrap(),
        "export * from './../src/index'"
    );
}

/// Answers like `git` would, after `delay`.
struct SlowVcs {
    delay: Duration,
}

#[async_trait]
impl VersionControl for SlowVcs {
    async fn short_commit(&self) -> String {
        tokio::time::sleep(self.delay).await;
        "abc1234".to_string()
    }

    async fn branch(&self) -> String {
        "main".to_string()
    }

    async fn last_tag(&self) -> Option<String> {
        None
    }

    async fn log(&self, _from: Option<&str>, _to: &str) -> Vec<LogEntry> {
        Vec::new()
    }
}

#[tokio::test]
async fn test_packages_are_versioned_concurrently() {
    let temp_dir = TempDir::new().unwrap();
    let slow = Services::new(
        Arc::new(SlowVcs {
            delay: Duration::from_millis(400),
        }),
        Arc::new(ConfigStore::new()),
    );

    let mut packages = Vec::new();
    for name in ["a", "b", "c"] {
        let dir = temp_dir.path().join(name);
        write_manifest(&dir, json!({ "name": name, "version": "1.0.0" }));
        let options = PackageOptions::new(&dir).with_suffix("-canary");
        packages.push(Package::load(options, slow.clone()).await.unwrap());
    }

    let start = Instant::now();
    let summary = Orchestrator::new(Arc::new(FakeBundler::default()))
        .run(&mut packages)
        .await;
    let elapsed = start.elapsed();

    assert!(!summary.has_failures());
    assert!(elapsed < Duration::from_millis(1000), "took {:?}", elapsed);
    for name in ["a", "b", "c"] {
        let written = read_manifest(&temp_dir.path().join(name));
        assert_eq!(written["name"], format!("{}-canary", name));
    }
}
