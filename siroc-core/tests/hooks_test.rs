mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use siroc_core::build_config::BuildOptions;
use siroc_core::bundler::BuildReport;
use siroc_core::config::PackageOptions;
use siroc_core::hooks::{CommandList, HookName, HookPayload, Hooks};

use common::{load_with, write_file, write_manifest};

fn package_dir() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    write_manifest(temp_dir.path(), json!({ "name": "hooked", "version": "1.0.0" }));
    temp_dir
}

#[tokio::test]
async fn test_failing_handlers_do_not_stop_the_rest() {
    let temp_dir = package_dir();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut hooks = Hooks::new();

    let first = Arc::clone(&calls);
    hooks.register(HookName::Done, move |_, _| {
        first.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let second = Arc::clone(&calls);
    hooks.register(HookName::Done, move |_, _| {
        second.fetch_add(1, Ordering::SeqCst);
        Err("disk full".into())
    });
    let third = Arc::clone(&calls);
    hooks.register(HookName::Done, move |_, _| {
        third.fetch_add(1, Ordering::SeqCst);
        panic!("handler bug")
    });
    let fourth = Arc::clone(&calls);
    hooks.register(HookName::Done, move |_, _| {
        fourth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let package = load_with(PackageOptions::new(temp_dir.path()).with_hooks(hooks)).await;
    let report = BuildReport::default();
    let failures = package.call_hook(&mut HookPayload::Done(&report)).await;

    assert_eq!(failures, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_extend_handler_mutates_options() {
    let temp_dir = package_dir();
    let mut hooks = Hooks::new();
    hooks.register(HookName::Extend, |package, payload| {
        if let HookPayload::Extend(options) = payload {
            options.externals.push(format!("{}-runtime", package.name()));
        }
        Ok(())
    });
    hooks.register(HookName::ExtendConfig, |_, _| panic!("not dispatched"));

    let package = load_with(PackageOptions::new(temp_dir.path()).with_hooks(hooks)).await;
    let mut options = BuildOptions::default();
    let failures = package.call_hook(&mut HookPayload::Extend(&mut options)).await;

    assert_eq!(failures, 0);
    assert_eq!(options.externals, vec!["hooked-runtime".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_hooks_run_in_package_root() {
    let temp_dir = package_dir();
    let mut options = PackageOptions::new(temp_dir.path());
    options.shell_hooks.insert(
        HookName::Done.to_string(),
        CommandList::Many(vec!["touch done.marker".to_string(), "exit 3".to_string()]),
    );

    let package = load_with(options).await;
    let report = BuildReport::default();
    let failures = package.call_hook(&mut HookPayload::Done(&report)).await;

    assert_eq!(failures, 1);
    assert!(temp_dir.path().join("done.marker").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_hooks_from_config_file() {
    let temp_dir = package_dir();
    write_file(
        &temp_dir.path().join("siroc.config.json"),
        r#"{ "hooks": { "build:extend": "touch extended.marker" } }"#,
    );

    let package = load_with(PackageOptions::new(temp_dir.path())).await;
    let mut options = BuildOptions::default();
    package.call_hook(&mut HookPayload::Extend(&mut options)).await;

    assert!(temp_dir.path().join("extended.marker").exists());
}
