mod common;

use tempfile::TempDir;

use siroc_core::entrypoint::resolve;

use common::write_file;

#[test]
fn test_index_is_found_without_declared_path() {
    let temp_dir = TempDir::new().unwrap();
    write_file(&temp_dir.path().join("src/index.ts"), "export {}");

    assert_eq!(
        resolve(temp_dir.path(), None),
        Some(temp_dir.path().join("src/index.ts"))
    );
}

#[test]
fn test_named_source_matches_output() {
    let temp_dir = TempDir::new().unwrap();
    write_file(&temp_dir.path().join("src/index.ts"), "export {}");
    write_file(&temp_dir.path().join("src/widget.ts"), "export {}");

    assert_eq!(
        resolve(temp_dir.path(), Some("lib/widget.js")),
        Some(temp_dir.path().join("src/widget.ts"))
    );
}

#[test]
fn test_ts_preferred_over_js() {
    let temp_dir = TempDir::new().unwrap();
    write_file(&temp_dir.path().join("src/cli.js"), "");
    write_file(&temp_dir.path().join("src/cli.ts"), "");

    assert_eq!(
        resolve(temp_dir.path(), Some("./bin/cli.js")),
        Some(temp_dir.path().join("src/cli.ts"))
    );
}

#[test]
fn test_format_suffix_falls_back_to_plain_name() {
    let temp_dir = TempDir::new().unwrap();
    write_file(&temp_dir.path().join("src/babel/index.js"), "");

    assert_eq!(
        resolve(temp_dir.path(), Some("./lib/babel.es.js")),
        Some(temp_dir.path().join("src/babel/index.js"))
    );
}

#[test]
fn test_nested_output_dirs() {
    let temp_dir = TempDir::new().unwrap();
    write_file(&temp_dir.path().join("src/index.ts"), "");
    write_file(&temp_dir.path().join("src/cli/run.ts"), "");

    assert_eq!(
        resolve(temp_dir.path(), Some("dist/cli/run.js")),
        Some(temp_dir.path().join("src/cli/run.ts"))
    );
}

#[test]
fn test_nothing_found() {
    let temp_dir = TempDir::new().unwrap();
    assert_eq!(resolve(temp_dir.path(), Some("dist/index.js")), None);
}

#[test]
fn test_resolution_is_stable() {
    let temp_dir = TempDir::new().unwrap();
    write_file(&temp_dir.path().join("src/index.js"), "");
    let first = resolve(temp_dir.path(), Some("dist/index.js"));
    let second = resolve(temp_dir.path(), Some("dist/index.js"));
    assert_eq!(first, second);
}
