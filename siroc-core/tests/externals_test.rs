use std::path::Path;

use proptest::prelude::*;
use serde_json::json;

use siroc_core::error::Error;
use siroc_core::externals::ExternalMatcher;
use siroc_core::manifest::Manifest;

fn manifest_with(deps: serde_json::Value) -> Manifest {
    let mut doc = json!({ "name": "app", "version": "1.0.0" });
    doc.as_object_mut()
        .unwrap()
        .extend(deps.as_object().unwrap().clone());
    Manifest::parse(&doc.to_string(), Path::new("package.json")).unwrap()
}

#[test]
fn test_scoped_dependency_boundaries() {
    let manifest = manifest_with(json!({ "dependencies": { "@scope/util": "^1.0.0" } }));
    let matcher = ExternalMatcher::compute(&manifest, &[]).unwrap();

    assert!(matcher.is_external("@scope/util"));
    assert!(matcher.is_external("@scope/util/sub"));
    assert!(matcher.is_external("/repo/node_modules/@scope/util/index.js"));
    assert!(matcher.is_external(r"C:\repo\node_modules\@scope\util\index.js"));
    assert!(!matcher.is_external("@scope/util2"));
    assert!(!matcher.is_external("not-@scope/util"));
}

#[test]
fn test_prefix_is_not_a_match() {
    let manifest = manifest_with(json!({
        "peerDependencies": { "foo": "*" },
        "optionalDependencies": { "fsevents": "*" }
    }));
    let matcher = ExternalMatcher::compute(&manifest, &[]).unwrap();

    assert!(matcher.is_external("foo"));
    assert!(matcher.is_external("fsevents"));
    assert!(!matcher.is_external("foobar"));
    assert!(!matcher.is_external("/repo/node_modules/foobar/index.js"));
}

#[test]
fn test_dev_dependencies_are_bundled() {
    let manifest = manifest_with(json!({ "devDependencies": { "lodash": "*" } }));
    let matcher = ExternalMatcher::compute(&manifest, &[]).unwrap();
    assert!(!matcher.is_external("lodash"));
}

#[test]
fn test_builtins_and_explicit_entries() {
    let manifest = manifest_with(json!({}));
    let explicit = vec!["vue".to_string(), "/^@nuxt[/]/".to_string()];
    let matcher = ExternalMatcher::compute(&manifest, &explicit).unwrap();

    assert!(matcher.is_external("fs"));
    assert!(matcher.is_external("fs/promises"));
    assert!(matcher.is_external("node:path"));
    assert!(matcher.is_external("vue"));
    assert!(!matcher.is_external("vue/server"));
    assert!(matcher.is_external("@nuxt/kit"));
    assert!(!matcher.is_external("./local"));
}

#[test]
fn test_invalid_explicit_pattern() {
    let manifest = manifest_with(json!({}));
    let err = ExternalMatcher::compute(&manifest, &["/(/".to_string()]).unwrap_err();
    assert!(matches!(err, Error::InvalidExternal { .. }));
}

proptest! {
    #[test]
    fn test_dependency_matches_subpaths_but_not_longer_names(
        name in "[a-z][a-z0-9-]{0,10}",
        sub in "[a-z]{1,8}",
        extra in "[a-z0-9]{1,4}",
    ) {
        let manifest = manifest_with(json!({ "dependencies": { name.clone(): "1.0.0" } }));
        let matcher = ExternalMatcher::compute(&manifest, &[]).unwrap();

        prop_assert!(matcher.is_external(&name));
        let subpath = format!("{}/{}", name, sub);
        let abs_path = format!("/w/node_modules/{}/{}.js", name, sub);
        prop_assert!(matcher.is_external(&subpath));
        prop_assert!(matcher.is_external(&abs_path));

        let longer = format!("{}{}", name, extra);
        let builtin = siroc_core::externals::BUILTIN_MODULES.contains(&longer.as_str());
        prop_assert!(builtin || !matcher.is_external(&longer));
    }
}
