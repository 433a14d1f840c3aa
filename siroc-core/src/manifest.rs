//! The `package.json` document: typed record, discovery and persistence.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "package.json";

/// Upper bound on parent-directory hops while looking for a manifest.
const MAX_WALK_DEPTH: usize = 128;

pub type Dependencies = IndexMap<String, String>;

/// Key order used by `sort-package-json`, which most of the ecosystem follows.
const CANONICAL_ORDER: &[&str] = &[
    "$schema",
    "name",
    "displayName",
    "version",
    "private",
    "description",
    "categories",
    "keywords",
    "homepage",
    "bugs",
    "repository",
    "funding",
    "license",
    "qna",
    "author",
    "maintainers",
    "contributors",
    "publisher",
    "sideEffects",
    "type",
    "imports",
    "exports",
    "main",
    "svelte",
    "umd:main",
    "jsdelivr",
    "unpkg",
    "module",
    "source",
    "jsnext:main",
    "browser",
    "react-native",
    "types",
    "typesVersions",
    "typings",
    "style",
    "example",
    "examplestyle",
    "assets",
    "bin",
    "man",
    "directories",
    "files",
    "workspaces",
    "binary",
    "scripts",
    "betterScripts",
    "contributes",
    "activationEvents",
    "husky",
    "simple-git-hooks",
    "pre-commit",
    "commitlint",
    "lint-staged",
    "config",
    "nodemonConfig",
    "browserify",
    "babel",
    "browserslist",
    "xo",
    "prettier",
    "eslintConfig",
    "eslintIgnore",
    "npmpackagejsonlint",
    "release",
    "remarkConfig",
    "stylelint",
    "ava",
    "jest",
    "mocha",
    "nyc",
    "tap",
    "resolutions",
    "dependencies",
    "devDependencies",
    "dependenciesMeta",
    "peerDependencies",
    "peerDependenciesMeta",
    "optionalDependencies",
    "bundledDependencies",
    "bundleDependencies",
    "extensionPack",
    "extensionDependencies",
    "flat",
    "packageManager",
    "engines",
    "engineStrict",
    "volta",
    "languageName",
    "os",
    "cpu",
    "preferGlobal",
    "publishConfig",
    "icon",
    "badges",
    "galleryBanner",
    "preview",
    "markdown",
];

/// A person field, either free text (`"Name <email> (url)"`) or structured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Person {
    Text(String),
    Details(PersonDetails),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

static PERSON_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^<(]*[^ <(]").expect("valid regex"));
static PERSON_EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(.*)>").expect("valid regex"));
static PERSON_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((.*)\)").expect("valid regex"));

/// Parses `"Name <email> (url)"`. Every part is optional.
pub fn parse_person(person: &str) -> PersonDetails {
    let capture = |re: &Regex, group: usize| {
        re.captures(person)
            .and_then(|c| c.get(group))
            .map(|m| m.as_str().to_string())
    };
    PersonDetails {
        name: capture(&PERSON_NAME, 0),
        email: capture(&PERSON_EMAIL, 1),
        url: capture(&PERSON_URL, 1),
    }
}

impl Person {
    pub fn details(&self) -> PersonDetails {
        match self {
            Person::Text(text) => parse_person(text),
            Person::Details(details) => details.clone(),
        }
    }
}

/// The `bin` field: a single script or a command-name to script mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bin {
    Single(String),
    Map(IndexMap<String, String>),
}

impl Bin {
    /// Declared script paths, without duplicates.
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Bin::Single(path) => vec![path.as_str()],
            Bin::Map(map) => {
                let mut paths: Vec<&str> = Vec::with_capacity(map.len());
                for path in map.values() {
                    if !paths.contains(&path.as_str()) {
                        paths.push(path);
                    }
                }
                paths
            }
        }
    }
}

/// The `browser` field: an output path or a module replacement map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Browser {
    Path(String),
    Replacements(Map<String, Value>),
}

/// The `workspaces` field, in plain or `{ "packages": [...] }` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    Patterns(Vec<String>),
    Config {
        #[serde(default)]
        packages: Vec<String>,
        #[serde(flatten)]
        rest: Map<String, Value>,
    },
}

impl Workspaces {
    pub fn patterns(&self) -> &[String] {
        match self {
            Workspaces::Patterns(patterns) => patterns,
            Workspaces::Config { packages, .. } => packages,
        }
    }
}

/// The `exports` field: nested conditions, arrays or plain subpaths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Exports {
    Path(String),
    List(Vec<Exports>),
    Map(IndexMap<String, Exports>),
    Excluded,
}

impl Exports {
    /// Every target path declared anywhere in the tree, in document order.
    pub fn targets(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_targets(&mut out);
        out
    }

    fn collect_targets<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Exports::Path(path) => out.push(path),
            Exports::List(items) => items.iter().for_each(|item| item.collect_targets(out)),
            Exports::Map(map) => map.values().for_each(|item| item.collect_targets(out)),
            Exports::Excluded => {}
        }
    }
}

/// Manifest fields that may be copied between packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestField {
    Version,
    Description,
    Keywords,
    License,
    Homepage,
    Repository,
    Bugs,
    Author,
    Contributors,
    Files,
    Engines,
    Dependencies,
    PeerDependencies,
    OptionalDependencies,
}

impl ManifestField {
    fn extra_key(&self) -> Option<&'static str> {
        match self {
            ManifestField::Description => Some("description"),
            ManifestField::Keywords => Some("keywords"),
            ManifestField::License => Some("license"),
            ManifestField::Homepage => Some("homepage"),
            ManifestField::Repository => Some("repository"),
            ManifestField::Bugs => Some("bugs"),
            ManifestField::Engines => Some("engines"),
            _ => None,
        }
    }
}

/// Typed view of a `package.json`.
///
/// Fields the build pipeline reads or rewrites are typed; everything else is
/// kept verbatim in `extra`. The original key order is remembered and reused
/// on write until [`Manifest::sort_keys`] canonicalizes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributors: Option<Vec<Person>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports: Option<Exports>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<Browser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<Bin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Workspaces>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_dependencies: Option<Dependencies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_dependencies: Option<Dependencies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_dependencies: Option<Dependencies>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    key_order: Vec<String>,
}

impl Manifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            author: None,
            contributors: None,
            exports: None,
            main: None,
            module: None,
            browser: None,
            types: None,
            bin: None,
            files: None,
            workspaces: None,
            dependencies: None,
            dev_dependencies: None,
            peer_dependencies: None,
            optional_dependencies: None,
            extra: Map::new(),
            key_order: Vec::new(),
        }
    }

    /// Parses manifest text. `path` is only used for error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let invalid = |message: String| Error::InvalidManifest {
            path: path.to_path_buf(),
            message,
        };
        let document: Value = serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(fields) = document else {
            return Err(invalid("expected a JSON object".to_string()));
        };
        let key_order: Vec<String> = fields.keys().cloned().collect();
        let mut manifest: Manifest =
            serde_json::from_value(Value::Object(fields)).map_err(|e| invalid(e.to_string()))?;
        manifest.key_order = key_order;
        Ok(manifest)
    }

    /// Reads the manifest inside `dir`.
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content, &path)
    }

    /// Reads the manifest inside `dir`, returning `None` when it is missing or unreadable.
    pub fn try_read(dir: &Path) -> Option<Self> {
        Self::read(dir).ok()
    }

    /// Finds the nearest manifest at or above `root`.
    ///
    /// Returns the directory that actually holds the manifest along with it.
    pub fn locate(root: &Path) -> Result<(PathBuf, Self)> {
        let start = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };

        let mut current = start.as_path();
        for _ in 0..MAX_WALK_DEPTH {
            let path = current.join(MANIFEST_FILE);
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    let manifest = Self::parse(&content, &path)?;
                    return Ok((current.to_path_buf(), manifest));
                }
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                    debug!(dir = %current.display(), "no package.json, trying parent");
                }
                Err(e) => return Err(e.into()),
            }

            match current.parent() {
                Some(parent) if parent != current => current = parent,
                _ => break,
            }
        }

        Err(Error::ManifestNotFound { root: start })
    }

    /// Fails unless both `name` and `version` are set.
    pub fn ensure_identity(&self, path: &Path) -> Result<()> {
        let missing: Vec<&str> = [("name", &self.name), ("version", &self.version)]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::InvalidManifest {
            path: path.to_path_buf(),
            message: format!("missing `{}`", missing.join("` and `")),
        })
    }

    /// Serializes the manifest with 2-space indentation and one trailing newline.
    pub fn to_json_string(&self) -> Result<String> {
        let document = self.to_document()?;
        let mut text = serde_json::to_string_pretty(&Value::Object(document))?;
        text.push('\n');
        Ok(text)
    }

    /// Writes the manifest into `dir`, replacing any previous contents.
    pub fn write(&self, dir: &Path) -> Result<()> {
        std::fs::write(dir.join(MANIFEST_FILE), self.to_json_string()?)?;
        Ok(())
    }

    pub async fn write_async(&self, dir: &Path) -> Result<()> {
        let text = self.to_json_string()?;
        tokio::fs::write(dir.join(MANIFEST_FILE), text).await?;
        Ok(())
    }

    fn to_document(&self) -> Result<Map<String, Value>> {
        let fields = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        let mut document = Map::with_capacity(fields.len());
        for key in &self.key_order {
            if let Some(value) = fields.get(key) {
                document.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in fields {
            if !document.contains_key(&key) {
                document.insert(key, value);
            }
        }
        Ok(document)
    }

    /// Reorders every key into the canonical `package.json` order.
    ///
    /// Unknown keys keep their relative order after the known ones.
    pub fn sort_keys(&mut self) -> Result<()> {
        let mut keys: Vec<String> = self.to_document()?.keys().cloned().collect();
        keys.sort_by_key(|key| {
            CANONICAL_ORDER
                .iter()
                .position(|known| known == key)
                .unwrap_or(CANONICAL_ORDER.len())
        });
        self.key_order = keys;
        Ok(())
    }

    /// Alphabetically sorts `dependencies` and `devDependencies`.
    pub fn sort_dependencies(&mut self) {
        for deps in [&mut self.dependencies, &mut self.dev_dependencies]
            .into_iter()
            .flatten()
        {
            deps.sort_keys();
        }
    }

    /// Whether `"private": true` keeps the package off the registry.
    pub fn is_private(&self) -> bool {
        self.extra
            .get("private")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The output path of the `browser` field, when it is a plain path.
    pub fn browser_path(&self) -> Option<&str> {
        match &self.browser {
            Some(Browser::Path(path)) => Some(path),
            _ => None,
        }
    }

    pub fn workspace_patterns(&self) -> Vec<String> {
        self.workspaces
            .as_ref()
            .map(|w| w.patterns().to_vec())
            .unwrap_or_default()
    }

    /// Names of dependencies installed alongside the package.
    pub fn runtime_dependency_names(&self) -> impl Iterator<Item = &str> {
        [
            &self.dependencies,
            &self.optional_dependencies,
            &self.peer_dependencies,
        ]
        .into_iter()
        .flatten()
        .flat_map(|deps| deps.keys().map(String::as_str))
    }

    /// Copies one allow-listed field from `source`.
    pub fn copy_field(&mut self, source: &Manifest, field: ManifestField) {
        if let Some(key) = field.extra_key() {
            match source.extra.get(key) {
                Some(value) => {
                    self.extra.insert(key.to_string(), value.clone());
                }
                None => {
                    self.extra.shift_remove(key);
                }
            }
            return;
        }

        match field {
            ManifestField::Version => self.version = source.version.clone(),
            ManifestField::Author => self.author = source.author.clone(),
            ManifestField::Contributors => self.contributors = source.contributors.clone(),
            ManifestField::Files => self.files = source.files.clone(),
            ManifestField::Dependencies => self.dependencies = source.dependencies.clone(),
            ManifestField::PeerDependencies => {
                self.peer_dependencies = source.peer_dependencies.clone()
            }
            ManifestField::OptionalDependencies => {
                self.optional_dependencies = source.optional_dependencies.clone()
            }
            ManifestField::Description
            | ManifestField::Keywords
            | ManifestField::License
            | ManifestField::Homepage
            | ManifestField::Repository
            | ManifestField::Bugs
            | ManifestField::Engines => {}
        }
    }
}
