//! Synthesis of bundler configurations from a package's manifest.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entrypoint;
use crate::error::{Error, Result};
use crate::externals::ExternalMatcher;
use crate::package::Package;

const BINARY_BANNER: &str = "#!/usr/bin/env node\n";
const ESBUILD_TARGET: &str = "es2018";
const DEFAULT_OUT_DIR: &str = "dist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    Cjs,
    Es,
    Umd,
    Amd,
    Iife,
    System,
}

impl ModuleFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleFormat::Cjs => "cjs",
            ModuleFormat::Es => "es",
            ModuleFormat::Umd => "umd",
            ModuleFormat::Amd => "amd",
            ModuleFormat::Iife => "iife",
            ModuleFormat::System => "system",
        }
    }
}

/// Infers the output format from a filename such as `index.es.js`.
pub fn format_for_name(filename: &str, explicit: Option<ModuleFormat>) -> ModuleFormat {
    if let Some(format) = explicit {
        return format;
    }
    let basename = filename.rsplit('/').next().unwrap_or(filename);
    let qualifiers: Vec<&str> = basename.split('.').skip(1).collect();
    if qualifiers.iter().any(|q| matches!(*q, "es" | "esm" | "mjs" | "module")) {
        ModuleFormat::Es
    } else if qualifiers.contains(&"umd") {
        ModuleFormat::Umd
    } else if qualifiers.contains(&"amd") {
        ModuleFormat::Amd
    } else if qualifiers.contains(&"iife") {
        ModuleFormat::Iife
    } else if qualifiers.contains(&"system") {
        ModuleFormat::System
    } else {
        ModuleFormat::Cjs
    }
}

/// Global name for UMD bundles: `@vue/composition-api` becomes `CompositionApi`.
pub fn umd_name(package_name: &str) -> String {
    let base = package_name.rsplit('/').next().unwrap_or(package_name);
    base.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Output location and file naming for one declared output path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputNames {
    pub dir: PathBuf,
    pub entry_file_names: String,
    pub chunk_file_names: String,
}

/// Directory and file-name patterns for `filename`, or defaults under `dist/`.
pub fn output_names(root_dir: &Path, package_name: &str, filename: Option<&str>, suffix: &str) -> OutputNames {
    match filename {
        Some(filename) => {
            let path = Path::new(filename);
            let base = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            let dir = path.parent().map(|p| root_dir.join(p)).unwrap_or_else(|| root_dir.to_path_buf());
            OutputNames {
                dir,
                chunk_file_names: format!("{}-[name].js", base),
                entry_file_names: base,
            }
        }
        None => OutputNames {
            dir: root_dir.join(DEFAULT_OUT_DIR),
            entry_file_names: format!("{}{}.js", package_name, suffix),
            chunk_file_names: format!("{}-[name]{}.js", package_name, suffix),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_file_names: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_file_names: Option<String>,
    pub format: ModuleFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    pub exports: String,
    pub prefer_const: bool,
}

impl OutputOptions {
    fn named(names: OutputNames, format: ModuleFormat) -> Self {
        Self {
            dir: Some(names.dir),
            file: None,
            entry_file_names: Some(names.entry_file_names),
            chunk_file_names: Some(names.chunk_file_names),
            format,
            name: None,
            banner: None,
            exports: "auto".to_string(),
            prefer_const: format == ModuleFormat::Cjs,
        }
    }

    fn file(file: PathBuf, format: ModuleFormat) -> Self {
        Self {
            dir: None,
            file: Some(file),
            entry_file_names: None,
            chunk_file_names: None,
            format,
            name: None,
            banner: None,
            exports: "auto".to_string(),
            prefer_const: format == ModuleFormat::Cjs,
        }
    }

    /// Path of the entry file this output writes.
    pub fn entry_path(&self) -> Option<PathBuf> {
        match (&self.file, &self.dir, &self.entry_file_names) {
            (Some(file), _, _) => Some(file.clone()),
            (None, Some(dir), Some(name)) => Some(dir.join(name)),
            _ => None,
        }
    }
}

/// A plugin in the bundler chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "options", rename_all = "kebab-case")]
pub enum Plugin {
    Alias {
        entries: IndexMap<String, String>,
    },
    Replace {
        exclude: String,
        delimiters: (String, String),
        values: IndexMap<String, String>,
    },
    NodeResolve(Value),
    Commonjs {
        include: String,
    },
    Esbuild {
        target: String,
        watch: bool,
    },
    Json,
    Dts {
        #[serde(rename = "allowJs")]
        allow_js: bool,
    },
    Custom(PluginSpec),
}

impl Plugin {
    pub fn name(&self) -> &str {
        match self {
            Plugin::Alias { .. } => "alias",
            Plugin::Replace { .. } => "replace",
            Plugin::NodeResolve(_) => "node-resolve",
            Plugin::Commonjs { .. } => "commonjs",
            Plugin::Esbuild { .. } => "esbuild",
            Plugin::Json => "json",
            Plugin::Dts { .. } => "dts",
            Plugin::Custom(spec) => &spec.name,
        }
    }

    /// Rejects configurations the bundler could not honour.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: &str| {
            Err(Error::Plugin {
                plugin: self.name().to_string(),
                message: message.to_string(),
            })
        };
        match self {
            Plugin::Alias { entries } if entries.keys().any(|k| k.is_empty()) => {
                fail("alias entries must not have an empty key")
            }
            Plugin::Replace { values, .. } if values.keys().any(|k| k.is_empty()) => {
                fail("replacement keys must not be empty")
            }
            Plugin::NodeResolve(options) if !options.is_object() => {
                fail("resolve options must be an object")
            }
            Plugin::Esbuild { target, .. } if target.is_empty() => fail("a target is required"),
            Plugin::Custom(spec) if spec.name.trim().is_empty() => {
                fail("additional plugins need a name")
            }
            _ => Ok(()),
        }
    }
}

/// A caller-supplied plugin, passed through to the bundler by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    #[serde(default)]
    pub options: Value,
}

/// Bundler option overrides, from the `rollup` key of a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOptions {
    pub alias: IndexMap<String, String>,
    pub replace: IndexMap<String, String>,
    pub externals: Vec<String>,
    pub dev: bool,
    pub input: Option<String>,
    pub output: Option<String>,
    pub format: Option<ModuleFormat>,
    pub resolve: Option<Value>,
    pub plugins: Vec<PluginSpec>,
    pub node_env: Option<String>,
    #[serde(skip)]
    pub watch: bool,
}

impl BuildOptions {
    fn default_resolve() -> Value {
        serde_json::json!({
            "resolveOnly": ["^((?!node_modules).)*$"],
            "preferBuiltins": true,
        })
    }

    /// Returns the override triple when one is given, rejecting partial ones.
    pub fn override_triple(&self) -> Result<Option<(&str, &str, ModuleFormat)>> {
        match (&self.input, &self.output, self.format) {
            (None, None, None) => Ok(None),
            (Some(input), Some(output), Some(format)) => Ok(Some((input, output, format))),
            (input, output, format) => {
                let missing: Vec<&str> = [
                    ("input", input.is_none()),
                    ("output", output.is_none()),
                    ("format", format.is_none()),
                ]
                .into_iter()
                .filter_map(|(field, absent)| absent.then_some(field))
                .collect();
                Err(Error::PartialOverride {
                    missing: missing.join(", "),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigKind {
    Binary,
    Main,
    Types,
    Export,
    ExportTypes,
    Override,
}

/// One bundler invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    pub kind: ConfigKind,
    pub input: PathBuf,
    pub output: Vec<OutputOptions>,
    pub external: ExternalMatcher,
    pub plugins: Vec<Plugin>,
}

/// Derives the bundler configurations for `package`.
///
/// Binaries come first, then the main outputs, the declaration bundle and a
/// code/declaration pair per additional export. An empty list means there is
/// nothing to build.
pub fn synthesize(package: &Package, options: &BuildOptions) -> Result<Vec<BuildConfig>> {
    let root_dir = package.root_dir();
    let manifest = package.manifest();
    let external = ExternalMatcher::compute(manifest, &options.externals)?;
    let plugins = plugin_chain(options)?;
    let declaration_plugins = vec![Plugin::Json, Plugin::Dts { allow_js: true }];

    if let Some((input, output, format)) = options.override_triple()? {
        return Ok(vec![BuildConfig {
            kind: ConfigKind::Override,
            input: root_dir.join(input),
            output: vec![OutputOptions::file(root_dir.join(output), format)],
            external,
            plugins,
        }]);
    }

    let input = package.entrypoint();
    let binaries = package.binaries();
    let exports = package.exports();
    if input.is_none() && binaries.is_empty() && exports.is_empty() {
        return Ok(Vec::new());
    }

    let name = package.base_name();
    let names = |file: Option<&str>, suffix: &str| output_names(root_dir, &name, file, suffix);
    let mut configs = Vec::new();

    for binary in binaries {
        let Some(source) = binary.entrypoint else {
            continue;
        };
        let mut output = OutputOptions::named(names(Some(&binary.declared), ""), ModuleFormat::Cjs);
        output.banner = Some(BINARY_BANNER.to_string());
        configs.push(BuildConfig {
            kind: ConfigKind::Binary,
            input: source,
            output: vec![output],
            external: external.clone(),
            plugins: plugins.clone(),
        });
    }

    if let Some(input) = &input {
        let mut outputs = vec![OutputOptions::named(
            names(manifest.main.as_deref(), ""),
            ModuleFormat::Cjs,
        )];
        if !options.dev {
            if let Some(module) = &manifest.module {
                outputs.push(OutputOptions::named(names(Some(module), "-es"), ModuleFormat::Es));
            }
            if let Some(browser) = manifest.browser_path() {
                let mut output = OutputOptions::named(names(Some(browser), "-umd"), ModuleFormat::Umd);
                output.name = Some(umd_name(&package.unsuffixed_name()));
                outputs.push(output);
            }
        }
        configs.push(BuildConfig {
            kind: ConfigKind::Main,
            input: input.clone(),
            output: outputs,
            external: external.clone(),
            plugins: plugins.clone(),
        });

        if let Some(types) = &manifest.types {
            configs.push(BuildConfig {
                kind: ConfigKind::Types,
                input: input.clone(),
                output: vec![OutputOptions::file(root_dir.join(types), ModuleFormat::Es)],
                external: external.clone(),
                plugins: declaration_plugins.clone(),
            });
        }
    }

    for export in exports {
        if export.ends_with(".json") {
            continue;
        }
        let Some(source) = entrypoint::resolve(root_dir, Some(&export)) else {
            continue;
        };
        if input.as_ref() == Some(&source) {
            continue;
        }
        let format = format_for_name(&export, None);
        configs.push(BuildConfig {
            kind: ConfigKind::Export,
            input: source.clone(),
            output: vec![OutputOptions::named(names(Some(&export), ""), format)],
            external: external.clone(),
            plugins: plugins.clone(),
        });
        configs.push(BuildConfig {
            kind: ConfigKind::ExportTypes,
            input: source,
            output: vec![OutputOptions::file(
                root_dir.join(declaration_path(&export)),
                ModuleFormat::Es,
            )],
            external: external.clone(),
            plugins: declaration_plugins.clone(),
        });
    }

    Ok(configs)
}

/// `lib/utils.js` becomes `lib/utils.d.ts`.
fn declaration_path(export: &str) -> String {
    let export = export.strip_prefix("./").unwrap_or(export);
    let stem = match export.rfind('.') {
        Some(dot) if !export[dot..].contains('/') => &export[..dot],
        _ => export,
    };
    format!("{}.d.ts", stem)
}

/// The fixed plugin chain followed by caller plugins.
fn plugin_chain(options: &BuildOptions) -> Result<Vec<Plugin>> {
    let mut values = IndexMap::new();
    if let Some(node_env) = &options.node_env {
        values.insert("__NODE_ENV__".to_string(), node_env.clone());
    }
    values.extend(options.replace.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut chain = vec![
        Plugin::Alias {
            entries: options.alias.clone(),
        },
        Plugin::Replace {
            exclude: "node_modules/**".to_string(),
            delimiters: (String::new(), String::new()),
            values,
        },
        Plugin::NodeResolve(
            options
                .resolve
                .clone()
                .unwrap_or_else(BuildOptions::default_resolve),
        ),
        Plugin::Commonjs {
            include: "node_modules".to_string(),
        },
        Plugin::Esbuild {
            target: ESBUILD_TARGET.to_string(),
            watch: options.watch,
        },
        Plugin::Json,
    ];
    chain.extend(options.plugins.iter().cloned().map(Plugin::Custom));

    for plugin in &chain {
        plugin.validate()?;
    }
    Ok(chain)
}
