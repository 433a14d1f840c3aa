//! Core library for building JavaScript and TypeScript monorepos.

pub mod build_config;
pub mod bundler;
pub mod changelog;
pub mod config;
pub mod entrypoint;
pub mod error;
pub mod exec;
pub mod externals;
pub mod hooks;
pub mod manifest;
pub mod orchestrator;
pub mod package;
pub mod parallel;
pub mod vcs;
pub mod version;
pub mod workspace;

pub use build_config::{synthesize, BuildConfig, BuildOptions, ModuleFormat, OutputOptions, Plugin};
pub use bundler::{BuildReport, Bundler, BundlerError, OutputFile, SourceLocation, WatchEvent};
pub use config::{ConfigLoader, ConfigOverrides, ConfigStore, JsonLoader, PackageOptions};
pub use error::{Error, Result};
pub use exec::ExecOutput;
pub use externals::ExternalMatcher;
pub use hooks::{HookName, HookPayload, Hooks};
pub use manifest::{Manifest, ManifestField, Person, PersonDetails};
pub use orchestrator::{BuildFlags, BuildSummary, Orchestrator, Outcome, PackageOutcome, Phase};
pub use package::{Binary, Package, Services};
pub use parallel::run_in_parallel;
pub use vcs::{Git, LogEntry, VersionControl};
pub use workspace::get_workspace_packages;
