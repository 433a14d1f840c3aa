mod commands;
mod formatting;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

use commands::Context;

#[derive(Parser)]
#[command(name = "siroc")]
#[command(version)]
#[command(about = "Zero-config build tool for JavaScript and TypeScript monorepos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory to start looking for the root package.json from.
    #[arg(long, global = true, default_value = ".")]
    cwd: PathBuf,

    /// Suffix appended to package names when building.
    #[arg(long, global = true, env = "PACKAGE_SUFFIX")]
    suffix: Option<String>,

    #[arg(long, global = true, env = "NODE_ENV", hide = true)]
    node_env: Option<String>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, global = true, action)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle input files
    Build {
        packages: Vec<String>,
        /// Watch files in bundle and rebuild on changes
        #[arg(short, long, action)]
        watch: bool,
        /// Build development bundle (only CJS)
        #[arg(long, action)]
        dev: bool,
        /// Bundler command that speaks the siroc JSON protocol
        #[arg(long, env = "SIROC_BUNDLER", default_value = "siroc-bundler")]
        bundler: String,
    },
    /// Generate package stubs for quick development
    Dev { packages: Vec<String> },
    /// Generate changelog
    Changelog {
        #[arg(short, long, default_value = "CHANGELOG.md")]
        output: PathBuf,
    },
    /// Run a command or script
    Run {
        file: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Run command in all workspaces
        #[arg(short, long, action)]
        workspaces: bool,
        /// Run sequentially rather than in parallel
        #[arg(short, long, action)]
        sequential: bool,
    },
    /// Publish packages to the registry
    Publish {
        packages: Vec<String>,
        #[arg(long, default_value = "latest")]
        tag: String,
    },
    /// List workspace packages
    List {
        #[arg(long, action)]
        json: bool,
    },
    #[command(external_subcommand)]
    Custom(Vec<String>),
}

/// `PACKAGE_SUFFIX=canary` means names end in `-canary`.
fn normalize_suffix(raw: Option<String>) -> String {
    match raw.as_deref().map(str::trim) {
        None | Some("") => String::new(),
        Some(suffix) => format!("-{}", suffix.trim_start_matches('-')),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let ctx = Context {
        cwd: cli.cwd,
        suffix: normalize_suffix(cli.suffix),
        node_env: cli.node_env,
    };

    match cli.command {
        Commands::Build {
            packages,
            watch,
            dev,
            bundler,
        } => commands::cmd_build(&ctx, packages, watch, dev, &bundler).await?,
        Commands::Dev { packages } => commands::cmd_dev(&ctx, packages).await?,
        Commands::Changelog { output } => commands::cmd_changelog(&ctx, output).await?,
        Commands::Run {
            file,
            args,
            workspaces,
            sequential,
        } => commands::cmd_run(&ctx, file, args, workspaces, sequential).await?,
        Commands::Publish { packages, tag } => commands::cmd_publish(&ctx, packages, &tag).await?,
        Commands::List { json } => commands::cmd_list(&ctx, json).await?,
        Commands::Custom(args) => commands::cmd_custom(&ctx, args).await?,
    }

    Ok(())
}
