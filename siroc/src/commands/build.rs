//! Build and stub commands.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tracing::error;

use siroc_adapters::CommandBundler;
use siroc_core::{run_in_parallel, BuildFlags, Orchestrator};

use crate::formatting::{
    create_spinner, format_duration, print_build_table, print_section_header,
    print_separator_with_spacing, print_success, print_summary_box, print_warning, SectionStyle,
};

use super::Context;

pub async fn cmd_build(
    ctx: &Context,
    packages: Vec<String>,
    watch: bool,
    dev: bool,
    bundler: &str,
) -> Result<()> {
    let start = Instant::now();
    let root = ctx.root_package().await?;
    let mut packages = ctx.workspace_packages(&root, &packages).await;
    if packages.is_empty() {
        print_warning("No packages to build");
        return Ok(());
    }
    let bundler = CommandBundler::from_command_line(bundler)
        .ok_or_else(|| anyhow!("--bundler needs a command to run"))?;

    let title = if watch { "Watching packages" } else { "Building packages" };
    print_section_header(title, SectionStyle::Primary);

    let spinner = (!watch).then(|| create_spinner("Building..."));
    let summary = Orchestrator::new(Arc::new(bundler))
        .with_flags(BuildFlags { watch, dev })
        .run(&mut packages)
        .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    println!();
    let failed = print_build_table(&summary);
    print_separator_with_spacing();
    let duration = format_duration(start.elapsed().as_secs_f64());
    let count = summary.outcomes.len().to_string();
    print_summary_box("Summary", &[("Packages", &count), ("Duration", &duration)]);
    println!();

    if summary.is_watching() {
        print_success("Watching for changes. Press Ctrl-C to stop.");
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| anyhow!("Failed to set signal handler: {}", e))?;
        for watcher in summary.watchers {
            watcher.abort();
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

pub async fn cmd_dev(ctx: &Context, packages: Vec<String>) -> Result<()> {
    let root = ctx.root_package().await?;
    let packages = ctx.workspace_packages(&root, &packages).await;

    print_section_header("Stubbing packages", SectionStyle::Primary);
    let results = run_in_parallel(&packages, |package| async move {
        package.create_stubs().await.map(|_| package.name())
    })
    .await;

    let mut failed = false;
    for result in results {
        match result {
            Ok(name) => print_success(&format!("Stubbed {}", name)),
            Err(e) => {
                failed = true;
                error!("{}", e);
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
