//! Commands that shell out: `run`, `publish` and config-declared commands.

use std::path::Path;

use anyhow::{anyhow, bail, Result};
use owo_colors::OwoColorize;

use siroc_core::exec::{exec_async, exec_interactive};
use siroc_core::{run_in_parallel, Package};

use crate::formatting::{print_error, print_section_header, print_success, SectionStyle};

use super::Context;

/// Shell command for a local script, or the command line as given.
fn resolve_command(cwd: &Path, file: &str, args: &[String]) -> (String, bool) {
    let rest = args.join(" ");
    let is_local = (file.ends_with(".js") || file.ends_with(".ts")) && cwd.join(file).is_file();
    if is_local {
        let path = cwd.join(file);
        let flags = if file.ends_with(".ts") {
            "--experimental-strip-types --no-warnings "
        } else {
            ""
        };
        let command = format!("node {}{} {}", flags, path.display(), rest);
        (command.trim().to_string(), true)
    } else {
        (format!("{} {}", file, rest).trim().to_string(), false)
    }
}

async fn run_command(package: &Package, command: &str, interactive: bool) -> Result<()> {
    if interactive {
        let status = exec_interactive(package.root_dir(), command).await?;
        if !status.success() {
            bail!("`{}` exited with {} in {}", command, status, package.name());
        }
        return Ok(());
    }

    let out = exec_async(package.root_dir(), command, true).await;
    if !out.success {
        bail!("Error running {} in {}\n{}", command, package.name(), out.stderr);
    }
    print_success(&format!("Ran {} in {}.", command.bold(), package.name().bold()));
    if !out.stdout.is_empty() {
        println!("{}", out.stdout.bright_black());
    }
    Ok(())
}

pub async fn cmd_run(
    ctx: &Context,
    file: String,
    args: Vec<String>,
    workspaces: bool,
    sequential: bool,
) -> Result<()> {
    let root = ctx.root_package().await?;
    let cwd = std::env::current_dir()?;
    let (command, interactive) = resolve_command(&cwd, &file, &args);

    let packages = if workspaces {
        ctx.workspace_packages(&root, &[]).await
    } else {
        vec![root]
    };

    let results = if sequential {
        let mut results = Vec::with_capacity(packages.len());
        for package in &packages {
            let result = run_command(package, &command, interactive).await;
            let stop = result.is_err();
            results.push(result);
            if stop {
                break;
            }
        }
        results
    } else {
        run_in_parallel(&packages, |package| run_command(package, &command, interactive)).await
    };

    if let Some(err) = results.into_iter().find_map(Result::err) {
        print_error(&err.to_string());
        std::process::exit(1);
    }
    Ok(())
}

pub async fn cmd_publish(ctx: &Context, packages: Vec<String>, tag: &str) -> Result<()> {
    let root = ctx.root_package().await?;
    let packages = ctx.workspace_packages(&root, &packages).await;

    print_section_header("Publishing packages", SectionStyle::Primary);
    let mut failed = false;
    for package in packages.iter().filter(|p| !p.manifest().is_private()) {
        match package.publish(tag) {
            Ok(_) => print_success(&format!(
                "Published {}@{}",
                package.name(),
                package.manifest().version
            )),
            Err(e) => {
                failed = true;
                print_error(&e.to_string());
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Runs a command declared under `commands` in the root config.
pub async fn cmd_custom(ctx: &Context, args: Vec<String>) -> Result<()> {
    let root = ctx.root_package().await?;
    let (name, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("No command given"))?;
    let Some(command) = root.options().commands.get(name) else {
        let known: Vec<&str> = root.options().commands.keys().map(String::as_str).collect();
        bail!(
            "Unknown command `{}`. Custom commands: {}",
            name,
            if known.is_empty() { "(none)".to_string() } else { known.join(", ") }
        );
    };

    let command = format!("{} {}", command, rest.join(" ")).trim().to_string();
    let status = exec_interactive(root.root_dir(), &command).await?;
    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}
