//! Information commands.

use anyhow::Result;
use serde_json::json;

use crate::formatting::{print_package_table, print_section_header, PackageRow, SectionStyle};

use super::Context;

pub async fn cmd_list(ctx: &Context, json: bool) -> Result<()> {
    let root = ctx.root_package().await?;
    let packages = ctx.workspace_packages(&root, &[]).await;

    let rows: Vec<PackageRow> = packages
        .iter()
        .map(|package| PackageRow {
            name: package.name().to_string(),
            version: package.manifest().version.clone(),
            root: match package.root_dir().strip_prefix(root.root_dir()) {
                Ok(p) if p.as_os_str().is_empty() => ".".to_string(),
                Ok(p) => p.display().to_string(),
                Err(_) => package.root_dir().display().to_string(),
            },
            entrypoint: package.entrypoint().map(|p| {
                p.strip_prefix(package.root_dir())
                    .unwrap_or(&p)
                    .display()
                    .to_string()
            }),
        })
        .collect();

    if json {
        let list: Vec<_> = rows
            .iter()
            .map(|row| {
                json!({
                    "name": row.name,
                    "version": row.version,
                    "root": row.root,
                    "entrypoint": row.entrypoint,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    print_section_header("Packages", SectionStyle::Primary);
    print_package_table(&rows);
    Ok(())
}
