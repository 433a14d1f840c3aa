use std::path::PathBuf;

use anyhow::{Context as _, Result};

use siroc_core::changelog::generate_changelog;

use crate::formatting::print_success;

use super::Context;

pub async fn cmd_changelog(ctx: &Context, output: PathBuf) -> Result<()> {
    let root = ctx.root_package().await?;
    let known_authors: Vec<String> = root
        .contributors()
        .into_iter()
        .filter_map(|person| person.name)
        .collect();

    let changelog = generate_changelog(root.services().vcs.as_ref(), &known_authors).await;
    print!("\n\n{}\n\n", changelog);

    let path = root.resolve_path(&output);
    tokio::fs::write(&path, &changelog)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    print_success(&format!("Wrote {}", path.display()));
    Ok(())
}
