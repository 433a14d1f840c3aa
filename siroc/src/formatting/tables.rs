//! Table formatting utilities using comfy-table.

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use siroc_core::bundler::format_size;
use siroc_core::{BuildSummary, Outcome};

use super::Status;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// One row per package with its outcome. Returns true if any package failed.
pub fn print_build_table(summary: &BuildSummary) -> bool {
    let mut table = new_table(&["Status", "Package", "Outputs", "Details"]);
    let mut failed = false;

    for result in &summary.outcomes {
        let row = match &result.outcome {
            Outcome::Built(reports) => {
                let files: usize = reports.iter().map(|r| r.outputs.len()).sum();
                let size: u64 = reports.iter().map(|r| r.total_size()).sum();
                vec![
                    Cell::new(Status::Success.symbol()).fg(Color::Green),
                    Cell::new(&result.package).fg(Color::White),
                    Cell::new(files),
                    Cell::new(format_size(size)).fg(Color::DarkGrey),
                ]
            }
            Outcome::Skipped => vec![
                Cell::new(Status::Info.symbol()).fg(Color::Cyan),
                Cell::new(&result.package).fg(Color::White),
                Cell::new("-"),
                Cell::new("build disabled").fg(Color::DarkGrey),
            ],
            Outcome::Watching => vec![
                Cell::new(Status::Info.symbol()).fg(Color::Cyan),
                Cell::new(&result.package).fg(Color::White),
                Cell::new("-"),
                Cell::new("watching").fg(Color::DarkGrey),
            ],
            Outcome::Failed { phase, message } => {
                failed = true;
                vec![
                    Cell::new(Status::Error.symbol()).fg(Color::Red),
                    Cell::new(&result.package).fg(Color::Red),
                    Cell::new(phase.to_string()).fg(Color::Red),
                    Cell::new(message).fg(Color::Red),
                ]
            }
        };
        table.add_row(row);
    }

    println!("{}", table);
    failed
}

pub struct PackageRow {
    pub name: String,
    pub version: String,
    pub root: String,
    pub entrypoint: Option<String>,
}

pub fn print_package_table(rows: &[PackageRow]) {
    let mut table = new_table(&["Package", "Version", "Directory", "Entrypoint"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.name).fg(Color::White),
            Cell::new(&row.version).fg(Color::Cyan),
            Cell::new(&row.root).fg(Color::DarkGrey),
            Cell::new(row.entrypoint.as_deref().unwrap_or("-")).fg(Color::DarkGrey),
        ]);
    }
    println!("{}", table);
}
