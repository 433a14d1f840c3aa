//! CLI formatting utilities.
//!
//! Consistent colors and layout for everything the CLI prints itself.
//! Build logs go through `tracing` instead.

mod headers;
mod output;
mod progress;
mod status;
mod tables;

pub use headers::{print_section_header, SectionStyle};
pub use output::{format_duration, print_separator_with_spacing, print_summary_box};
pub use progress::create_spinner;
pub use status::{print_error, print_success, print_warning, Status};
pub use tables::{print_build_table, print_package_table, PackageRow};
