//! Terminal rendering of sync reports

use console::style;
use ferrosync_sync::{Outcome, Report, ReportEntry};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner fed by the per-entry observer
pub fn create_spinner(quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Comparing trees...");
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Print changed entries, errors and a statistics block
pub fn print_report(report: &Report, dry_run: bool) {
    if let Some(error) = &report.global_error {
        println!("{} {}", style("✗").red().bold(), style(error).red());
        return;
    }

    for entry in report.sorted() {
        if entry.is_noteworthy() {
            println!("  {}", styled_entry(entry));
        }
    }

    let stats = report.stats();
    println!();
    let title = if dry_run {
        "Planned Changes:"
    } else {
        "Sync Statistics:"
    };
    println!("{}", style(title).bold().underlined());
    println!("  Created: {}", style(stats.created).green());
    println!("  Updated: {}", style(stats.content_updated).green());
    println!("  Metadata only: {}", style(stats.metadata_updated).green());
    println!("  Removed: {}", style(stats.removed).yellow());
    println!("  Kept: {}", style(stats.kept).dim());
    println!(
        "  Errors: {}",
        if stats.errors > 0 {
            style(stats.errors).red()
        } else {
            style(stats.errors).green()
        }
    );
    println!("  Bytes: {}", style(format_bytes(stats.bytes)).green());
    println!(
        "  Duration: {}",
        style(format_duration(report.duration)).blue()
    );

    if report.has_errors() {
        println!("{} Sync finished with errors", style("✗").red().bold());
    } else {
        println!("{} Sync completed", style("✓").green());
    }
}

fn styled_entry(entry: &ReportEntry) -> String {
    let path = if entry.left_path.is_empty() {
        "/".to_string()
    } else {
        entry.left_path.clone()
    };
    if let Some(error) = &entry.error {
        return format!("{} {}: {}", style("error").red().bold(), path, error);
    }
    let label = match entry.outcome {
        Outcome::Created => style(entry.outcome.label()).green(),
        Outcome::ContentUpdated | Outcome::MetadataUpdated => style(entry.outcome.label()).cyan(),
        Outcome::Removed => style(entry.outcome.label()).yellow(),
        Outcome::Kept | Outcome::Unchanged => style(entry.outcome.label()).dim(),
    };
    format!("{:<9} {} {}", label, entry.direction, path)
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Human-readable duration
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
