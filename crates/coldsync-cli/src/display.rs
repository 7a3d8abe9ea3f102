//! Human-readable run summaries

use coldsync_sync::{SyncMode, SyncReport};
use console::style;
use std::time::Duration;

/// Print the end-of-run summary with every failure itemized
pub fn print_report(report: &SyncReport) {
    let stats = &report.transfer.stats;

    println!();
    println!(
        "{}",
        style(format!("{} summary:", mode_name(report.mode)))
            .bold()
            .underlined()
    );
    println!("  Run: {}", style(report.run_id).dim());
    println!("  Planned: {}", style(report.planned.len()).cyan());

    if report.dry_run {
        for path in &report.planned {
            println!("    {} {}", style("+").green(), path);
        }
        println!(
            "{} Dry run - nothing was transferred",
            style("ℹ").blue().bold()
        );
        return;
    }

    if report.skipped > 0 {
        println!(
            "  Skipped (not archived): {}",
            style(report.skipped).yellow()
        );
    }
    println!("  Succeeded: {}", style(stats.succeeded).green());
    println!(
        "  Failed: {}",
        if stats.failed > 0 {
            style(stats.failed).red()
        } else {
            style(stats.failed).green()
        }
    );
    println!(
        "  Bytes transferred: {}",
        style(format_bytes(stats.bytes_transferred)).green()
    );
    println!(
        "  Duration: {}",
        style(format_duration(report.duration)).blue()
    );
    println!(
        "  Transfer rate: {}",
        style(format!(
            "{:.2} MB/s",
            stats.transfer_rate() / 1024.0 / 1024.0
        ))
        .blue()
    );

    if !report.transfer.failures.is_empty() {
        println!();
        println!("{}", style("Failures:").red().bold());
        for failure in &report.transfer.failures {
            println!(
                "  {} {} ({:?}): {}",
                style("✗").red(),
                style(&failure.logical_path).cyan(),
                failure.kind,
                failure.error
            );
        }
    } else {
        println!("{} All transfers completed", style("✓").green().bold());
    }
}

fn mode_name(mode: SyncMode) -> &'static str {
    match mode {
        SyncMode::BackupFlat => "Flat backup",
        SyncMode::BackupGrouped => "Grouped backup",
        SyncMode::Restore => "Restore",
        SyncMode::RestoreArchive => "Archive restore",
        SyncMode::RestoreRequest => "Restore request",
    }
}

/// Format bytes in human-readable format
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

/// Format duration in human-readable format
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
