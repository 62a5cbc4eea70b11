//! CLI output formatting.
//!
//! # Output Format
//!
//! ## normalize / finish
//!
//! ```text
//! 4000x3000 → 800x1067 (rotated 90°, decoded at 1/3)
//!     Source: raw/_photo.jpg
//!     Output: file:///home/me/out/1718044800123.jpg
//! ```
//!
//! ## batch
//!
//! ```text
//! 001 ok   800x600   day1/IMG_0001.jpg
//! 002 ok   600x800   day1/IMG_0002.jpg (unrotated)
//! 003 FAIL           day1/IMG_0003.jpg: Decode failed: ...
//!
//! Normalized 2 of 3 photos, 1 failed
//! ```
//!
//! `format_*` functions build the lines and never touch stdout, so tests can
//! assert on them directly. `print_*` wrappers write them out.

use crate::batch::{BatchEvent, BatchSummary, FileReport};
use crate::capture::CaptureResult;
use crate::imaging::{Dimensions, Normalized};
use std::path::Path;

fn rotation_note(degrees: u32, rotated: bool, sample_factor: u32) -> String {
    let mut notes = Vec::new();
    if degrees != 0 {
        if rotated {
            notes.push(format!("rotated {degrees}°"));
        } else {
            notes.push(format!("NOT rotated {degrees}°"));
        }
    }
    if sample_factor > 1 {
        notes.push(format!("decoded at 1/{sample_factor}"));
    }
    if notes.is_empty() {
        String::new()
    } else {
        format!(" ({})", notes.join(", "))
    }
}

/// Lines describing one normalized file.
pub fn format_normalized(
    native: Dimensions,
    normalized: &Normalized,
    source: &Path,
    output: &str,
) -> Vec<String> {
    vec![
        format!(
            "{}x{} → {}x{}{}",
            native.width,
            native.height,
            normalized.image.width(),
            normalized.image.height(),
            rotation_note(
                normalized.orientation.degrees(),
                normalized.rotated,
                normalized.sample_factor
            )
        ),
        format!("    Source: {}", source.display()),
        format!("    Output: {output}"),
    ]
}

/// Lines describing a finished capture.
pub fn format_capture(result: &CaptureResult) -> Vec<String> {
    let mut lines = vec![format!("{}x{} → {}", result.width, result.height, result.uri)];
    if result.unrotated {
        lines.push("    Warning: rotation skipped, photo is in sensor orientation".to_string());
    }
    lines
}

fn report_line(index: usize, source: &Path, result: &Result<FileReport, String>) -> String {
    match result {
        Ok(report) => format!(
            "{:03} ok   {:<10}{}{}",
            index + 1,
            format!("{}x{}", report.width, report.height),
            source.display(),
            if report.unrotated { " (unrotated)" } else { "" }
        ),
        Err(e) => format!("{:03} FAIL {:<10}{}: {}", index + 1, "", source.display(), e),
    }
}

/// One line for a batch progress event. `root` is stripped from the path.
pub fn format_batch_event(event: &BatchEvent, root: &Path) -> String {
    match event {
        BatchEvent::Finished {
            index,
            source,
            result,
        } => {
            let shown = source.strip_prefix(root).unwrap_or(source);
            report_line(*index, shown, result)
        }
    }
}

/// Closing summary for a batch run.
pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    let total = summary.succeeded + summary.failed;
    let mut line = format!("Normalized {} of {} photos", summary.succeeded, total);
    if summary.failed > 0 {
        line.push_str(&format!(", {} failed", summary.failed));
    }
    if summary.unrotated > 0 {
        line.push_str(&format!(", {} left unrotated", summary.unrotated));
    }
    vec![String::new(), line]
}

pub fn print_normalized(native: Dimensions, normalized: &Normalized, source: &Path, output: &str) {
    for line in format_normalized(native, normalized, source, output) {
        println!("{line}");
    }
}

pub fn print_capture(result: &CaptureResult) {
    for line in format_capture(result) {
        println!("{line}");
    }
}

pub fn print_batch_summary(summary: &BatchSummary) {
    for line in format_batch_summary(summary) {
        println!("{line}");
    }
}
