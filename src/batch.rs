//! Batch normalization of a directory of captures.
//!
//! Every file is an independent pipeline run with its own source, destination
//! and request copy, so files are processed in parallel with
//! [rayon](https://docs.rs/rayon). Nothing is shared between runs except the
//! (stateless) backend and the optional progress channel.
//!
//! Output mirrors the input tree: `in/a/b.jpg` → `out/a/b.jpg`.

use crate::imaging::{BackendError, ImageBackend, NormalizeRequest, normalize_to_path};
use rayon::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Extensions picked up by [`discover`], compared case-insensitively.
pub const INPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Output {} is already produced by {}", .output.display(), .first.display())]
    OutputCollision { output: PathBuf, first: PathBuf },
}

/// Result of normalizing one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
    pub result: Result<FileReport, BatchError>,
}

/// What a successful run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileReport {
    pub width: u32,
    pub height: u32,
    pub degrees: u32,
    pub sample_factor: u32,
    pub unrotated: bool,
}

/// Progress event sent as each file finishes.
#[derive(Debug)]
pub enum BatchEvent {
    Finished {
        index: usize,
        source: PathBuf,
        result: Result<FileReport, String>,
    },
}

/// Aggregate counts over a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub unrotated: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[FileOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut acc, o| {
            match &o.result {
                Ok(report) => {
                    acc.succeeded += 1;
                    if report.unrotated {
                        acc.unrotated += 1;
                    }
                }
                Err(_) => acc.failed += 1,
            }
            acc
        })
    }
}

fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| INPUT_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Find input files under `root`, sorted for stable output.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && has_input_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Normalize every input under `input_root` into `output_root`.
///
/// Per-file failures are collected, not propagated: one corrupt capture does
/// not stop the rest. Outcomes are returned in discovery order.
pub fn run(
    backend: &impl ImageBackend,
    input_root: &Path,
    output_root: &Path,
    request: &NormalizeRequest,
    progress: Option<Sender<BatchEvent>>,
) -> Result<Vec<FileOutcome>, BatchError> {
    let files = discover(input_root)?;
    info!(count = files.len(), root = %input_root.display(), "Batch started");
    let jobs = plan_outputs(files, input_root, output_root);

    let outcomes: Vec<FileOutcome> = jobs
        .into_par_iter()
        .enumerate()
        .map_with(progress, |progress, (index, job)| {
            let result = match job.claimed_by {
                Some(first) => Err(BatchError::OutputCollision {
                    output: job.output.clone(),
                    first,
                }),
                None => process_one(backend, &job.source, &job.output, request)
                    .map_err(BatchError::from),
            };
            if let Err(e) = &result {
                warn!(path = %job.source.display(), error = %e, "Normalization failed");
            }
            let outcome = FileOutcome {
                source: job.source,
                output: job.output,
                result,
            };
            if let Some(tx) = progress {
                // Receiver gone means nobody is listening; results are still returned.
                let _ = tx.send(BatchEvent::Finished {
                    index,
                    source: outcome.source.clone(),
                    result: outcome.result.as_ref().copied().map_err(|e| e.to_string()),
                });
            }
            outcome
        })
        .collect();

    Ok(outcomes)
}

struct Job {
    source: PathBuf,
    output: PathBuf,
    /// Earlier source that maps to the same output, if any.
    claimed_by: Option<PathBuf>,
}

/// Map each source to its mirrored `.jpg` output.
///
/// `a.jpg` and `a.jpeg` in one directory both map to `a.jpg`; the first in
/// discovery order keeps it and later ones are marked as collisions.
fn plan_outputs(files: Vec<PathBuf>, input_root: &Path, output_root: &Path) -> Vec<Job> {
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    files
        .into_iter()
        .map(|source| {
            let relative = source.strip_prefix(input_root).unwrap_or(&source);
            let output = output_root.join(relative).with_extension("jpg");
            let claimed_by = match claimed.entry(output.clone()) {
                Entry::Occupied(first) => Some(first.get().clone()),
                Entry::Vacant(slot) => {
                    slot.insert(source.clone());
                    None
                }
            };
            Job {
                source,
                output,
                claimed_by,
            }
        })
        .collect()
}

fn process_one(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    request: &NormalizeRequest,
) -> Result<FileReport, BackendError> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let normalized = normalize_to_path(backend, source, output, request)?;
    Ok(FileReport {
        width: normalized.image.width(),
        height: normalized.image.height(),
        degrees: normalized.orientation.degrees(),
        sample_factor: normalized.sample_factor,
        unrotated: normalized.is_degraded(),
    })
}
