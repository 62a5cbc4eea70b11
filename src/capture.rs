//! Capture session: the boundary between camera plumbing and the pipeline.
//!
//! A capture happens in two halves separated by the camera activity, which
//! may outlive the process that started it:
//!
//! ```text
//! begin(cache_dir, request) ──► PendingCapture ──save──► token.json
//!                                                          │
//!             camera writes <cache_dir>/_photo.jpg         │
//!                                                          ▼
//! complete(backend, Some(&pending), outcome, out) ◄──restore── token.json
//!     │
//!     ├─ Completed → normalize + encode → <out>/<millis>.jpg, raw file deleted
//!     ├─ Cancelled → "No Image Selected"
//!     └─ Failed    → "Did not complete!"
//! ```
//!
//! The [`PendingCapture`] token holds only what is needed to resume: the raw
//! photo path and the request. Nothing else is kept between the halves.
//!
//! Request values arrive in the plugin's wire form: quality as an integer and
//! width/height as integers where `-1` (or any non-positive value) means
//! "don't constrain this side".

use crate::imaging::{
    BackendError, ImageBackend, NormalizeRequest, Quality, TargetSpec, encode_to_free_path,
    normalize,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// File name the camera is told to write to inside the cache directory.
pub const RAW_PHOTO_NAME: &str = "_photo.jpg";

/// Quality used when the caller passes none.
pub const DEFAULT_QUALITY: i64 = 75;
/// Width and height used when the caller passes none.
pub const DEFAULT_EDGE: i64 = 1024;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// No camera activity could be started, or the activation never produced a session.
    #[error("Error no camera")]
    NoCamera,
    #[error("No Image Selected")]
    Cancelled,
    #[error("Did not complete!")]
    Incomplete,
    #[error("Error capturing image: {0}")]
    Processing(#[from] BackendError),
    #[error("Error - empty string argument")]
    EmptyArgument,
    #[error("Error invalid uri: {0}")]
    InvalidUri(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid capture token: {0}")]
    Token(#[from] serde_json::Error),
}

/// Parameters of one capture, as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub quality: Quality,
    pub target: TargetSpec,
}

impl CaptureRequest {
    /// Build from the plugin's integer arguments.
    pub fn from_raw(quality: i64, width: i64, height: i64) -> Self {
        Self {
            quality: Quality::from_raw(quality),
            target: TargetSpec::from_raw(width, height),
        }
    }

    pub fn normalize_request(&self) -> NormalizeRequest {
        NormalizeRequest {
            quality: self.quality,
            target: self.target,
        }
    }
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self::from_raw(DEFAULT_QUALITY, DEFAULT_EDGE, DEFAULT_EDGE)
    }
}

/// How the camera activation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The camera wrote a photo to the pending path.
    Completed,
    /// The user backed out.
    Cancelled,
    /// Any other result code.
    Failed,
}

/// Continuation token persisted while the camera is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCapture {
    pub photo_path: PathBuf,
    pub request: CaptureRequest,
}

impl PendingCapture {
    /// Reserve the raw photo path under `cache_dir`, creating the directory.
    pub fn begin(cache_dir: &Path, request: CaptureRequest) -> Result<Self, CaptureError> {
        fs::create_dir_all(cache_dir)?;
        let photo_path = cache_dir.join(RAW_PHOTO_NAME);
        info!(path = %photo_path.display(), "Capture started");
        Ok(Self {
            photo_path,
            request,
        })
    }

    /// Persist the token as JSON.
    pub fn save(&self, path: &Path) -> Result<(), CaptureError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a token written by [`PendingCapture::save`].
    pub fn restore(path: &Path) -> Result<Self, CaptureError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// A normalized photo that has been written and confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureResult {
    pub uri: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// The source needed a rotation that could not be applied.
    pub unrotated: bool,
}

/// Finish a capture once the camera activation has returned.
///
/// `pending` is `None` when no session survived the activation; that is
/// reported as [`CaptureError::NoCamera`] rather than a panic. On success the
/// raw photo is deleted, and only then. On any failure it is left in place.
pub fn complete(
    backend: &impl ImageBackend,
    pending: Option<&PendingCapture>,
    outcome: ActivationOutcome,
    output_dir: &Path,
) -> Result<CaptureResult, CaptureError> {
    let pending = pending.ok_or(CaptureError::NoCamera)?;
    match outcome {
        ActivationOutcome::Completed => {}
        ActivationOutcome::Cancelled => return Err(CaptureError::Cancelled),
        ActivationOutcome::Failed => return Err(CaptureError::Incomplete),
    }

    let request = pending.request.normalize_request();
    let normalized = normalize(backend, &pending.photo_path, &request)?;

    fs::create_dir_all(output_dir)?;
    let dest = encode_to_free_path(
        backend,
        &normalized.image,
        request.quality,
        output_dir,
        output_names(unix_millis()),
    )?;

    if let Err(e) = discard_source(&pending.photo_path, &dest) {
        warn!(path = %pending.photo_path.display(), error = %e, "Could not delete raw capture");
    }

    let path = absolute(&dest);
    info!(path = %path.display(), "Capture normalized");
    Ok(CaptureResult {
        uri: file_uri(&path),
        width: normalized.image.width(),
        height: normalized.image.height(),
        unrotated: normalized.is_degraded(),
        path,
    })
}

/// Delete a previously returned photo, given its URI or plain path.
pub fn delete_photo(uri: &str) -> Result<(), CaptureError> {
    let path = path_from_uri(uri)?;
    fs::remove_file(&path)?;
    info!(path = %path.display(), "Photo deleted");
    Ok(())
}

/// Remove `source` now that `written` holds its normalized copy.
///
/// When both paths name the same file the output already replaced the
/// source, so nothing is removed. Returns whether a file was deleted.
pub fn discard_source(source: &Path, written: &Path) -> Result<bool, CaptureError> {
    if fs::canonicalize(source)? == fs::canonicalize(written)? {
        warn!(path = %source.display(), "Output replaced the source, not deleting it");
        return Ok(false);
    }
    fs::remove_file(source)?;
    Ok(true)
}

/// Percent-encoded `file://` URI for a path.
pub fn file_uri(path: &Path) -> String {
    let path = absolute(path);
    match Url::from_file_path(&path) {
        Ok(url) => url.into(),
        Err(()) => path.display().to_string(),
    }
}

/// Resolve a `file://` URI or bare path to a filesystem path.
///
/// URIs are percent-decoded. `file://localhost/...` is local; any other host
/// or scheme is rejected.
pub fn path_from_uri(uri: &str) -> Result<PathBuf, CaptureError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(CaptureError::EmptyArgument);
    }
    match Url::parse(uri) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|()| CaptureError::InvalidUri(format!("not a local file: {uri}"))),
        Ok(url) => Err(CaptureError::InvalidUri(format!(
            "unsupported scheme '{}' in {uri}",
            url.scheme()
        ))),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(PathBuf::from(uri)),
        Err(e) => Err(CaptureError::InvalidUri(format!("{uri}: {e}"))),
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// `<millis>.jpg`, then `<millis>-1.jpg`, `<millis>-2.jpg`, ...
fn output_names(millis: u128) -> impl Iterator<Item = String> {
    std::iter::once(format!("{millis}.jpg")).chain((1..).map(move |n| format!("{millis}-{n}.jpg")))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
