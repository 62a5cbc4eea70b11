//! High-level image operations.
//!
//! These functions combine calculations with backend execution: they take a
//! request, compute sizes and factors, and drive the backend through
//! orientation → probe → decode → scale → rotate, then encode.
//!
//! Two failures are absorbed here rather than returned: unreadable
//! orientation metadata (treated as upright) and a rotation that cannot get
//! its buffer (the scaled, unrotated image is returned instead). Everything
//! else propagates.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{calculate_sample_size, oriented_dimensions, resolve_target_size};
use super::params::{NormalizeRequest, Orientation, Quality, ResolvedSize};
use image::RgbImage;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Output of [`normalize`]: the final raster plus how it was produced.
#[derive(Debug)]
pub struct Normalized {
    pub image: RgbImage,
    pub orientation: Orientation,
    pub sample_factor: u32,
    /// Display-orientation size the pipeline aimed for.
    pub size: ResolvedSize,
    /// False when a rotation was needed but could not be applied.
    pub rotated: bool,
}

impl Normalized {
    /// Whether the output is missing a rotation the source asked for.
    pub fn is_degraded(&self) -> bool {
        self.orientation != Orientation::None && !self.rotated
    }
}

/// Read the orientation, treating any metadata failure as upright.
pub fn read_orientation_or_default(backend: &impl ImageBackend, path: &Path) -> Orientation {
    match backend.read_orientation(path) {
        Ok(orientation) => orientation,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Error reading exif data, assuming upright");
            Orientation::None
        }
    }
}

/// Decode, downscale and rotate `source` according to `request`.
///
/// Fails with [`BackendError::Decode`] when the source cannot be probed or
/// decoded. Orientation and rotation failures degrade instead of failing.
pub fn normalize(
    backend: &impl ImageBackend,
    source: &Path,
    request: &NormalizeRequest,
) -> Result<Normalized> {
    let orientation = read_orientation_or_default(backend, source);
    let native = backend.identify(source)?;
    let swapped = orientation.swaps_dimensions();

    let display = oriented_dimensions(native, swapped);
    let size = resolve_target_size(display, request.target);
    let sample_factor = calculate_sample_size(display, size);
    debug!(
        path = %source.display(),
        native_w = native.width,
        native_h = native.height,
        degrees = orientation.degrees(),
        target_w = size.width,
        target_h = size.height,
        sample_factor,
        "Normalizing capture"
    );

    let decoded = backend.decode_subsampled(source, sample_factor)?;
    debug!(
        width = decoded.width(),
        height = decoded.height(),
        "Decoded subsampled"
    );

    // Scale happens in sensor orientation; rotation is applied afterwards.
    let decode_space = if swapped { size.transposed() } else { size };
    let scaled = backend.resize(&decoded, decode_space)?;
    drop(decoded);

    if orientation == Orientation::None {
        return Ok(Normalized {
            image: scaled,
            orientation,
            sample_factor,
            size,
            rotated: false,
        });
    }

    match backend.rotate(&scaled, orientation) {
        Ok(rotated) => {
            drop(scaled);
            Ok(Normalized {
                image: rotated,
                orientation,
                sample_factor,
                size,
                rotated: true,
            })
        }
        Err(BackendError::ResourceExhausted(reason)) => {
            warn!(
                path = %source.display(),
                degrees = orientation.degrees(),
                %reason,
                "Rotation skipped, returning unrotated image"
            );
            Ok(Normalized {
                image: scaled,
                orientation,
                sample_factor,
                size,
                rotated: false,
            })
        }
        Err(e) => Err(e),
    }
}

/// Encode `image` into a hidden temporary file inside `dir`.
///
/// The file is flushed and synced; dropping it without persisting removes it.
fn encode_to_temp(
    backend: &impl ImageBackend,
    image: &RgbImage,
    quality: Quality,
    dir: &Path,
) -> Result<NamedTempFile> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".shutterprep-")
        .suffix(".part")
        .tempfile_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        backend.encode_jpeg(image, quality, &mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Encode `image` as JPEG and place it at `dest`, replacing any existing file.
///
/// Bytes go to a temporary file next to `dest`, which is renamed into place
/// only once the encoder and the flush have both succeeded. On error nothing
/// exists at `dest`.
pub fn encode_to_path(
    backend: &impl ImageBackend,
    image: &RgbImage,
    quality: Quality,
    dest: &Path,
) -> Result<()> {
    let tmp = encode_to_temp(backend, image, quality, parent_dir(dest))?;
    tmp.persist(dest).map_err(|e| BackendError::Io(e.error))?;

    debug!(
        path = %dest.display(),
        width = image.width(),
        height = image.height(),
        quality = quality.value(),
        "Wrote JPEG"
    );
    Ok(())
}

/// Encode `image` once and link it under the first of `names` (inside `dir`)
/// that does not exist yet. Existing files are never replaced.
///
/// Returns the path written. Fails with an `AlreadyExists` IO error when
/// every name is taken.
pub fn encode_to_free_path<I>(
    backend: &impl ImageBackend,
    image: &RgbImage,
    quality: Quality,
    dir: &Path,
    names: I,
) -> Result<PathBuf>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    let mut tmp = encode_to_temp(backend, image, quality, dir)?;
    for name in names {
        let dest = dir.join(name);
        match tmp.persist_noclobber(&dest) {
            Ok(_) => {
                debug!(path = %dest.display(), "Wrote JPEG");
                return Ok(dest);
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => tmp = e.file,
            Err(e) => return Err(BackendError::Io(e.error)),
        }
    }
    Err(BackendError::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free output name in {}", dir.display()),
    )))
}

/// Normalize `source` and write the result to `dest` in one step.
pub fn normalize_to_path(
    backend: &impl ImageBackend,
    source: &Path,
    dest: &Path,
    request: &NormalizeRequest,
) -> Result<Normalized> {
    let normalized = normalize(backend, source, request)?;
    encode_to_path(backend, &normalized.image, request.quality, dest)?;
    Ok(normalized)
}
