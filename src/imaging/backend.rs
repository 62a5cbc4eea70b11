//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers the pixel-touching steps of the
//! normalization pipeline: read orientation, identify, subsampled decode,
//! resize, rotate, and JPEG encode. The pipeline in
//! [`operations`](super::operations) only decides *what* to do with those.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust and statically
//! linked.

use super::params::{Orientation, Quality, ResolvedSize};
use image::RgbImage;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Source is unreadable, not an image, or has zero dimensions.
    #[error("Decode failed: {0}")]
    Decode(String),
    /// Orientation metadata could not be read.
    #[error("Metadata read failed: {0}")]
    Metadata(String),
    /// An output buffer could not be allocated.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation. Both sides are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Buffers are passed by reference and new ones returned by value, so the
/// caller decides when the previous stage's raster is dropped.
pub trait ImageBackend: Sync {
    /// Read the EXIF orientation of the file.
    fn read_orientation(&self, path: &Path) -> Result<Orientation, BackendError>;

    /// Get image dimensions from the header, without decoding pixels.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode pixels at roughly `1 / sample_factor` of the native size.
    ///
    /// The result may be larger than requested when the codec has no matching
    /// reduced-resolution mode.
    fn decode_subsampled(&self, path: &Path, sample_factor: u32)
    -> Result<RgbImage, BackendError>;

    /// Resample to exactly `size`.
    fn resize(&self, image: &RgbImage, size: ResolvedSize) -> Result<RgbImage, BackendError>;

    /// Rotate clockwise by `orientation`.
    fn rotate(&self, image: &RgbImage, orientation: Orientation)
    -> Result<RgbImage, BackendError>;

    /// Compress as JPEG into `writer`.
    fn encode_jpeg(
        &self,
        image: &RgbImage,
        quality: Quality,
        writer: &mut dyn Write,
    ) -> Result<(), BackendError>;
}
