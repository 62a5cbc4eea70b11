//! # shutterprep
//!
//! Turns a raw camera capture into a small, upright JPEG.
//!
//! Phone and camera sensors write photos in sensor orientation and record the
//! real orientation in EXIF. shutterprep reads that tag, decodes the photo at
//! the smallest resolution that still covers the requested size, scales it to
//! fit, physically rotates the pixels, and re-encodes. The output needs no
//! EXIF to display correctly.
//!
//! ```text
//! orientation → probe → resolve size → pick sample factor
//!     → subsampled decode → scale → rotate → encode (atomic)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | The pipeline: size math, the [`imaging::ImageBackend`] seam, the pure-Rust backend |
//! | [`capture`] | Capture session: continuation token, completion, photo deletion, `file://` URIs |
//! | [`batch`] | Parallel normalization of a directory tree |
//! | [`config`] | `shutterprep.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Failure Policy
//!
//! Missing or corrupt orientation metadata is treated as "no rotation". A
//! rotation that cannot get its buffer returns the photo unrotated instead of
//! failing the capture. Everything else (unreadable source, failed encode) is
//! an error, and an error never leaves a partial file at the destination.
//!
//! # Memory
//!
//! Full-resolution captures are never decoded when a smaller size was asked
//! for: JPEG sources are DCT-scaled during decode, and each pipeline stage
//! drops its input buffer as soon as its output exists.

pub mod batch;
pub mod capture;
pub mod config;
pub mod imaging;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
