//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | EXIF orientation | `image::ImageDecoder::orientation` |
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Subsampled decode (JPEG) | `jpeg-decoder` DCT scaling (1/2, 1/4, 1/8) |
//! | Decode (PNG, TIFF, WebP) | `image` crate, full resolution |
//! | Resize | `image::imageops::resize`, filter from config |
//! | Rotate | `image::imageops::rotate{90,180,270}_in` into a fallibly allocated buffer |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{Orientation, Quality, ResolvedSize};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::metadata::Orientation as ExifOrientation;
use image::{ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat, ImageReader, RgbImage};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use tracing::debug;

/// Default ceiling for a single rotation buffer: 512 MiB.
pub const DEFAULT_MAX_ALLOC: u64 = 512 * 1024 * 1024;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy)]
pub struct RustBackend {
    filter: FilterType,
    max_alloc: u64,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
            max_alloc: DEFAULT_MAX_ALLOC,
        }
    }

    /// Resampling filter used by [`ImageBackend::resize`].
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Largest buffer, in bytes, a rotation may allocate before reporting
    /// [`BackendError::ResourceExhausted`].
    pub fn with_max_alloc(mut self, bytes: u64) -> Self {
        self.max_alloc = bytes;
        self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<BufReader<File>>, BackendError> {
    ImageReader::open(path)
        .map_err(|e| BackendError::Decode(format!("Failed to open {}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| BackendError::Decode(format!("Failed to read {}: {}", path.display(), e)))
}

/// Decode a JPEG through `jpeg-decoder`, letting the IDCT produce the
/// reduced image directly.
///
/// Returns `Ok(None)` for pixel formats that need the `image` crate's colour
/// conversion (16-bit grey, CMYK).
fn decode_jpeg_scaled(path: &Path, sample_factor: u32) -> Result<Option<RgbImage>, BackendError> {
    let decode_err =
        |e: jpeg_decoder::Error| BackendError::Decode(format!("{}: {}", path.display(), e));

    let file = File::open(path).map_err(|e| {
        BackendError::Decode(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
    decoder.read_info().map_err(decode_err)?;
    let info = decoder
        .info()
        .ok_or_else(|| BackendError::Decode(format!("{}: missing JPEG header", path.display())))?;

    let (mut width, mut height) = (info.width, info.height);
    if sample_factor > 1 {
        // The decoder picks the smallest DCT scale that is still >= the request.
        let requested_w = (width as u32).div_ceil(sample_factor).max(1) as u16;
        let requested_h = (height as u32).div_ceil(sample_factor).max(1) as u16;
        (width, height) = decoder.scale(requested_w, requested_h).map_err(decode_err)?;
    }

    let pixels = decoder.decode().map_err(decode_err)?;
    let (width, height) = (width as u32, height as u32);

    let image = match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => RgbImage::from_raw(width, height, pixels),
        jpeg_decoder::PixelFormat::L8 => image::GrayImage::from_raw(width, height, pixels)
            .map(|gray| image::DynamicImage::ImageLuma8(gray).into_rgb8()),
        _ => return Ok(None),
    };

    image.map(Some).ok_or_else(|| {
        BackendError::Decode(format!(
            "{}: decoded buffer does not match {}x{}",
            path.display(),
            width,
            height
        ))
    })
}

/// Use the DCT-scaled result when there is one, otherwise decode in full.
///
/// `jpeg-decoder` rejects some files the `image` crate reads, so a scaled
/// decode error is not final.
fn scaled_or_full(
    path: &Path,
    scaled: Result<Option<RgbImage>, BackendError>,
    full: impl FnOnce() -> Result<RgbImage, BackendError>,
) -> Result<RgbImage, BackendError> {
    match scaled {
        Ok(Some(image)) => return Ok(image),
        Ok(None) => debug!(path = %path.display(), "Pixel format needs a full decode"),
        Err(e) => debug!(
            path = %path.display(),
            error = %e,
            "Scaled JPEG decode failed, falling back to full decode"
        ),
    }
    full()
}

/// Allocate a zeroed RGB buffer, reporting allocation failure instead of aborting.
fn try_alloc_rgb(width: u32, height: u32, max_alloc: u64) -> Result<RgbImage, BackendError> {
    let len = width as u64 * height as u64 * 3;
    if len > max_alloc {
        return Err(BackendError::ResourceExhausted(format!(
            "{width}x{height} buffer needs {len} bytes, limit is {max_alloc}"
        )));
    }
    let len = usize::try_from(len).map_err(|_| {
        BackendError::ResourceExhausted(format!("{width}x{height} buffer exceeds address space"))
    })?;

    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|e| {
        BackendError::ResourceExhausted(format!("{width}x{height} buffer: {e}"))
    })?;
    data.resize(len, 0);

    RgbImage::from_raw(width, height, data).ok_or_else(|| {
        BackendError::ProcessingFailed(format!("{width}x{height} buffer has wrong length"))
    })
}

impl ImageBackend for RustBackend {
    fn read_orientation(&self, path: &Path) -> Result<Orientation, BackendError> {
        let metadata_err =
            |e: image::ImageError| BackendError::Metadata(format!("{}: {}", path.display(), e));

        let reader = ImageReader::open(path)
            .map_err(|e| BackendError::Metadata(format!("{}: {}", path.display(), e)))?
            .with_guessed_format()
            .map_err(|e| BackendError::Metadata(format!("{}: {}", path.display(), e)))?;
        let mut decoder = reader.into_decoder().map_err(metadata_err)?;

        let orientation = match decoder.orientation().map_err(metadata_err)? {
            ExifOrientation::Rotate90 => Orientation::Rotate90,
            ExifOrientation::Rotate180 => Orientation::Rotate180,
            ExifOrientation::Rotate270 => Orientation::Rotate270,
            _ => Orientation::None,
        };
        Ok(orientation)
    }

    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open_reader(path)?.into_dimensions().map_err(|e| {
            BackendError::Decode(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        if width == 0 || height == 0 {
            return Err(BackendError::Decode(format!(
                "{} reports zero size ({}x{})",
                path.display(),
                width,
                height
            )));
        }
        Ok(Dimensions { width, height })
    }

    fn decode_subsampled(
        &self,
        path: &Path,
        sample_factor: u32,
    ) -> Result<RgbImage, BackendError> {
        let reader = open_reader(path)?;
        let is_jpeg = reader.format() == Some(ImageFormat::Jpeg);
        let full_decode = move || {
            reader
                .decode()
                .map(|image| image.into_rgb8())
                .map_err(|e| {
                    BackendError::Decode(format!("Failed to decode {}: {}", path.display(), e))
                })
        };
        if is_jpeg {
            scaled_or_full(path, decode_jpeg_scaled(path, sample_factor), full_decode)
        } else {
            full_decode()
        }
    }

    fn resize(&self, image: &RgbImage, size: ResolvedSize) -> Result<RgbImage, BackendError> {
        if image.dimensions() == (size.width, size.height) {
            return Ok(image.clone());
        }
        Ok(imageops::resize(image, size.width, size.height, self.filter))
    }

    fn rotate(
        &self,
        image: &RgbImage,
        orientation: Orientation,
    ) -> Result<RgbImage, BackendError> {
        let (w, h) = image.dimensions();
        let rotate_err = |e: image::ImageError| BackendError::ProcessingFailed(e.to_string());

        match orientation {
            Orientation::None => Ok(image.clone()),
            Orientation::Rotate90 => {
                let mut out = try_alloc_rgb(h, w, self.max_alloc)?;
                imageops::rotate90_in(image, &mut out).map_err(rotate_err)?;
                Ok(out)
            }
            Orientation::Rotate180 => {
                let mut out = try_alloc_rgb(w, h, self.max_alloc)?;
                imageops::rotate180_in(image, &mut out).map_err(rotate_err)?;
                Ok(out)
            }
            Orientation::Rotate270 => {
                let mut out = try_alloc_rgb(h, w, self.max_alloc)?;
                imageops::rotate270_in(image, &mut out).map_err(rotate_err)?;
                Ok(out)
            }
        }
    }

    fn encode_jpeg(
        &self,
        image: &RgbImage,
        quality: Quality,
        writer: &mut dyn Write,
    ) -> Result<(), BackendError> {
        let encoder = JpegEncoder::new_with_quality(writer, quality.encoder_value());
        encoder
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| match e {
                image::ImageError::IoError(io) => BackendError::Io(io),
                other => BackendError::Encode(other.to_string()),
            })
    }
}
