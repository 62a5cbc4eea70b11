//! Image normalization, in pure Rust.
//!
//! | Step | Crate / function |
//! |---|---|
//! | **Orientation** | `image` decoder EXIF lookup |
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Subsampled decode** | `jpeg-decoder` DCT scaling |
//! | **Scale / rotate** | `image::imageops` |
//! | **Encode** | `image` JPEG encoder |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for size and subsampling math (unit testable)
//! - **Parameters**: Data structures describing a normalization request
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: The pipeline combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{calculate_sample_size, oriented_dimensions, resolve_target_size};
pub use operations::{
    Normalized, encode_to_free_path, encode_to_path, normalize, normalize_to_path,
    read_orientation_or_default,
};
pub use params::{NormalizeRequest, Orientation, Quality, ResolvedSize, TargetSpec};
pub use rust_backend::RustBackend;
