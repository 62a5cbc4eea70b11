//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`operations`](super::operations) pipeline (which
//! decides sizes, factors and rotation) and the [`backend`](super::backend)
//! (which does the actual pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (0–100, default 75). Clamped on construction.
//! - [`Orientation`]: Rotation read from EXIF, restricted to the four upright turns.
//! - [`TargetSpec`]: Caller's requested width/height, each optional.
//! - [`ResolvedSize`]: Final output size after aspect-ratio resolution.
//! - [`NormalizeRequest`]: Everything one pipeline run needs, passed explicitly.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Quality setting for lossy JPEG encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100))
    }

    /// Build from the external contract, where the value arrives as a signed integer.
    pub fn from_raw(value: i64) -> Self {
        Self(value.clamp(0, 100) as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Value handed to the JPEG encoder, whose scale starts at 1.
    pub fn encoder_value(self) -> u8 {
        self.0.max(1) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Rotation needed to display a capture upright.
///
/// Only the four pure rotations are represented. EXIF values that also mirror
/// the image (2, 4, 5, 7) are treated as [`Orientation::None`], matching how
/// camera apps write the tag in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// Map a raw EXIF orientation value (tag 0x0112).
    pub fn from_exif(value: u32) -> Self {
        match value {
            6 => Orientation::Rotate90,
            3 => Orientation::Rotate180,
            8 => Orientation::Rotate270,
            _ => Orientation::None,
        }
    }

    /// Clockwise rotation in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Orientation::None => 0,
            Orientation::Rotate90 => 90,
            Orientation::Rotate180 => 180,
            Orientation::Rotate270 => 270,
        }
    }

    /// Whether applying this rotation exchanges width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Orientation::Rotate90 | Orientation::Rotate270)
    }
}

/// Requested output size. Either, both or neither side may be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetSpec {
    pub width: Option<NonZeroU32>,
    pub height: Option<NonZeroU32>,
}

impl TargetSpec {
    pub fn new(width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            width: width.and_then(NonZeroU32::new),
            height: height.and_then(NonZeroU32::new),
        }
    }

    /// Build from the external contract: any non-positive value means "unset".
    pub fn from_raw(width: i64, height: i64) -> Self {
        let side = |v: i64| u32::try_from(v).ok().and_then(NonZeroU32::new);
        Self {
            width: side(width),
            height: side(height),
        }
    }

    /// Neither side requested.
    pub fn is_unset(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }
}

/// Output dimensions after aspect-ratio resolution. Both sides are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSize {
    pub width: u32,
    pub height: u32,
}

impl ResolvedSize {
    /// The same size with width and height exchanged.
    pub fn transposed(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

/// Parameters for one normalization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizeRequest {
    pub quality: Quality,
    pub target: TargetSpec,
}
