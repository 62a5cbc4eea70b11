//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use super::params::{ResolvedSize, TargetSpec};

/// Resolve the output size for a capture, preserving the native aspect ratio.
///
/// `native` must already be in display orientation: swap width and height
/// before calling this when the capture is rotated by 90° or 270°.
///
/// - Nothing requested → native size.
/// - Only one side requested → the other side follows the native ratio (rounded).
/// - Both requested → the side that would break the ratio is shrunk (floored),
///   so the result fits the requested box without letterboxing.
///
/// # Examples
/// ```
/// # use shutterprep::imaging::{Dimensions, TargetSpec, resolve_target_size};
/// let native = Dimensions { width: 1600, height: 1200 };
/// let size = resolve_target_size(native, TargetSpec::new(Some(400), Some(400)));
/// assert_eq!((size.width, size.height), (400, 300));
/// ```
pub fn resolve_target_size(native: Dimensions, target: TargetSpec) -> ResolvedSize {
    let (orig_w, orig_h) = (native.width as u64, native.height as u64);

    let (width, height) = match (target.width, target.height) {
        (None, None) => (native.width, native.height),
        (Some(w), None) => {
            let w = w.get();
            let h = (w as f64 * orig_h as f64 / orig_w as f64).round() as u32;
            (w, h)
        }
        (None, Some(h)) => {
            let h = h.get();
            let w = (h as f64 * orig_w as f64 / orig_h as f64).round() as u32;
            (w, h)
        }
        (Some(w), Some(h)) => {
            let (w, h) = (w.get() as u64, h.get() as u64);
            // orig_w / orig_h compared against w / h, cross-multiplied to stay exact
            let orig_side = orig_w * h;
            let new_side = w * orig_h;
            if orig_side > new_side {
                (w as u32, (w * orig_h / orig_w) as u32)
            } else if orig_side < new_side {
                ((h * orig_w / orig_h) as u32, h as u32)
            } else {
                (w as u32, h as u32)
            }
        }
    };

    ResolvedSize {
        width: width.max(1),
        height: height.max(1),
    }
}

/// Integer subsampling factor for decoding `native` down towards `target`.
///
/// The constraining axis is picked by aspect ratio: a source wider than the
/// target is divided along its width, otherwise along its height. Never
/// returns less than 1, so a target larger than the source decodes at full
/// resolution instead of asking the decoder to upsample.
pub fn calculate_sample_size(native: Dimensions, target: ResolvedSize) -> u32 {
    let (src_w, src_h) = (native.width as u64, native.height as u64);
    let (dst_w, dst_h) = (target.width.max(1) as u64, target.height.max(1) as u64);

    let factor = if src_w * dst_h > dst_w * src_h {
        src_w / dst_w
    } else {
        src_h / dst_h
    };

    factor.clamp(1, u32::MAX as u64) as u32
}

/// Dimensions as seen after applying a rotation.
pub fn oriented_dimensions(native: Dimensions, swap: bool) -> Dimensions {
    if swap {
        Dimensions {
            width: native.height,
            height: native.width,
        }
    } else {
        native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn size(width: u32, height: u32) -> ResolvedSize {
        ResolvedSize { width, height }
    }

    fn resolve(native: (u32, u32), w: Option<u32>, h: Option<u32>) -> (u32, u32) {
        let r = resolve_target_size(dims(native.0, native.1), TargetSpec::new(w, h));
        (r.width, r.height)
    }

    // =========================================================================
    // resolve_target_size tests
    // =========================================================================

    #[test]
    fn unset_target_keeps_native() {
        for native in [(4000, 3000), (3000, 4000), (1, 1), (640, 480), (7, 13)] {
            assert_eq!(resolve(native, None, None), native);
        }
    }

    #[test]
    fn width_only_rounds_height() {
        // 3000x4000 portrait, width 800 → 800 * 4000 / 3000 = 1066.67 → 1067
        assert_eq!(resolve((3000, 4000), Some(800), None), (800, 1067));
        // 1600x1200, width 400 → 300 exactly
        assert_eq!(resolve((1600, 1200), Some(400), None), (400, 300));
    }

    #[test]
    fn width_only_preserves_ratio_within_a_pixel() {
        for &(w, h) in &[(4000, 3000), (3024, 4032), (1920, 1080), (333, 777)] {
            for target in [1, 17, 100, 640, 1024, 5000] {
                let (rw, rh) = resolve((w, h), Some(target), None);
                assert_eq!(rw, target);
                let exact = target as f64 * h as f64 / w as f64;
                assert!(
                    (rh as f64 - exact).abs() <= 1.0,
                    "{w}x{h} → width {target}: got height {rh}, exact {exact}"
                );
            }
        }
    }

    #[test]
    fn height_only_rounds_width() {
        // 4000x3000, height 1000 → 1333.33 → 1333
        assert_eq!(resolve((4000, 3000), None, Some(1000)), (1333, 1000));
        // 3000x4000, height 1000 → 750
        assert_eq!(resolve((3000, 4000), None, Some(1000)), (750, 1000));
    }

    #[test]
    fn both_set_wider_source_shrinks_height() {
        // 1600x1200 (1.333) into 400x400 (1.0) → height floor(400*1200/1600) = 300
        assert_eq!(resolve((1600, 1200), Some(400), Some(400)), (400, 300));
    }

    #[test]
    fn both_set_taller_source_shrinks_width() {
        // 3000x4000 (0.75) into 1024x1024 → width floor(1024*3000/4000) = 768
        assert_eq!(resolve((3000, 4000), Some(1024), Some(1024)), (768, 1024));
    }

    #[test]
    fn both_set_uses_floor_not_round() {
        // 1000x700 into 300x300 → height 300*700/1000 = 210 exact
        assert_eq!(resolve((1000, 700), Some(300), Some(300)), (300, 210));
        // 1000x999 into 10x10 → 9.99 floors to 9
        assert_eq!(resolve((1000, 999), Some(10), Some(10)), (10, 9));
    }

    #[test]
    fn both_set_matching_ratio_is_unchanged() {
        assert_eq!(resolve((4000, 3000), Some(800), Some(600)), (800, 600));
        assert_eq!(resolve((1000, 1000), Some(5), Some(5)), (5, 5));
        // larger than the source is kept as requested
        assert_eq!(resolve((400, 300), Some(1600), Some(1200)), (1600, 1200));
    }

    #[test]
    fn both_set_fits_inside_box() {
        for &(w, h) in &[(4000, 3000), (3000, 4000), (1920, 1080), (500, 2000)] {
            for &(bw, bh) in &[(1024, 1024), (800, 600), (300, 900)] {
                let (rw, rh) = resolve((w, h), Some(bw), Some(bh));
                assert!(rw <= bw && rh <= bh, "{w}x{h} in {bw}x{bh} gave {rw}x{rh}");
                assert!(rw == bw || rh == bh, "one side must hit the box");
            }
        }
    }

    #[test]
    fn extreme_ratio_never_resolves_to_zero() {
        assert_eq!(resolve((10000, 1), Some(100), None), (100, 1));
        assert_eq!(resolve((10000, 1), Some(100), Some(100)), (100, 1));
        assert_eq!(resolve((1, 10000), None, Some(10)), (1, 10));
    }

    // =========================================================================
    // calculate_sample_size tests
    // =========================================================================

    #[test]
    fn sample_size_uses_width_for_wider_source() {
        // 4000x3000 (1.33) to 400x400 (1.0) → 4000 / 400 = 10
        assert_eq!(calculate_sample_size(dims(4000, 3000), size(400, 400)), 10);
    }

    #[test]
    fn sample_size_uses_height_for_taller_source() {
        // 3000x4000 to 800x1067 → source marginally wider, 3000 / 800 = 3
        assert_eq!(calculate_sample_size(dims(3000, 4000), size(800, 1067)), 3);
        // 1000x2000 to 500x500 → 2000 / 500 = 4
        assert_eq!(calculate_sample_size(dims(1000, 2000), size(500, 500)), 4);
    }

    #[test]
    fn sample_size_floors() {
        assert_eq!(calculate_sample_size(dims(1000, 1000), size(300, 300)), 3);
        assert_eq!(calculate_sample_size(dims(1000, 1000), size(999, 999)), 1);
    }

    #[test]
    fn sample_size_never_below_one() {
        assert_eq!(calculate_sample_size(dims(400, 300), size(1600, 1200)), 1);
        assert_eq!(calculate_sample_size(dims(400, 300), size(400, 300)), 1);
        assert_eq!(calculate_sample_size(dims(1, 1), size(1, 1)), 1);
    }

    #[test]
    fn sample_size_is_scale_invariant() {
        let cases = [
            ((4000, 3000), (400, 400)),
            ((3000, 4000), (800, 1067)),
            ((1920, 1080), (640, 480)),
            ((123, 457), (20, 33)),
        ];
        for ((sw, sh), (dw, dh)) in cases {
            let base = calculate_sample_size(dims(sw, sh), size(dw, dh));
            for k in [2, 3, 7] {
                let scaled =
                    calculate_sample_size(dims(sw * k, sh * k), size(dw * k, dh * k));
                assert_eq!(scaled, base, "{sw}x{sh} → {dw}x{dh} scaled by {k}");
            }
        }
    }

    // =========================================================================
    // oriented_dimensions tests
    // =========================================================================

    #[test]
    fn oriented_dimensions_swaps_on_request() {
        assert_eq!(oriented_dimensions(dims(4000, 3000), true), dims(3000, 4000));
        assert_eq!(oriented_dimensions(dims(4000, 3000), false), dims(4000, 3000));
    }
}
