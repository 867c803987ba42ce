// SPDX-License-Identifier: MIT
//! # Scale Plan Computation
//!
//! Computes the output dimensions for an upload that must fit a bounding box.
//! The resulting [`ScalePlan`] carries the ratio and output size used by
//! [`crate::cpu`].
//!
//! All computations run in `f64` and round to integers. Outputs never exceed the
//! input size and are clamped to a minimum of 1px.

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Bounding box the output must fit
    pub bounds: Size,
    /// Applied scale ratio, always in `(0, 1]`
    pub ratio: f64,
    /// Final computed output dimensions
    pub out: Size,
}

impl ScalePlan {
    /// True when the output has exactly the input dimensions and no resize is needed.
    pub fn is_identity(&self) -> bool {
        self.out == self.input
    }
}

/// Compute a scaling plan from input parameters.
///
/// # Arguments
/// * `input` - Source image dimensions
/// * `bounds` - `maxWidth x maxHeight` box; aspect ratio is preserved
///
/// # Performance
/// O(1) computation with minimal floating-point operations
pub fn build_plan(input: Size, bounds: Size) -> ScalePlan {
    let ratio = fit_ratio(input, bounds);
    let out = if ratio >= 1.0 {
        input
    } else {
        Size {
            w: ((f64::from(input.w) * ratio).round() as u32).max(1),
            h: ((f64::from(input.h) * ratio).round() as u32).max(1),
        }
    };
    ScalePlan {
        input,
        bounds,
        ratio,
        out,
    }
}

/// `min(bw / w, bh / h, 1)`; degenerate inputs yield 1 so nothing is resized.
fn fit_ratio(input: Size, box_: Size) -> f64 {
    if input.w == 0 || input.h == 0 {
        return 1.0;
    }
    let (w, h) = (f64::from(input.w), f64::from(input.h));
    let (bw, bh) = (f64::from(box_.w.max(1)), f64::from(box_.h.max(1)));
    (bw / w).min(bh / h).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(w: u32, h: u32) -> Size {
        Size { w, h }
    }

    #[test]
    fn test_portrait_photo_into_square_box() {
        let plan = build_plan(Size::new(3000, 4000), boxed(1500, 1500));
        assert!((plan.ratio - 0.375).abs() < f64::EPSILON);
        assert_eq!(plan.out, Size::new(1125, 1500));
    }

    #[test]
    fn test_never_upscales() {
        let plan = build_plan(Size::new(800, 600), boxed(1500, 1500));
        assert_eq!(plan.ratio, 1.0);
        assert_eq!(plan.out, Size::new(800, 600));
        assert!(plan.is_identity());
    }

    #[test]
    fn test_exact_fit_is_identity() {
        let plan = build_plan(Size::new(1500, 1500), boxed(1500, 1500));
        assert!(plan.is_identity());
    }

    #[test]
    fn test_rounds_to_nearest_pixel() {
        // r = 1500 / 4001, 3001 * r = 1125.09...
        let plan = build_plan(Size::new(3001, 4001), boxed(1500, 1500));
        assert_eq!(plan.out, Size::new(1125, 1500));

        // 1000 * (1500 / 2999) = 500.17 -> 500
        let plan = build_plan(Size::new(2999, 1000), boxed(1500, 1500));
        assert_eq!(plan.out, Size::new(1500, 500));
    }

    #[test]
    fn test_extreme_aspect_clamps_to_one_pixel() {
        let plan = build_plan(Size::new(100_000, 10), boxed(1000, 1000));
        assert_eq!(plan.out.w, 1000);
        assert_eq!(plan.out.h, 1);
    }

    #[test]
    fn test_output_always_inside_box() {
        let bounds = Size::new(1500, 1500);
        for (w, h) in [(1501, 3), (4000, 3000), (1920, 1080), (7, 9000), (1500, 1501)] {
            let plan = build_plan(Size::new(w, h), bounds);
            assert!(plan.ratio <= 1.0);
            assert!(
                plan.out.w <= bounds.w && plan.out.h <= bounds.h,
                "{w}x{h} -> {:?}",
                plan.out
            );
        }
    }

    #[test]
    fn test_non_square_box_uses_tighter_side() {
        let plan = build_plan(Size::new(1920, 1080), boxed(640, 640));
        assert_eq!(plan.out, Size::new(640, 360));
        let plan = build_plan(Size::new(1920, 1080), boxed(1000, 200));
        assert_eq!(plan.out, Size::new(356, 200));
    }
}
