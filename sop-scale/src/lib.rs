// SPDX-License-Identifier: MIT
//! # sop-scale: Upload Downscaling for Multimodal Model Input
//!
//! This crate computes how an image should be shrunk before it is attached to an
//! inference request, and performs the resize on the CPU.
//!
//! ## Key Components
//!
//! - [`presets`]: Scale plan computation for bounding-box targets
//! - [`cpu`]: SIMD-accelerated RGBA resize built on `fast_image_resize`
//!
//! ## Rules
//!
//! - The ratio is `min(maxW / w, maxH / h, 1)`, so images are only ever shrunk
//! - Aspect ratio is preserved and every output side is rounded to the nearest pixel
//! - Images already inside the box keep their exact dimensions
//!
//! ## Usage Example
//!
//! ```rust
//! use sop_scale::presets::{build_plan, Size};
//!
//! let plan = build_plan(Size { w: 3000, h: 4000 }, Size { w: 1500, h: 1500 });
//! assert_eq!((plan.out.w, plan.out.h), (1125, 1500));
//! ```

pub mod cpu;
pub mod presets;
