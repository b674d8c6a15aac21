//! Geometry resolution
//!
//! Pure functions that turn a [`RequestSpec`] and the current image
//! dimensions into concrete operations: an optional aspect crop, an exact
//! resize target and mirror flags. The explicit crop box is applied by the
//! orchestrator before this resolution runs, so all coordinates here are
//! relative to the image as it currently stands.
//!
//! Rules:
//! - a zero/absent dimension derives from the other preserving aspect
//!   ratio; both zero means no resampling at all (an explicit crop box is
//!   used verbatim);
//! - a negative dimension mirrors that axis and sizes by absolute value;
//! - `fit-in` scales to fit inside the box without cropping; the default
//!   mode crops to the target aspect (aligned, or centered on a detector
//!   focal point) and then resizes to the exact target.

use crate::detection::FocalPoint;
use crate::engine::CropBox;
use crate::request::{HAlign, RequestSpec, VAlign};

/// Concrete operations resolved from a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedGeometry {
    /// Aspect crop to apply before resizing, in current image space
    pub crop: Option<CropBox>,
    /// Exact resample target
    pub resize_to: Option<(u32, u32)>,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// The requested box for fit-in requests, for padding filters
    pub fit_box: Option<(u32, u32)>,
}

/// Resolve a spec against the current image dimensions.
pub fn resolve(
    spec: &RequestSpec,
    current: (u32, u32),
    focal: Option<FocalPoint>,
) -> ResolvedGeometry {
    let (width, height) = current;
    let mut resolved = ResolvedGeometry {
        flip_horizontal: spec.target_width.map_or(false, |w| w < 0),
        flip_vertical: spec.target_height.map_or(false, |h| h < 0),
        ..Default::default()
    };

    if width == 0 || height == 0 {
        return resolved;
    }

    let req_w = spec.target_width.map_or(0, |w| w.unsigned_abs());
    let req_h = spec.target_height.map_or(0, |h| h.unsigned_abs());

    match (req_w, req_h) {
        // No resampling requested; an explicit crop stands verbatim
        (0, 0) => {}
        (w, 0) => {
            let derived = ratio_scaled(height, w, width);
            resolved.resize_to = Some((w, derived));
        }
        (0, h) => {
            let derived = ratio_scaled(width, h, height);
            resolved.resize_to = Some((derived, h));
        }
        (w, h) if spec.fit_in => {
            let scale = f64::min(w as f64 / width as f64, h as f64 / height as f64);
            let fitted_w = ((width as f64 * scale).round() as u32).max(1);
            let fitted_h = ((height as f64 * scale).round() as u32).max(1);
            resolved.resize_to = Some((fitted_w, fitted_h));
            resolved.fit_box = Some((w, h));
        }
        (w, h) => {
            resolved.crop = aspect_crop(width, height, w, h, spec.halign, spec.valign, focal);
            resolved.resize_to = Some((w, h));
        }
    }

    // Resizing to the current dimensions is a no-op
    if resolved.resize_to == Some((width, height)) && resolved.crop.is_none() {
        resolved.resize_to = None;
    }

    resolved
}

/// `base * numerator / denominator`, rounded, at least 1.
fn ratio_scaled(base: u32, numerator: u32, denominator: u32) -> u32 {
    ((base as f64 * numerator as f64 / denominator as f64).round() as u32).max(1)
}

/// Crop window matching the target aspect ratio, positioned by alignment
/// or centered on a focal point.
fn aspect_crop(
    width: u32,
    height: u32,
    target_w: u32,
    target_h: u32,
    halign: HAlign,
    valign: VAlign,
    focal: Option<FocalPoint>,
) -> Option<CropBox> {
    let source_ar = width as f64 / height as f64;
    let target_ar = target_w as f64 / target_h as f64;

    let (crop_w, crop_h) = if source_ar > target_ar {
        ((height as f64 * target_ar).round() as u32, height)
    } else {
        (width, (width as f64 / target_ar).round() as u32)
    };
    let crop_w = crop_w.clamp(1, width);
    let crop_h = crop_h.clamp(1, height);

    if (crop_w, crop_h) == (width, height) {
        return None;
    }

    let (left, top) = match focal {
        Some(point) => (
            centered_offset(point.x, crop_w, width),
            centered_offset(point.y, crop_h, height),
        ),
        None => (
            aligned_offset_h(halign, width, crop_w),
            aligned_offset_v(valign, height, crop_h),
        ),
    };

    Some(CropBox {
        left,
        top,
        right: left + crop_w,
        bottom: top + crop_h,
    })
}

/// Offset that centers a window of `size` on `focus`, clamped into `total`.
fn centered_offset(focus: u32, size: u32, total: u32) -> u32 {
    let half = size / 2;
    focus.saturating_sub(half).min(total - size)
}

fn aligned_offset_h(halign: HAlign, total: u32, size: u32) -> u32 {
    match halign {
        HAlign::Left => 0,
        HAlign::Center => (total - size) / 2,
        HAlign::Right => total - size,
    }
}

fn aligned_offset_v(valign: VAlign, total: u32, size: u32) -> u32 {
    match valign {
        VAlign::Top => 0,
        VAlign::Middle => (total - size) / 2,
        VAlign::Bottom => total - size,
    }
}
