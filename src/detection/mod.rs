//! Smart-crop detector contract
//!
//! Smart cropping centers the crop window on a focal point chosen by a
//! detector instead of plain geometric alignment. The detection algorithms
//! themselves live outside this service; the pipeline only defines the
//! contract and consumes the result. The default [`NoopDetector`] reports
//! no focal point, which makes `smart` requests fall back to aligned
//! cropping.

use crate::engine::ImageHandle;

/// Weighted center of interest in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalPoint {
    pub x: u32,
    pub y: u32,
    /// Relative confidence, used when merging multiple detections
    pub weight: f32,
}

/// A focal-point detector bound into the context.
pub trait Detector: Send + Sync {
    /// Inspect the decoded image and return a focal point, if any.
    fn detect(&self, image: &dyn ImageHandle) -> Option<FocalPoint>;
}

/// Detector that never finds anything.
pub struct NoopDetector;

impl Detector for NoopDetector {
    fn detect(&self, _image: &dyn ImageHandle) -> Option<FocalPoint> {
        None
    }
}
