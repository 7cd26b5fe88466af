use image::{GenericImageView, Luma};
use serde::{Deserialize, Serialize};

use crate::BoundingShape;

/// Region of the deployed camera's view where vehicles pass.
pub const DEFAULT_ROI: BoundingShape = BoundingShape {
    x_min: 1000.0,
    x_max: 1200.0,
    y_min: 650.0,
    y_max: 800.0,
};

/// Fraction of full intensity the ROI must exceed on average.
pub const DEFAULT_INTENSITY_THRESHOLD: f64 = 0.3;

/// Full intensity of an 8 bit mask.
pub const DEFAULT_MAX_INTENSITY: f64 = 255.0;

/// Decides whether a frame shows enough foreground inside a region of interest to be kept.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetentionRule {
    pub roi: BoundingShape,
    pub intensity_threshold: f64,
    pub max_intensity: f64,
}

impl Default for RetentionRule {
    fn default() -> Self {
        Self {
            roi: DEFAULT_ROI,
            intensity_threshold: DEFAULT_INTENSITY_THRESHOLD,
            max_intensity: DEFAULT_MAX_INTENSITY,
        }
    }
}

impl RetentionRule {
    /// The mean mask value that must be exceeded for a frame to be retained.
    pub fn cutoff(&self) -> f64 {
        self.intensity_threshold * self.max_intensity
    }

    pub fn should_retain<I>(&self, mask: &I) -> bool
    where
        I: GenericImageView<Pixel = Luma<u8>>,
    {
        should_retain(mask, &self.roi, self.intensity_threshold, self.max_intensity)
    }
}

/// Mean intensity of the part of `mask` covered by `roi`, or `None` if the ROI
/// does not overlap the mask at all.
pub fn roi_mean_intensity<I>(mask: &I, roi: &BoundingShape) -> Option<f64>
where
    I: GenericImageView<Pixel = Luma<u8>>,
{
    let window = roi.pixel_window(mask.dimensions())?;
    let (x, y, width, height) = window.as_view_args();
    let view = image::imageops::crop_imm(mask, x, y, width, height);

    let sum = view
        .pixels()
        .map(|(_x, _y, Luma([l]))| u64::from(l))
        .sum::<u64>();

    Some(sum as f64 / window.area() as f64)
}

/// True iff the mean mask intensity inside `roi` is strictly greater than
/// `intensity_threshold * max_intensity`.
///
/// The ROI is clamped to the mask. A mask the ROI misses entirely is never retained.
pub fn should_retain<I>(
    mask: &I,
    roi: &BoundingShape,
    intensity_threshold: f64,
    max_intensity: f64,
) -> bool
where
    I: GenericImageView<Pixel = Luma<u8>>,
{
    match roi_mean_intensity(mask, roi) {
        Some(mean) => mean > intensity_threshold * max_intensity,
        None => false,
    }
}
