use image::{GrayImage, Luma, RgbImage};

use crate::definitions::{
    DEFAULT_DEVIATION_FACTOR, DEFAULT_LEARNING_RATE, DEFAULT_MIN_DEVIATION, FOREGROUND,
};

/// Separates moving foreground from a learned background, one frame at a time.
///
/// The returned mask has the dimensions of `frame`. Implementations usually update
/// their model with every frame they see.
pub trait BackgroundModel {
    fn apply(&mut self, frame: &RgbImage) -> GrayImage;
}

impl<F> BackgroundModel for F
where
    F: FnMut(&RgbImage) -> GrayImage,
{
    fn apply(&mut self, frame: &RgbImage) -> GrayImage {
        self(frame)
    }
}

/// Per-pixel running Gaussian model of luminance.
///
/// Each pixel tracks an exponentially weighted mean and variance. A pixel is
/// foreground when it is further from its mean than both `deviation_factor`
/// standard deviations and `min_deviation` grey levels.
#[derive(Debug, Clone)]
pub struct RunningGaussianBackground {
    learning_rate: f32,
    deviation_factor: f32,
    min_deviation: f32,
    dimensions: (u32, u32),
    mean: Vec<f32>,
    variance: Vec<f32>,
}

impl Default for RunningGaussianBackground {
    fn default() -> Self {
        Self::new(
            DEFAULT_LEARNING_RATE,
            DEFAULT_DEVIATION_FACTOR,
            DEFAULT_MIN_DEVIATION,
        )
    }
}

impl RunningGaussianBackground {
    pub fn new(learning_rate: f32, deviation_factor: f32, min_deviation: f32) -> Self {
        Self {
            learning_rate: learning_rate.clamp(0.0, 1.0),
            deviation_factor: deviation_factor.max(0.0),
            min_deviation: min_deviation.max(0.0),
            dimensions: (0, 0),
            mean: vec![],
            variance: vec![],
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Forget everything learned so far. The next frame seeds a new model.
    pub fn reset(&mut self) {
        self.dimensions = (0, 0);
        self.mean.clear();
        self.variance.clear();
    }

    fn is_seeded_for(&self, dimensions: (u32, u32)) -> bool {
        !self.mean.is_empty() && self.dimensions == dimensions
    }

    fn seed(&mut self, luma: &GrayImage) {
        self.dimensions = luma.dimensions();
        self.mean = luma.as_raw().iter().map(|&l| f32::from(l)).collect();
        self.variance = vec![0.0; self.mean.len()];
    }
}

impl BackgroundModel for RunningGaussianBackground {
    fn apply(&mut self, frame: &RgbImage) -> GrayImage {
        let luma = image::imageops::grayscale(frame);
        let (width, height) = luma.dimensions();

        if !self.is_seeded_for((width, height)) {
            if !self.mean.is_empty() {
                log::debug!(
                    target: "background",
                    "frame size changed from {:?} to {:?}, resetting background model",
                    self.dimensions,
                    (width, height)
                );
            }
            self.seed(&luma);
            return GrayImage::new(width, height);
        }

        let lr = self.learning_rate;
        let mut mask = GrayImage::new(width, height);
        let cells = self.mean.iter_mut().zip(self.variance.iter_mut());
        for ((&l, (mean, variance)), out) in luma.as_raw().iter().zip(cells).zip(mask.pixels_mut()) {
            let diff = f32::from(l) - *mean;
            let allowed = (self.deviation_factor * variance.sqrt()).max(self.min_deviation);
            if diff.abs() > allowed {
                *out = Luma([FOREGROUND]);
            }

            *mean += lr * diff;
            *variance = (1.0 - lr) * *variance + lr * diff * diff;
        }

        mask
    }
}
