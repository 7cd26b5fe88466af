use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons why a geometry, centroid, clustering or crop computation could not produce a result.
///
/// None of these are fatal to a pipeline run. The caller decides whether to skip the
/// current frame, log the problem, or give up.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// A rectangle had min > max on some axis, a non-finite coordinate, or was asked
    /// for with a negative size.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The (possibly thresholded) mask has zero total weight, so it has no center of mass.
    #[error("Mask has no foreground weight, centroid is undefined")]
    EmptyMask,

    /// Mask thresholds must be finite and not negative.
    #[error("Invalid mask threshold: {0}")]
    InvalidThreshold(f64),

    /// The requested fraction of the keypoint set rounds down to zero keypoints.
    #[error("Too few keypoints: fraction {fraction} of {available} keypoints keeps none")]
    InsufficientKeypoints { available: usize, fraction: f64 },

    /// Cluster fractions must be finite and greater than zero.
    #[error("Invalid cluster fraction: {0}")]
    InvalidFraction(f64),

    /// The crop window would have zero width or zero height.
    #[error("Degenerate crop: x {x_min}..{x_max}, y {y_min}..{y_max}")]
    DegenerateCrop {
        x_min: i64,
        x_max: i64,
        y_min: i64,
        y_max: i64,
    },

    /// The crop window reaches outside of the image. Happens when keypoints were
    /// detected on an image of a different size.
    #[error("Crop x {x_min}..{x_max}, y {y_min}..{y_max} exceeds image of {width}x{height}")]
    CropOutOfBounds {
        x_min: i64,
        x_max: i64,
        y_min: i64,
        y_max: i64,
        width: u32,
        height: u32,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
