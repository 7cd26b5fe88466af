use std::{fmt, sync::Arc};

use image::{GrayImage, RgbImage};
use vehicle_crop_common::{
    centroid, cluster_window, densest_subset, rectangle_around, Error, FastKeypointDetector,
    KeypointDetector, PixelWindow,
};

use crate::definitions::{
    DEFAULT_CENTROID_THRESHOLD, DEFAULT_CLUSTER_FRACTION, DEFAULT_CROP_HEIGHT, DEFAULT_CROP_WIDTH,
    DEFAULT_FAST_THRESHOLD,
};

/// How a retained frame and its mask are reduced to the region around the vehicle.
///
/// Both images are always cut to the same window.
#[derive(Clone)]
pub enum CropStrategy {
    /// A `width` x `height` window centered on the center of mass of the mask,
    /// clamped to the frame.
    MaskCentroid {
        width: f64,
        height: f64,
        threshold: f64,
    },

    /// The bounding box of the densest `fraction` of the keypoints found on the
    /// grayscale frame.
    KeypointCluster {
        fraction: f64,
        detector: Arc<dyn KeypointDetector + Send + Sync>,
    },
}

impl CropStrategy {
    pub fn mask_centroid() -> Self {
        Self::MaskCentroid {
            width: DEFAULT_CROP_WIDTH,
            height: DEFAULT_CROP_HEIGHT,
            threshold: DEFAULT_CENTROID_THRESHOLD,
        }
    }

    pub fn keypoint_cluster() -> Self {
        Self::KeypointCluster {
            fraction: DEFAULT_CLUSTER_FRACTION,
            detector: Arc::new(FastKeypointDetector::new(DEFAULT_FAST_THRESHOLD)),
        }
    }

    /// The window both images would be cut to.
    pub fn window(&self, frame: &RgbImage, mask: &GrayImage) -> Result<PixelWindow, Error> {
        match self {
            Self::MaskCentroid {
                width,
                height,
                threshold,
            } => {
                let center = centroid(mask, *threshold)?;
                let shape = rectangle_around(center, *width, *height)?;
                shape
                    .pixel_window(frame.dimensions())
                    .ok_or(Error::DegenerateCrop {
                        x_min: shape.x_min.floor() as i64,
                        x_max: shape.x_max.floor() as i64,
                        y_min: shape.y_min.floor() as i64,
                        y_max: shape.y_max.floor() as i64,
                    })
            }
            Self::KeypointCluster { fraction, detector } => {
                let gray = image::imageops::grayscale(frame);
                let keypoints = detector.detect(&gray);
                let cluster = densest_subset(&keypoints, *fraction)?;
                cluster_window(&cluster, frame.dimensions())
            }
        }
    }

    pub fn apply(&self, frame: &RgbImage, mask: &GrayImage) -> Result<(RgbImage, GrayImage), Error> {
        let (x, y, width, height) = self.window(frame, mask)?.as_view_args();
        let frame = image::imageops::crop_imm(frame, x, y, width, height).to_image();
        let mask = image::imageops::crop_imm(mask, x, y, width, height).to_image();
        Ok((frame, mask))
    }
}

impl fmt::Debug for CropStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaskCentroid {
                width,
                height,
                threshold,
            } => f
                .debug_struct("MaskCentroid")
                .field("width", width)
                .field("height", height)
                .field("threshold", threshold)
                .finish(),
            Self::KeypointCluster { fraction, .. } => f
                .debug_struct("KeypointCluster")
                .field("fraction", fraction)
                .finish_non_exhaustive(),
        }
    }
}
