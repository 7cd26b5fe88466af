use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use vehicle_crop_common::{
    crop_to_cluster, densest_subset, Error, FastKeypointDetector, KeypointDetector,
};

use crate::definitions::{DEFAULT_CLUSTER_FRACTION, DEFAULT_FAST_THRESHOLD};

/// Options for locating an object in a still image by the density of its keypoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeypointCropOptions {
    /// Fraction of the detected keypoints that the crop must contain. The most
    /// isolated keypoints are discarded first.
    ///
    /// Reccomended range: 0.3-0.9.
    pub fraction: f64,

    /// FAST corner threshold. Higher values find fewer, stronger keypoints.
    pub fast_threshold: u8,
}

impl Default for KeypointCropOptions {
    fn default() -> Self {
        Self {
            fraction: DEFAULT_CLUSTER_FRACTION,
            fast_threshold: DEFAULT_FAST_THRESHOLD,
        }
    }
}

/// Crops an image to the bounding box of its densest cluster of keypoints. Useful
/// when there is no sequence of frames to learn a background from.
#[derive(Debug, Clone)]
pub struct KeypointCropper<D = FastKeypointDetector> {
    detector: D,
    fraction: f64,
}

impl Default for KeypointCropper {
    fn default() -> Self {
        Self::from_options(KeypointCropOptions::default())
    }
}

impl KeypointCropper {
    pub fn from_options(options: KeypointCropOptions) -> Self {
        Self {
            detector: FastKeypointDetector::new(options.fast_threshold),
            fraction: options.fraction,
        }
    }
}

impl<D: KeypointDetector> KeypointCropper<D> {
    pub fn with_detector(detector: D, fraction: f64) -> Self {
        Self { detector, fraction }
    }

    /// Keypoints are detected on a grayscale copy of the image; the crop is taken
    /// from the color image.
    pub fn crop(&self, image: &DynamicImage) -> Result<RgbImage, Error> {
        let gray = image.to_luma8();
        let keypoints = self.detector.detect(&gray);
        log::debug!(target: "keypoint_crop", "detected {} keypoints", keypoints.len());

        let cluster = densest_subset(&keypoints, self.fraction)?;

        let rgb = image.to_rgb8();
        let cropped = crop_to_cluster(&rgb, &cluster)?.to_image();
        Ok(cropped)
    }
}

#[cfg(test)]
mod test {
    use image::{GrayImage, Luma, Rgb};
    use vehicle_crop_common::Keypoint;

    use super::*;

    // a textured square on a plain background
    fn checkerboard_patch() -> RgbImage {
        RgbImage::from_fn(80, 60, |x, y| {
            let in_patch = (30..50).contains(&x) && (20..40).contains(&y);
            if in_patch && ((x / 4) + (y / 4)) % 2 == 0 {
                Rgb([250, 250, 250])
            } else {
                Rgb([20, 20, 20])
            }
        })
    }

    #[test]
    fn test_fixed_detector() {
        let detector = |_: &GrayImage| {
            [(5.0, 5.0), (15.0, 5.0), (5.0, 10.0), (15.0, 10.0), (70.0, 50.0)]
                .into_iter()
                .map(Keypoint::from)
                .collect::<Vec<_>>()
        };
        let cropper = KeypointCropper::with_detector(detector, 0.8);
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 60, Rgb([1, 2, 3])));

        let cropped = cropper.crop(&image).unwrap();
        assert_eq!(cropped.dimensions(), (10, 5));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_grayscale_input() {
        let detector = |gray: &GrayImage| {
            assert_eq!(gray.get_pixel(0, 0), &Luma([77]));
            vec![Keypoint::new(0.0, 0.0), Keypoint::new(3.0, 2.0)]
        };
        let cropper = KeypointCropper::with_detector(detector, 1.0);
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([77])));

        let cropped = cropper.crop(&image).unwrap();
        assert_eq!(cropped.dimensions(), (3, 2));
        assert_eq!(cropped.get_pixel(1, 1), &Rgb([77, 77, 77]));
    }

    #[test]
    fn test_fast_finds_textured_patch() {
        let image = DynamicImage::ImageRgb8(checkerboard_patch());
        let cropped = KeypointCropper::default().crop(&image).unwrap();

        let (width, height) = cropped.dimensions();
        assert!(width <= 20 && height <= 20, "{width}x{height}");
    }

    #[test]
    fn test_plain_image_cannot_be_cropped() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 40, Rgb([9, 9, 9])));
        assert!(matches!(
            KeypointCropper::default().crop(&image),
            Err(Error::DegenerateCrop { .. })
        ));
    }
}
