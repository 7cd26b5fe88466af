use image::GrayImage;
use imageproc::corners::corners_fast9;
use serde::{Deserialize, Serialize};

use super::Keypoint;

/// Anything that can find distinctive points in a grayscale image.
pub trait KeypointDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<Keypoint>;
}

/// FAST-9 corner detection. A pixel is a corner when 9 contiguous pixels on the
/// surrounding circle are all brighter or all darker than it by more than `threshold`,
/// so raising the threshold yields fewer keypoints on low contrast detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastKeypointDetector {
    pub threshold: u8,
}

impl FastKeypointDetector {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }
}

impl KeypointDetector for FastKeypointDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<Keypoint> {
        corners_fast9(gray, self.threshold)
            .into_iter()
            .map(|corner| Keypoint {
                x: f64::from(corner.x),
                y: f64::from(corner.y),
                score: corner.score,
            })
            .collect()
    }
}

impl<F> KeypointDetector for F
where
    F: Fn(&GrayImage) -> Vec<Keypoint>,
{
    fn detect(&self, gray: &GrayImage) -> Vec<Keypoint> {
        self(gray)
    }
}

#[cfg(test)]
mod test {
    use image::Luma;

    use super::*;

    fn bright_square_on_dark(size: u32, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let inside = (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y);
            Luma([if inside { 220 } else { 10 }])
        })
    }

    #[test]
    fn test_flat_image_has_no_keypoints() {
        let img = GrayImage::from_pixel(32, 32, Luma([128]));
        assert!(FastKeypointDetector::new(20).detect(&img).is_empty());
    }

    #[test]
    fn test_square_corners_found_near_square() {
        let img = bright_square_on_dark(40, 12, 14, 10);
        let kps = FastKeypointDetector::new(20).detect(&img);

        assert!(!kps.is_empty());
        for kp in &kps {
            assert!((8.0..=26.0).contains(&kp.x), "{kp:?}");
            assert!((10.0..=28.0).contains(&kp.y), "{kp:?}");
        }
    }

    #[test]
    fn test_threshold_above_contrast_finds_nothing() {
        let img = bright_square_on_dark(40, 12, 14, 10);
        assert!(FastKeypointDetector::new(250).detect(&img).is_empty());
    }

    #[test]
    fn test_closure_detector() {
        let fixed = |_: &GrayImage| vec![Keypoint::new(1.0, 2.0)];
        let img = GrayImage::new(4, 4);
        assert_eq!(fixed.detect(&img), vec![Keypoint::new(1.0, 2.0)]);
    }
}
