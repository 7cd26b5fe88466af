mod densest_subset;
mod fast;

pub use densest_subset::{densest_subset, DenseCluster};
pub use fast::{FastKeypointDetector, KeypointDetector};

use serde::{Deserialize, Serialize};

/// A distinctive image location reported by a feature detector, in image
/// coordinates (x is the column, y is the row).
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// Detector response. Not used for clustering.
    pub score: f32,
}

impl Keypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, score: 0.0 }
    }

    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn same_position(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl From<(f64, f64)> for Keypoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}
