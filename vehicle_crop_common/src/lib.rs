#![allow(clippy::let_and_return)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]

// #![warn(clippy::cast_possible_truncation)]
// #![warn(clippy::cast_precision_loss)]
// #![warn(clippy::cast_sign_loss)]

mod bounding_shape;
pub mod centroid;
mod errors;
pub mod keypoints;
pub mod object_crop;
pub mod retention;


pub use bounding_shape::{center_of, rectangle_around, BoundingShape, PixelWindow};
pub use centroid::centroid;
pub use errors::{Error, Result};
pub use keypoints::{densest_subset, DenseCluster, FastKeypointDetector, Keypoint, KeypointDetector};
pub use object_crop::{cluster_window, crop_to_cluster};
pub use retention::{roi_mean_intensity, should_retain, RetentionRule};
