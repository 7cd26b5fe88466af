pub use vehicle_crop_common::retention::{
    DEFAULT_INTENSITY_THRESHOLD, DEFAULT_MAX_INTENSITY, DEFAULT_ROI,
};

/// The default fraction of detected keypoints that make up the dense cluster the
/// object is cropped to. Lower values crop more tightly around the busiest part of
/// the image but are more easily pulled off-center by a textured background.
///
/// Reccomended range: 0.3-0.9.
pub const DEFAULT_CLUSTER_FRACTION: f64 = 0.6;

/// The default size of the window cut out around the center of the foreground mask.
///
/// Unit: Pixels
pub const DEFAULT_CROP_WIDTH: f64 = 400.0;
pub const DEFAULT_CROP_HEIGHT: f64 = 200.0;

/// The default mask threshold used when locating the center of the foreground.
/// 0.0 weights every mask pixel by its intensity.
pub const DEFAULT_CENTROID_THRESHOLD: f64 = 0.0;

/// How quickly the background model adopts changes in the scene (lighting, parked
/// vehicles). Each frame moves the model this fraction of the way towards the new frame.
///
/// Reccomended range: 0.001-0.1.
pub const DEFAULT_LEARNING_RATE: f32 = 0.01;

/// A pixel is foreground when it differs from the modelled background by more than
/// this many standard deviations...
pub const DEFAULT_DEVIATION_FACTOR: f32 = 2.5;

/// ...and by more than this many grey levels, so that a perfectly still scene does
/// not turn sensor noise into foreground.
pub const DEFAULT_MIN_DEVIATION: f32 = 15.0;

/// Minimum brightness difference between a pixel and its surroundings for FAST to
/// report a corner. Higher values yield fewer keypoints.
pub const DEFAULT_FAST_THRESHOLD: u8 = 20;

/// Mask value written for foreground pixels.
pub const FOREGROUND: u8 = 255;
