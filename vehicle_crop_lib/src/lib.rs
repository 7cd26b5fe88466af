#![allow(clippy::let_and_return)]
#![allow(clippy::len_without_is_empty)]
#![warn(clippy::cast_lossless)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::todo)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::unimplemented)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::panic)]
#![allow(clippy::doc_markdown)]

//! # Overview
//! `vehicle_crop_lib` keeps the frames of a traffic camera video that show a passing
//! vehicle, and reduces each of them to a small crop around the vehicle.
//!
//! Every frame is compared against a learned model of the empty scene. The pixels that
//! differ form a foreground mask. A frame is kept when the mask is bright enough, on
//! average, inside a fixed region of interest where vehicles pass. Kept frames (and
//! their masks) are optionally cropped and handed to a [`StorageSink`].
//!
//! # High Level API
//! ```rust
//! use std::convert::Infallible;
//!
//! use image::{Rgb, RgbImage};
//! use vehicle_crop_lib::{
//!     BoundingShape, FramePipeline, PipelineOptions, RetentionRule, RunningGaussianBackground,
//!     VecSink,
//! };
//!
//! // An empty road, then a bright vehicle filling the region of interest.
//! let road = RgbImage::from_pixel(64, 48, Rgb([40, 40, 40]));
//! let mut vehicle = road.clone();
//! for y in 20..40 {
//!     for x in 10..50 {
//!         vehicle.put_pixel(x, y, Rgb([220, 30, 30]));
//!     }
//! }
//! let frames = [road.clone(), road, vehicle].map(Ok::<_, Infallible>);
//!
//! let options = PipelineOptions {
//!     retention: RetentionRule {
//!         roi: BoundingShape::new(20.0, 40.0, 25.0, 35.0).unwrap(),
//!         ..RetentionRule::default()
//!     },
//!     crop: None,
//! };
//!
//! let mut pipeline = FramePipeline::new(
//!     frames,
//!     RunningGaussianBackground::default(),
//!     VecSink::default(),
//!     "north_gate",
//!     options,
//! );
//! let summary = pipeline.run().unwrap();
//!
//! assert_eq!(summary.frames_read, 3);
//! assert_eq!(summary.stored, 1);
//! assert_eq!(pipeline.sink().ids()[0].key(), "3_north_gate");
//! ```
//!
//! # Cropping
//! A [`CropStrategy`] can be set in [`PipelineOptions`] to crop each kept frame, either to a
//! fixed size window around the center of the foreground mask, or to the densest cluster of
//! keypoints in the frame. A frame that cannot be cropped (e.g. its mask has no foreground) is
//! skipped without stopping the run.
//!
//! Still images, which have no background to learn, can be cropped with a [`KeypointCropper`].
//!
//! # Prerequisites
//! With the default `ffmpeg_backend` feature, [`video_frames`] decodes video files by calling
//! Ffmpeg from the command line. You must make Ffmpeg and Ffprobe available on the command line,
//! for example:
//!
//! * Debian-based systems: ```# apt-get install ffmpeg```
//! * Yum-based systems: ```# yum install ffmpeg```

mod definitions;
mod keypoint_crop;
mod pipeline;
#[cfg(feature = "ffmpeg_backend")]
mod video_source;

pub use vehicle_crop_common::{
    center_of, centroid, crop_to_cluster, densest_subset, rectangle_around, should_retain,
    BoundingShape, DenseCluster, Error, FastKeypointDetector, Keypoint, KeypointDetector,
    PixelWindow, RetentionRule,
};

pub use definitions::{
    DEFAULT_CENTROID_THRESHOLD, DEFAULT_CLUSTER_FRACTION, DEFAULT_CROP_HEIGHT, DEFAULT_CROP_WIDTH,
    DEFAULT_DEVIATION_FACTOR, DEFAULT_FAST_THRESHOLD, DEFAULT_INTENSITY_THRESHOLD,
    DEFAULT_LEARNING_RATE, DEFAULT_MAX_INTENSITY, DEFAULT_MIN_DEVIATION, DEFAULT_ROI,
};

pub use keypoint_crop::{KeypointCropOptions, KeypointCropper};

pub use pipeline::{
    background::{BackgroundModel, RunningGaussianBackground},
    post_crop::CropStrategy,
    storage::{DirectorySink, SinkError, SinkFormat, StorageSink, VecSink},
    FrameId, FramePipeline, PipelineError, PipelineOptions, PipelineState, PipelineSummary,
};

#[cfg(feature = "ffmpeg_backend")]
pub use video_source::{stream_name_of, video_frames, DecodeOptions};

#[cfg(feature = "ffmpeg_backend")]
pub use ffmpeg_frame_source::{ffmpeg_and_ffprobe_are_callable, FfmpegError, VideoInfo};
