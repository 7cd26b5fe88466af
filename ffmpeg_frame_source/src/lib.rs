//! Spawns `ffmpeg` to decode a video into a stream of [`image::RgbImage`] frames, and
//! `ffprobe` to find out how large those frames are.
//!
//! Both programs must be installed and callable from the command line.

#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

mod ffmpeg_error_kind;
mod ffmpeg_ops;
mod ffmpeg_stats;

pub use ffmpeg_error_kind::FfmpegError;
pub use ffmpeg_ops::{
    ffmpeg_and_ffprobe_are_callable, get_video_stats, FfmpegFrameIterRgb, FfmpegFrameReaderBuilder,
};
pub use ffmpeg_stats::{VideoInfo, VideoInfoError};
