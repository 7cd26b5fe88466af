use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::*;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Error)]
pub enum VideoInfoError {
    #[error("Error parsing stats: {0}")]
    JsonError(String),
    #[error("Error parsing stats: {0}")]
    ParseIntError(String),
    #[error("Error parsing stats: {0}")]
    ParseFloatError(String),
    #[error("Unexpected video rotation: {0}")]
    Rotation(String),
}

impl From<serde_json::Error> for VideoInfoError {
    fn from(e: serde_json::Error) -> Self {
        //limit maximum number of characters
        let error_string = format!("{e}").chars().take(500).collect::<String>();
        VideoInfoError::JsonError(error_string)
    }
}

impl From<std::num::ParseIntError> for VideoInfoError {
    fn from(e: std::num::ParseIntError) -> Self {
        VideoInfoError::ParseIntError(format!("{e}"))
    }
}

impl From<std::num::ParseFloatError> for VideoInfoError {
    fn from(e: std::num::ParseFloatError) -> Self {
        VideoInfoError::ParseFloatError(format!("{e}"))
    }
}

// If the video metadata declares a rotation, the raw (x, y) resolution in that metadata
// refers to the unrotated frame. Ffmpeg autorotates decoded frames, so x and y must be
// swapped for 90 and 270 degrees.
#[derive(PartialEq, Eq, Clone, Debug, Copy, Default)]
enum FfmpegVideoRotation {
    #[default]
    Rot0,
    Rot90,
    Rot180,
    Rot270,
}

impl FfmpegVideoRotation {
    fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Rot0),
            90 => Some(Self::Rot90),
            180 => Some(Self::Rot180),
            270 => Some(Self::Rot270),
            _ => None,
        }
    }

    fn swaps_axes(self) -> bool {
        matches!(self, Self::Rot90 | Self::Rot270)
    }
}

/// Some of the video metadata that can be obtained by using ffprobe.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize, Default)]
pub struct VideoInfo {
    duration: std::time::Duration,
    file_size: u64,
    resolution: (u32, u32),
}

impl VideoInfo {
    /// Use ffprobe to get the duration and resolution of a video. If the video contains multiple streams then only information
    /// about the first video stream will be returned.
    ///
    /// # errors
    /// * The file cannot be read or is not recognized as a video by ffprobe
    /// * The output from ffprobe could not be parsed as JSON
    /// * The output from ffprobe contained malformed fields.
    pub fn new<P>(src_path: P) -> Result<Self, FfmpegError>
    where
        P: AsRef<Path>,
    {
        let stats_string = get_video_stats(&src_path)?;
        Ok(Self::from_ffprobe_json(&stats_string)?)
    }

    /// Parse the output of `ffprobe -show_format -show_streams -print_format json`.
    pub fn from_ffprobe_json(stats_string: &str) -> Result<Self, VideoInfoError> {
        let stats_parsed: Value = serde_json::from_str(stats_string)?;

        let duration = match &stats_parsed["format"]["duration"] {
            Value::String(d) => std::time::Duration::from_secs_f64(d.parse::<f64>()?.max(0.0)),
            _ => std::time::Duration::ZERO,
        };

        let file_size = match &stats_parsed["format"]["size"] {
            Value::String(s) => s.parse()?,
            _ => 0,
        };

        let rotation = Self::rotation(&stats_parsed)?;

        let first_width = Self::first_vid_u32(&stats_parsed, "width").unwrap_or(0);
        let first_height = Self::first_vid_u32(&stats_parsed, "height").unwrap_or(0);
        let resolution = if rotation.swaps_axes() {
            (first_height, first_width)
        } else {
            (first_width, first_height)
        };

        Ok(VideoInfo {
            duration,
            file_size,
            resolution,
        })
    }

    /// The duration of the video
    pub fn duration(&self) -> std::time::Duration {
        self.duration
    }

    /// The size of the video in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The resolution of decoded frames in pixels, after ffmpeg has applied any
    /// rotation declared in the video metadata.
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn rotation(stats_parsed: &Value) -> Result<FfmpegVideoRotation, VideoInfoError> {
        let rotation = Self::first_video(stats_parsed).and_then(|video_stream| {
            video_stream
                .get("side_data_list")
                .and_then(|y| y.get(0).and_then(|x| x.get("rotation")))
        });

        //ffprobe reports the rotation as either a JSON string or a JSON number
        let degrees = match rotation {
            None => return Ok(FfmpegVideoRotation::Rot0),
            Some(Value::Number(val)) => val
                .as_i64()
                .ok_or_else(|| VideoInfoError::Rotation(val.to_string()))?,
            Some(Value::String(val)) => val.parse::<i64>()?,
            Some(other) => return Err(VideoInfoError::Rotation(other.to_string())),
        };

        FfmpegVideoRotation::from_degrees(degrees)
            .ok_or_else(|| VideoInfoError::Rotation(degrees.to_string()))
    }

    fn first_video(stats_parsed: &Value) -> Option<&Value> {
        Self::streams_of_type(stats_parsed, "video").next()
    }

    fn streams_of_type<'a>(
        stats_parsed: &'a Value,
        stream_type: &'a str,
    ) -> impl Iterator<Item = &'a Value> + 'a {
        let streams: &[Value] = match &stats_parsed["streams"] {
            Value::Array(streams) => streams.as_slice(),
            _ => &[],
        };

        streams.iter().filter(move |s| match &s["codec_type"] {
            Value::String(codec_type) => codec_type == stream_type,
            _ => false,
        })
    }

    fn first_vid_u32(stats_parsed: &Value, field_name: &str) -> Option<u32> {
        Self::streams_of_type(stats_parsed, "video")
            .filter_map(|stream| stream[field_name].as_u64())
            .find_map(|v| u32::try_from(v).ok())
    }
}
