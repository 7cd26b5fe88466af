use std::path::Path;
use std::time::Duration;

use ffmpeg_frame_source::{FfmpegError, FfmpegFrameIterRgb, FfmpegFrameReaderBuilder, VideoInfo};

/// Options for decoding a video file into pipeline frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeOptions {
    /// Subsample to this frame rate (ffmpeg `fps` filter syntax). `None` decodes every frame.
    pub fps: Option<String>,

    /// Skip this far into the video before decoding.
    ///
    /// Unit: Seconds
    pub start_offset: Option<f64>,

    /// Stop after this many frames.
    pub max_frames: Option<u32>,
}

/// Decode `src_path` into RGB frames, ready to be fed into a [`crate::FramePipeline`].
pub fn video_frames(
    src_path: impl AsRef<Path>,
    options: &DecodeOptions,
) -> Result<(FfmpegFrameIterRgb, VideoInfo), FfmpegError> {
    let mut builder = FfmpegFrameReaderBuilder::new(src_path.as_ref());

    if let Some(fps) = &options.fps {
        builder.fps(fps);
    }

    if let Some(offset) = options.start_offset.filter(|o| o.is_finite() && *o > 0.0) {
        builder.start_offset(Duration::from_secs_f64(offset));
    }

    if let Some(max_frames) = options.max_frames {
        builder.num_frames(max_frames);
    }

    builder.spawn_rgb()
}

/// The name frames of a video are stored under: the file name without its extension.
pub fn stream_name_of(src_path: impl AsRef<Path>) -> String {
    let src_path = src_path.as_ref();
    src_path
        .file_stem()
        .unwrap_or(src_path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stream_name() {
        assert_eq!(stream_name_of("/data/cams/north_gate.mp4"), "north_gate");
        assert_eq!(stream_name_of("clip.2024.mkv"), "clip.2024");
        assert_eq!(stream_name_of("no_extension"), "no_extension");
    }
}
