use std::path::PathBuf;

use thiserror::Error;
use vehicle_crop_lib::{FfmpegError, PipelineError, SinkError};

#[derive(Error, Debug)]
pub enum AppError {
    /////////////////////////////////
    //video processing
    #[error("ffmpeg and ffprobe could not be run. Make sure they are installed and on the PATH")]
    FfmpegNotFound,

    #[error("Failed to start decoding {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: FfmpegError,
    },

    #[error("Failed to process {}: {source}", .path.display())]
    Pipeline {
        path: PathBuf,
        #[source]
        source: PipelineError,
    },

    #[error("Failed to prepare output directory: {0}")]
    Sink(#[from] SinkError),

    #[error("{failed} of {total} videos could not be processed")]
    VideosFailed { failed: usize, total: usize },

    /////////////////////////////////
    //still images
    #[error("Failed to load image {}: {source}", .path.display())]
    LoadImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to locate an object in {}: {source}", .path.display())]
    Crop {
        path: PathBuf,
        #[source]
        source: vehicle_crop_lib::Error,
    },

    #[error("Failed to save image {}: {source}", .path.display())]
    SaveImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub fn print_error_and_quit(e: eyre::Report) -> ! {
    #[allow(clippy::print_stderr)]
    let () = eprintln!("{:?}", e);
    std::process::exit(1);
}

#[cfg(test)]
mod test {
    use image::RgbImage;
    use vehicle_crop_lib::*;

    use super::*;

    #[test]
    fn test_pipeline_error_names_frame_and_cause() {
        let frames: Vec<Result<RgbImage, FfmpegError>> = vec![
            Ok(RgbImage::new(4, 4)),
            Err(FfmpegError::FfmpegInternal("corrupt packet".to_string())),
        ];
        let mut pipeline = FramePipeline::new(
            frames,
            |frame: &RgbImage| image::GrayImage::new(frame.width(), frame.height()),
            VecSink::default(),
            "north_gate",
            PipelineOptions::default(),
        );
        let source = pipeline.run().unwrap_err();

        let err = AppError::Pipeline {
            path: PathBuf::from("/videos/north_gate.mp4"),
            source,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to process /videos/north_gate.mp4"), "{msg}");
        assert!(msg.contains("frame 2 of north_gate"), "{msg}");
        assert!(msg.contains("corrupt packet"), "{msg}");

        // the report keeps the whole message
        let report = eyre::Report::new(err);
        assert!(report.to_string().contains("corrupt packet"));
    }
}
