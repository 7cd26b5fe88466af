use std::{
    error::Error,
    path::{Path, PathBuf},
};

use cfg_if::cfg_if;
use itertools::Itertools;
#[cfg(feature = "parallel_loading")]
use rayon::prelude::*;
use serde::Serialize;
use vehicle_crop_lib::*;

use crate::app::*;

// * read cfg
// * check inputs and outputs
// * run one pipeline per video (or crop the still image)
// * report

pub fn run_app() -> i32 {
    let cfg = arg_parse::parse_args();
    configure_logs(cfg.verbosity);

    let ret = match run_app_inner(&cfg) {
        Ok(()) => 0,
        Err(fatal_error) => {
            print_fatal_err(fatal_error, cfg.verbosity);
            1
        }
    };

    ret
}

fn run_app_inner(cfg: &AppCfg) -> eyre::Result<()> {
    match &cfg.mode {
        RunMode::Videos(videos_cfg) => run_videos(videos_cfg, cfg.verbosity),
        RunMode::Still(still_cfg) => run_still(still_cfg),
    }
}

#[derive(Debug, Serialize)]
struct VideoReport {
    path: PathBuf,
    stream_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<PipelineSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_videos(cfg: &VideosCfg, verbosity: ReportVerbosity) -> eyre::Result<()> {
    if !ffmpeg_and_ffprobe_are_callable() {
        return Err(AppError::FfmpegNotFound.into());
    }

    // Check that all videos exist
    let non_exist_videos = cfg.video_paths.iter().filter(|p| !p.is_file());
    match non_exist_videos.collect::<Vec<_>>().as_slice() {
        [] => (),
        missing => {
            return Err(eyre::Report::msg(format!(
                "videos not found: {}",
                missing.iter().map(|p| p.to_string_lossy()).join(", ")
            )));
        }
    }

    // Frames are stored by stream name, so two videos with the same name would overwrite each other.
    let shared_names = cfg
        .video_paths
        .iter()
        .map(stream_name_of)
        .duplicates()
        .collect::<Vec<_>>();
    if !shared_names.is_empty() {
        return Err(eyre::Report::msg(format!(
            "multiple videos would be stored under the same name: {}",
            shared_names.join(", ")
        )));
    }

    let sink = DirectorySink::new(&cfg.output_dir, cfg.format).map_err(AppError::from)?;
    info!(
        "Writing retained frames to {} as {}",
        sink.root().display(),
        sink.format()
    );

    let process = |path: &PathBuf| -> VideoReport {
        let stream_name = stream_name_of(path);
        match process_video(path, &stream_name, cfg, sink.clone()) {
            Ok(summary) => VideoReport {
                path: path.clone(),
                stream_name,
                summary: Some(summary),
                error: None,
            },
            Err(e) => {
                let error = e.to_string();
                print_fatal_err(e.into(), verbosity);
                VideoReport {
                    path: path.clone(),
                    stream_name,
                    summary: None,
                    error: Some(error),
                }
            }
        }
    };

    cfg_if! {
        if #[cfg(feature = "parallel_loading")] {
            let reports = cfg.video_paths.par_iter().map(process).collect::<Vec<_>>();
        } else {
            let reports = cfg.video_paths.iter().map(process).collect::<Vec<_>>();
        }
    }

    if cfg.summary_json {
        print_summary_json(&reports)?;
    }

    let total = reports.len();
    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    let stored: u64 = reports
        .iter()
        .filter_map(|r| r.summary.as_ref())
        .map(|s| s.stored)
        .sum();
    info!("Stored {stored} frames from {} videos", total - failed);

    if failed > 0 {
        return Err(AppError::VideosFailed { failed, total }.into());
    }

    Ok(())
}

fn process_video(
    path: &Path,
    stream_name: &str,
    cfg: &VideosCfg,
    sink: DirectorySink,
) -> Result<PipelineSummary, AppError> {
    let (frames, info) = video_frames(path, &cfg.decode).map_err(|source| AppError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let (width, height) = info.resolution();
    info!(
        target: "pipeline",
        "{stream_name}: {width}x{height}, {:.1}s",
        info.duration().as_secs_f64()
    );

    // The region of interest is in pixels of the deployed camera, so warn when it misses the video.
    if cfg.retention.roi.pixel_window((width, height)).is_none() {
        warn!(
            target: "frame_retention",
            "{stream_name}: region of interest lies outside of the {width}x{height} frame. No frames will be retained"
        );
    }

    let mut pipeline = FramePipeline::new(
        frames,
        RunningGaussianBackground::default(),
        sink,
        stream_name,
        cfg.pipeline_options(),
    );

    pipeline.run().map_err(|source| AppError::Pipeline {
        path: path.to_path_buf(),
        source,
    })
}

fn run_still(cfg: &StillCfg) -> eyre::Result<()> {
    let image = image::open(&cfg.image_path).map_err(|source| AppError::LoadImage {
        path: cfg.image_path.clone(),
        source,
    })?;

    let cropper = KeypointCropper::from_options(cfg.keypoints);
    let cropped = cropper.crop(&image).map_err(|source| AppError::Crop {
        path: cfg.image_path.clone(),
        source,
    })?;

    cropped
        .save(&cfg.output_path)
        .map_err(|source| AppError::SaveImage {
            path: cfg.output_path.clone(),
            source,
        })?;

    info!(
        "Cropped {} to {}x{} and saved it to {}",
        cfg.image_path.display(),
        cropped.width(),
        cropped.height(),
        cfg.output_path.display()
    );

    Ok(())
}

fn print_summary_json(reports: &[VideoReport]) -> eyre::Result<()> {
    let json = serde_json::to_string_pretty(reports)?;

    #[allow(clippy::print_stdout)]
    let () = println!("{json}");

    Ok(())
}

fn print_fatal_err(fatal_err: eyre::Report, verbosity: ReportVerbosity) {
    error!(target: "app-errorlog", "{}", fatal_err);

    if verbosity == ReportVerbosity::Verbose {
        let mut source: Option<&(dyn Error + 'static)> = fatal_err.source();
        while let Some(e) = source {
            error!(target: "app-errorlog", "    caused by: {}", e);
            source = e.source();
        }
    }
}

pub fn configure_logs(verbosity: ReportVerbosity) {
    use simplelog::*;

    let mut cfg = simplelog::ConfigBuilder::new();
    cfg.add_filter_ignore_str("storage");

    let min_loglevel = match verbosity {
        ReportVerbosity::Quiet => LevelFilter::Warn,
        ReportVerbosity::Default => LevelFilter::Info,
        ReportVerbosity::Verbose => LevelFilter::Trace,
    };

    // Only fails if a logger was already set, in which case there is nothing to do.
    let _ = TermLogger::init(
        min_loglevel,
        cfg.build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}
