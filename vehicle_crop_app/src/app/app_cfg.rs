use std::path::PathBuf;
use std::sync::Arc;

use vehicle_crop_lib::{
    CropStrategy, DecodeOptions, FastKeypointDetector, KeypointCropOptions, PipelineOptions,
    RetentionRule, SinkFormat,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportVerbosity {
    Quiet,
    Default,
    Verbose,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) enum CropArg {
    None,
    MaskCentroid,
    Keypoints,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) enum OutputFormatArg {
    Json,
    Png,
}

impl From<OutputFormatArg> for SinkFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => SinkFormat::Json,
            OutputFormatArg::Png => SinkFormat::Png,
        }
    }
}

// What happens to a retained frame before it is stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropCfg {
    NoCrop,
    MaskCentroid {
        width: f64,
        height: f64,
        threshold: f64,
    },
    Keypoints(KeypointCropOptions),
}

impl CropCfg {
    pub fn strategy(&self) -> Option<CropStrategy> {
        match *self {
            Self::NoCrop => None,
            Self::MaskCentroid {
                width,
                height,
                threshold,
            } => Some(CropStrategy::MaskCentroid {
                width,
                height,
                threshold,
            }),
            Self::Keypoints(opts) => Some(CropStrategy::KeypointCluster {
                fraction: opts.fraction,
                detector: Arc::new(FastKeypointDetector::new(opts.fast_threshold)),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideosCfg {
    pub video_paths: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub format: SinkFormat,
    pub decode: DecodeOptions,
    pub retention: RetentionRule,
    pub crop: CropCfg,
    pub summary_json: bool,
}

impl VideosCfg {
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            retention: self.retention,
            crop: self.crop.strategy(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StillCfg {
    pub image_path: PathBuf,
    pub output_path: PathBuf,
    pub keypoints: KeypointCropOptions,
}

#[derive(Debug, Clone)]
pub enum RunMode {
    Videos(VideosCfg),
    Still(StillCfg),
}

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub mode: RunMode,
    pub verbosity: ReportVerbosity,
}
