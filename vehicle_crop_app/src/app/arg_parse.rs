use std::path::{Path, PathBuf};

use clap::{value_parser, ArgAction::*};
use vehicle_crop_lib::*;

use crate::app::*;

// inputs and outputs
const VIDEO_PATHS: &str = "Video files to process";
const STILL_IMAGE: &str = "Still image to crop";
const OUTPUT: &str = "Output location";
const OUTPUT_FORMAT: &str = "Output format";
const SUMMARY_JSON: &str = "Print summary as json";

// frame retention
const ROI: &str = "Region of interest";
const INTENSITY_THRESHOLD: &str = "Intensity threshold";
const MAX_INTENSITY: &str = "Max intensity";

// cropping
const CROP: &str = "Crop strategy";
const CROP_WIDTH: &str = "Crop width";
const CROP_HEIGHT: &str = "Crop height";
const CENTROID_THRESHOLD: &str = "Centroid threshold";
const FRACTION: &str = "Keypoint fraction";
const FAST_THRESHOLD: &str = "FAST threshold";

// decoding
const FPS: &str = "Frame rate";
const START_OFFSET: &str = "Start offset";
const MAX_FRAMES: &str = "Max frames";

// Arg specification
const ARGS_FILE: &str = "Args file";

//Verbosity
const VERBOSITY_QUIET: &str = "Quiet";
const VERBOSITY_VERBOSE: &str = "Verbose";

const DISPLAY_ORDERING: [&str; 20] = [
    //
    // inputs and outputs
    VIDEO_PATHS,
    STILL_IMAGE,
    OUTPUT,
    OUTPUT_FORMAT,
    SUMMARY_JSON,
    //
    // retention
    ROI,
    INTENSITY_THRESHOLD,
    MAX_INTENSITY,
    //
    // cropping
    CROP,
    CROP_WIDTH,
    CROP_HEIGHT,
    CENTROID_THRESHOLD,
    FRACTION,
    FAST_THRESHOLD,
    //
    // decoding
    FPS,
    START_OFFSET,
    MAX_FRAMES,
    //
    //verbosity
    VERBOSITY_QUIET,
    VERBOSITY_VERBOSE,
    //argument replacement
    ARGS_FILE,
];

fn build_app() -> clap::Command {
    let get_ordering = |arg_name: &str| -> usize {
        match DISPLAY_ORDERING.iter().position(|x| *x == arg_name) {
            Some(idx) => idx,
            None => {
                panic!("argument not assigned a display order: {arg_name:?}");
            }
        }
    };

    //args are not added through method chaining because rustfmt struggles with very long expressions.
    let mut clap_app = clap::Command::new("Vehicle crop")
        .version(clap::crate_version!())
        .about("Keep the video frames that show a passing vehicle, cropped to the vehicle");

    clap_app = clap_app.arg(
        clap::Arg::new(VIDEO_PATHS)
            .long("videos")
            .required_unless_present_any([STILL_IMAGE, ARGS_FILE])
            .conflicts_with(STILL_IMAGE)
            .num_args(1..)
            .value_parser(value_parser!(PathBuf))
            .action(Append)
            .help("Video files to process. Each video is run through its own pipeline, and its frames are stored under the file name of the video without its extension.")
            .display_order(get_ordering(VIDEO_PATHS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(STILL_IMAGE)
            .long("still")
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .help("Crop a single image to its densest cluster of keypoints instead of processing videos")
            .display_order(get_ordering(STILL_IMAGE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(OUTPUT)
            .long("output")
            .required_unless_present(ARGS_FILE)
            .num_args(1)
            .value_parser(value_parser!(PathBuf))
            .help("With --videos: the directory that retained frames and masks are written to (in the subdirectories 'frame' and 'mask'). With --still: the file the cropped image is written to")
            .display_order(get_ordering(OUTPUT)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(OUTPUT_FORMAT)
            .long("format")
            .help("How retained frames and masks are written: nested JSON arrays or PNG images")
            .value_parser(value_parser!(OutputFormatArg))
            .default_value("json")
            .num_args(1)
            .display_order(get_ordering(OUTPUT_FORMAT)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(SUMMARY_JSON)
            .long("summary-json")
            .help("Print the frame counts of each video to stdout as JSON")
            .conflicts_with(STILL_IMAGE)
            .action(SetTrue)
            .display_order(get_ordering(SUMMARY_JSON)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(ROI)
            .long("roi")
            .help(format!(
                "Region of interest where vehicles pass, in pixels. Must be given as 'x_min,x_max,y_min,y_max'. Defaults to {},{},{},{}",
                DEFAULT_ROI.x_min, DEFAULT_ROI.x_max, DEFAULT_ROI.y_min, DEFAULT_ROI.y_max
            ))
            .value_parser(value_parser!(f64))
            .value_delimiter(',')
            .allow_negative_numbers(true)
            .display_order(get_ordering(ROI)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(INTENSITY_THRESHOLD)
            .long("intensity-threshold")
            .help("A frame is kept when the mean of its foreground mask inside the region of interest exceeds this fraction of --max-intensity")
            .value_parser(value_parser!(f64))
            .default_value(DEFAULT_INTENSITY_THRESHOLD.to_string())
            .num_args(1)
            .display_order(get_ordering(INTENSITY_THRESHOLD)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MAX_INTENSITY)
            .long("max-intensity")
            .help("The value of a fully foreground mask pixel")
            .value_parser(value_parser!(f64))
            .default_value(DEFAULT_MAX_INTENSITY.to_string())
            .num_args(1)
            .display_order(get_ordering(MAX_INTENSITY)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(CROP)
            .long("crop")
            .help("How retained frames are cropped before they are stored: not at all, to a fixed size window around the center of the foreground mask, or to the densest cluster of keypoints")
            .value_parser(value_parser!(CropArg))
            .default_value("none")
            .num_args(1)
            .display_order(get_ordering(CROP)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(CROP_WIDTH)
            .long("crop-width")
            .help("Width in pixels of the mask-centroid crop window")
            .value_parser(value_parser!(f64))
            .default_value(DEFAULT_CROP_WIDTH.to_string())
            .num_args(1)
            .display_order(get_ordering(CROP_WIDTH)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(CROP_HEIGHT)
            .long("crop-height")
            .help("Height in pixels of the mask-centroid crop window")
            .value_parser(value_parser!(f64))
            .default_value(DEFAULT_CROP_HEIGHT.to_string())
            .num_args(1)
            .display_order(get_ordering(CROP_HEIGHT)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(CENTROID_THRESHOLD)
            .long("centroid-threshold")
            .help("When above 0, mask pixels brighter than this count equally towards the center of the foreground and all others are ignored. At 0, every pixel is weighted by its intensity")
            .value_parser(value_parser!(f64))
            .default_value(DEFAULT_CENTROID_THRESHOLD.to_string())
            .num_args(1)
            .display_order(get_ordering(CENTROID_THRESHOLD)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(FRACTION)
            .long("fraction")
            .help("Fraction of the detected keypoints kept in the densest cluster. Suggested values are in the range 0.3 to 0.9")
            .value_parser(value_parser!(f64))
            .default_value(DEFAULT_CLUSTER_FRACTION.to_string())
            .num_args(1)
            .display_order(get_ordering(FRACTION)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(FAST_THRESHOLD)
            .long("fast-threshold")
            .help("Corner detection threshold. Higher values find fewer, stronger keypoints")
            .value_parser(value_parser!(u8))
            .default_value(DEFAULT_FAST_THRESHOLD.to_string())
            .num_args(1)
            .display_order(get_ordering(FAST_THRESHOLD)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(FPS)
            .long("fps")
            .help("Subsample videos to this frame rate before processing (e.g. '5' or '1/2'). By default every frame is processed")
            .value_parser(value_parser!(String))
            .num_args(1)
            .display_order(get_ordering(FPS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(START_OFFSET)
            .long("start-offset")
            .help("Skip forward by a given number of seconds before processing each video")
            .value_parser(value_parser!(f64))
            .num_args(1)
            .display_order(get_ordering(START_OFFSET)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(MAX_FRAMES)
            .long("max-frames")
            .help("Stop processing each video after this many frames")
            .value_parser(value_parser!(u32))
            .num_args(1)
            .display_order(get_ordering(MAX_FRAMES)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(ARGS_FILE)
            .long("args-file")
            .value_parser(value_parser!(PathBuf))
            .num_args(1)
            .help("Read command line arguments from a file. If this argument is used it must be the only argument. Lines starting with '#' are ignored")
            .display_order(get_ordering(ARGS_FILE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_QUIET)
            .long("quiet")
            .help("Reduced verbosity")
            .conflicts_with(VERBOSITY_VERBOSE)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_QUIET)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_VERBOSE)
            .long("verbose")
            .help("Increased verbosity")
            .conflicts_with(VERBOSITY_QUIET)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_VERBOSE)),
    );

    clap_app
}

pub fn parse_args() -> AppCfg {
    //capture the cwd once, to minimize the risk of working with two values if it is changed by the OS at runtime.
    let cwd = std::env::current_dir()
        .map_err(|e| eyre::Report::new(e).wrap_err("failed to extract cwd"))
        .unwrap_or_else(|e| print_error_and_quit(e));

    //Start by parsing the provided arguments from the commandline. If the --args-file
    //argument is provided, then we will ignore the true command line arguments and
    //take the arguments from the file instead.
    let args = get_args_from_cmdline_or_file();

    app_cfg_from_matches(&args, &cwd).unwrap_or_else(|e| print_error_and_quit(e))
}

fn app_cfg_from_matches(args: &clap::ArgMatches, cwd: &Path) -> eyre::Result<AppCfg> {
    let verbosity = if args.get_flag(VERBOSITY_QUIET) {
        ReportVerbosity::Quiet
    } else if args.get_flag(VERBOSITY_VERBOSE) {
        ReportVerbosity::Verbose
    } else {
        ReportVerbosity::Default
    };

    let Some(output) = args.get_one::<PathBuf>(OUTPUT) else {
        return Err(eyre::Report::msg("--output is required"));
    };
    let output = absolutify_path(cwd, output);

    let fraction = args
        .get_one::<f64>(FRACTION)
        .copied()
        .unwrap_or(DEFAULT_CLUSTER_FRACTION);
    if !(fraction.is_finite() && fraction > 0.0) {
        return Err(eyre::Report::msg(format!(
            "--fraction must be a number greater than 0, got {fraction}"
        )));
    }

    let keypoints = KeypointCropOptions {
        fraction,
        fast_threshold: args
            .get_one::<u8>(FAST_THRESHOLD)
            .copied()
            .unwrap_or(DEFAULT_FAST_THRESHOLD),
    };

    if let Some(image_path) = args.get_one::<PathBuf>(STILL_IMAGE) {
        let mode = RunMode::Still(StillCfg {
            image_path: absolutify_path(cwd, image_path),
            output_path: output,
            keypoints,
        });
        return Ok(AppCfg { mode, verbosity });
    }

    let video_paths = match args.get_many::<PathBuf>(VIDEO_PATHS) {
        Some(paths) => paths.map(|p| absolutify_path(cwd, p)).collect::<Vec<_>>(),
        None => vec![],
    };
    if video_paths.is_empty() {
        return Err(eyre::Report::msg("either --videos or --still is required"));
    }

    let retention = RetentionRule {
        roi: parse_roi(args)?,
        intensity_threshold: args
            .get_one::<f64>(INTENSITY_THRESHOLD)
            .copied()
            .unwrap_or(DEFAULT_INTENSITY_THRESHOLD),
        max_intensity: args
            .get_one::<f64>(MAX_INTENSITY)
            .copied()
            .unwrap_or(DEFAULT_MAX_INTENSITY),
    };

    let crop = match args.get_one::<CropArg>(CROP) {
        None | Some(CropArg::None) => CropCfg::NoCrop,
        Some(CropArg::MaskCentroid) => CropCfg::MaskCentroid {
            width: args
                .get_one::<f64>(CROP_WIDTH)
                .copied()
                .unwrap_or(DEFAULT_CROP_WIDTH),
            height: args
                .get_one::<f64>(CROP_HEIGHT)
                .copied()
                .unwrap_or(DEFAULT_CROP_HEIGHT),
            threshold: args
                .get_one::<f64>(CENTROID_THRESHOLD)
                .copied()
                .unwrap_or(DEFAULT_CENTROID_THRESHOLD),
        },
        Some(CropArg::Keypoints) => CropCfg::Keypoints(keypoints),
    };

    let start_offset = args.get_one::<f64>(START_OFFSET).copied();
    if let Some(offset) = start_offset.filter(|o| !(o.is_finite() && *o >= 0.0)) {
        return Err(eyre::Report::msg(format!(
            "--start-offset must not be negative, got {offset}"
        )));
    }

    let decode = DecodeOptions {
        fps: args.get_one::<String>(FPS).cloned(),
        start_offset,
        max_frames: args.get_one::<u32>(MAX_FRAMES).copied(),
    };

    let format = args
        .get_one::<OutputFormatArg>(OUTPUT_FORMAT)
        .copied()
        .map(SinkFormat::from)
        .unwrap_or_default();

    let mode = RunMode::Videos(VideosCfg {
        video_paths,
        output_dir: output,
        format,
        decode,
        retention,
        crop,
        summary_json: args.get_flag(SUMMARY_JSON),
    });

    Ok(AppCfg { mode, verbosity })
}

fn parse_roi(args: &clap::ArgMatches) -> eyre::Result<BoundingShape> {
    let values = match args.get_many::<f64>(ROI) {
        Some(values) => values.copied().collect::<Vec<_>>(),
        None => return Ok(DEFAULT_ROI),
    };

    match values.as_slice() {
        &[x_min, x_max, y_min, y_max] => BoundingShape::new(x_min, x_max, y_min, y_max)
            .map_err(|e| eyre::Report::new(e).wrap_err("Invalid --roi")),
        other => Err(eyre::Report::msg(format!(
            "--roi takes 4 comma separated values (x_min,x_max,y_min,y_max), got {}",
            other.len()
        ))),
    }
}

// Arguments are always first read from the command line, but if --args-file
// is present, then arguments are actually located in a file on disk.
// This fn obtains the args from the correct location.
fn get_args_from_cmdline_or_file() -> clap::ArgMatches {
    let cmdline_args = build_app().get_matches();

    match cmdline_args.get_one::<PathBuf>(ARGS_FILE) {
        None => cmdline_args,
        Some(args_path) => get_argsfile_args(args_path),
    }
}

fn get_argsfile_args(argsfile_path: &Path) -> clap::ArgMatches {
    let argsfile_text = std::fs::read_to_string(argsfile_path).map_err(eyre::Report::msg);

    //the arguments file needs to be split into args in the same way as the shell would do it.
    //call out to an external crate for this.
    let args = argsfile_text
        .and_then(|text| shell_words::split(&strip_comments(&text)).map_err(eyre::Report::msg));

    let args = args
        .map_err(|e| {
            e.wrap_err(format!(
                "Failed to parse args file at location {}",
                argsfile_path.to_string_lossy()
            ))
        })
        .unwrap_or_else(|e| print_error_and_quit(e));

    //When parsing args from file, the binary name will not be present,
    // so update the parser that we use to not expect it.
    let matches = build_app().no_binary_name(true).get_matches_from(args);
    matches
}

// Drop every line whose first non-blank character is '#'.
fn strip_comments(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

fn absolutify_path(cwd: &Path, path: &Path) -> PathBuf {
    //get the absolute path if it is not absolute, by prepending the cwd.
    let path = if path.is_relative() {
        cwd.join(path)
    } else {
        path.to_path_buf()
    };

    //now try canonicalizing the path. If that fails then silently ignore the failure and carry on
    //(the output path usually does not exist yet).
    let p = path.canonicalize().unwrap_or(path);

    p
}
