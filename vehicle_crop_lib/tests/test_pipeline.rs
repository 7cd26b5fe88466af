use std::convert::Infallible;
use std::fs::File;

use image::{GrayImage, Luma, Rgb, RgbImage};
use itertools::Itertools;
use rand::prelude::*;
use vehicle_crop_lib::*;

const WIDTH: u32 = 96;
const HEIGHT: u32 = 64;

fn roi() -> BoundingShape {
    BoundingShape::new(40.0, 60.0, 24.0, 40.0).unwrap()
}

fn options(crop: Option<CropStrategy>) -> PipelineOptions {
    PipelineOptions {
        retention: RetentionRule {
            roi: roi(),
            ..RetentionRule::default()
        },
        crop,
    }
}

/// A grey road with a little sensor noise.
fn road(rng: &mut StdRng) -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |_x, _y| {
        let l = 60 + rng.gen_range(0..4);
        Rgb([l, l, l])
    })
}

/// A bright vehicle with its front edge at `x_front`, spanning the rows of the roi.
fn with_vehicle(mut frame: RgbImage, x_front: u32) -> RgbImage {
    let x_back = x_front.saturating_sub(30);
    for y in 20..44 {
        for x in x_back..x_front.min(WIDTH) {
            frame.put_pixel(x, y, Rgb([230, 210, 40]));
        }
    }
    frame
}

/// Ten empty frames, then a vehicle driving across the view, then empty road again.
fn drive_by(rng: &mut StdRng) -> Vec<RgbImage> {
    let mut frames = (0..10).map(|_| road(rng)).collect::<Vec<_>>();
    for x_front in (10..=WIDTH + 30).step_by(8) {
        let frame = road(rng);
        frames.push(with_vehicle(frame, x_front));
    }
    frames.extend((0..5).map(|_| road(rng)));
    frames
}

#[derive(Debug, thiserror::Error)]
#[error("decoder crashed")]
struct DecoderCrashed;

struct FailingSink {
    fail_after: usize,
    stored: usize,
}

impl StorageSink for FailingSink {
    fn store(&mut self, _frame: &RgbImage, _mask: &GrayImage, id: &FrameId) -> Result<(), SinkError> {
        if self.stored == self.fail_after {
            return Err(SinkError::Io {
                path: format!("/nowhere/{}", id.key()).into(),
                msg: "disk full".to_string(),
            });
        }
        self.stored += 1;
        Ok(())
    }
}

#[test]
fn test_only_frames_with_vehicle_in_roi_are_kept() {
    let mut rng = StdRng::seed_from_u64(1);
    let frames = drive_by(&mut rng);
    let num_frames = frames.len() as u64;

    let mut pipeline = FramePipeline::new(
        frames.into_iter().map(Ok::<_, Infallible>),
        RunningGaussianBackground::default(),
        VecSink::default(),
        "north_gate",
        options(None),
    );
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.frames_read, num_frames);
    assert_eq!(summary.retained + summary.dropped, num_frames);
    assert_eq!(summary.stored, summary.retained);
    assert!(summary.stored > 0);
    assert!(summary.dropped >= 15);

    // the stored frames are consecutive: the vehicle passes through the roi once.
    let indices = pipeline
        .sink()
        .ids()
        .into_iter()
        .map(|id| id.frame_index)
        .collect::<Vec<_>>();
    assert!(indices.iter().tuple_windows().all(|(a, b)| b - a == 1));
    assert!(indices.iter().all(|&i| i > 10));

    for (id, frame, mask) in pipeline.sink().items() {
        assert_eq!(id.stream_name, "north_gate");
        assert_eq!(frame.dimensions(), mask.dimensions());
        assert!(should_retain(mask, &roi(), DEFAULT_INTENSITY_THRESHOLD, DEFAULT_MAX_INTENSITY));
    }
}

#[test]
fn test_mask_centroid_crop_follows_vehicle() {
    let mut rng = StdRng::seed_from_u64(2);
    let frames = drive_by(&mut rng);

    let crop = CropStrategy::MaskCentroid {
        width: 32.0,
        height: 16.0,
        threshold: 0.0,
    };
    let mut pipeline = FramePipeline::new(
        frames.into_iter().map(Ok::<_, Infallible>),
        RunningGaussianBackground::default(),
        VecSink::default(),
        "north_gate",
        options(Some(crop)),
    );
    let summary = pipeline.run().unwrap();
    assert!(summary.stored > 0);
    assert_eq!(summary.skipped, 0);

    for (_id, frame, mask) in pipeline.sink().items() {
        assert!(frame.width() <= 32 && frame.height() <= 16);
        assert_eq!(frame.dimensions(), mask.dimensions());

        // the crop is centered on the vehicle, so it is mostly foreground
        let fg = mask.pixels().filter(|p| p.0[0] > 0).count();
        assert!(fg * 2 > mask.pixels().count());
    }
}

#[test]
fn test_frame_source_error_is_fatal() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut frames = (0..4)
        .map(|_| Ok(road(&mut rng)))
        .collect::<Vec<Result<RgbImage, DecoderCrashed>>>();
    frames.push(Err(DecoderCrashed));
    frames.push(Ok(road(&mut rng)));

    let mut pipeline = FramePipeline::new(
        frames,
        RunningGaussianBackground::default(),
        VecSink::default(),
        "cam",
        options(None),
    );

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PipelineError::FrameSource { frame_index: 5, .. }));
    assert_eq!(err.to_string(), "Failed to read frame 5 of cam: decoder crashed");
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(pipeline.summary().frames_read, 4);

    // failure is terminal: the last frame is never read.
    assert_eq!(pipeline.step(), PipelineState::Failed);
    assert_eq!(pipeline.summary().frames_read, 4);
}

#[test]
fn test_sink_error_is_fatal() {
    let all_foreground = |frame: &RgbImage| GrayImage::from_pixel(frame.width(), frame.height(), Luma([255]));
    let frames = (0..6).map(|_| Ok::<_, Infallible>(RgbImage::new(WIDTH, HEIGHT)));

    let mut pipeline = FramePipeline::new(
        frames,
        all_foreground,
        FailingSink {
            fail_after: 2,
            stored: 0,
        },
        "cam",
        options(None),
    );

    let err = pipeline.run().unwrap_err();
    assert_eq!(err.frame_index(), 3);
    assert!(matches!(err, PipelineError::Sink { .. }));
    assert!(err.to_string().contains("frame 3 of cam"));
    assert!(err.to_string().ends_with("disk full"));
    assert_eq!(pipeline.summary().stored, 2);
}

#[test]
fn test_directory_sink_keys() {
    let mut rng = StdRng::seed_from_u64(4);
    let frames = drive_by(&mut rng);
    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path(), SinkFormat::Json).unwrap();

    let mut pipeline = FramePipeline::new(
        frames.into_iter().map(Ok::<_, Infallible>),
        RunningGaussianBackground::default(),
        sink,
        "north_gate",
        options(None),
    );
    let summary = pipeline.run().unwrap();

    let mut frame_files = std::fs::read_dir(dir.path().join("frame"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    frame_files.sort();
    assert_eq!(frame_files.len() as u64, summary.stored);
    assert!(frame_files.iter().all(|f| f.ends_with("_north_gate.json")));

    let first = &frame_files[0];
    let mask_rows: Vec<Vec<u8>> =
        serde_json::from_reader(File::open(dir.path().join("mask").join(first)).unwrap()).unwrap();
    assert_eq!(mask_rows.len(), HEIGHT as usize);
    assert!(mask_rows.iter().all(|row| row.len() == WIDTH as usize));
}

#[test]
fn test_keypoint_crop_strategy_in_pipeline() {
    let mut rng = StdRng::seed_from_u64(5);
    let frames = drive_by(&mut rng);

    let mut pipeline = FramePipeline::new(
        frames.into_iter().map(Ok::<_, Infallible>),
        RunningGaussianBackground::default(),
        VecSink::default(),
        "north_gate",
        options(Some(CropStrategy::keypoint_cluster())),
    );
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.stored + summary.skipped, summary.retained);
    for (_id, frame, mask) in pipeline.sink().items() {
        assert_eq!(frame.dimensions(), mask.dimensions());
        assert!(frame.width() < WIDTH && frame.height() < HEIGHT);
    }
}
