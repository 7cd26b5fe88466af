use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use vehicle_crop_common::RetentionRule;

use super::{
    background::BackgroundModel, post_crop::CropStrategy, storage::StorageSink, FrameId,
    PipelineError,
};

/// Options for how frames are filtered and cropped during a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Which frames are kept. Uses the same fixed ROI for every frame of the run.
    pub retention: RetentionRule,

    /// Applied to retained frames only. `None` stores whole frames and masks.
    pub crop: Option<CropStrategy>,
}

/// Where a pipeline is in its processing of the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    /// Waiting for the next frame from the frame source.
    Reading,
    /// The current frame passed the retention check and is about to be stored.
    Retained,
    /// The current frame failed the retention check.
    Dropped,
    /// The frame source ran out of frames.
    Finished,
    /// A frame could not be read or stored. No further frames are processed.
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Frame counts of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub frames_read: u64,
    pub retained: u64,
    pub stored: u64,
    pub dropped: u64,
    /// Retained frames that were not stored because they could not be cropped.
    pub skipped: u64,
}

struct RetainedFrame {
    frame: RgbImage,
    mask: GrayImage,
    id: FrameId,
}

/// Reads frames from a source, keeps the ones with enough foreground inside the
/// region of interest, optionally crops them, and hands them to a storage sink.
///
/// Each pipeline processes a single stream sequentially. Run several pipelines to
/// process several streams.
pub struct FramePipeline<I, B, K> {
    frames: I,
    background: B,
    sink: K,
    options: PipelineOptions,
    stream_name: String,
    state: PipelineState,
    summary: PipelineSummary,
    current: Option<RetainedFrame>,
    failure: Option<PipelineError>,
}

impl<I, E, B, K> FramePipeline<I, B, K>
where
    I: Iterator<Item = Result<RgbImage, E>>,
    E: std::error::Error + Send + Sync + 'static,
    B: BackgroundModel,
    K: StorageSink,
{
    pub fn new(
        frames: impl IntoIterator<IntoIter = I>,
        background: B,
        sink: K,
        stream_name: impl Into<String>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            frames: frames.into_iter(),
            background,
            sink,
            options,
            stream_name: stream_name.into(),
            state: PipelineState::Reading,
            summary: PipelineSummary::default(),
            current: None,
            failure: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn summary(&self) -> PipelineSummary {
        self.summary
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Perform one state transition and return the new state. Terminal states are sticky.
    pub fn step(&mut self) -> PipelineState {
        self.state = match self.state {
            PipelineState::Reading => self.read_next(),
            PipelineState::Retained => self.store_current(),
            PipelineState::Dropped => PipelineState::Reading,
            terminal @ (PipelineState::Finished | PipelineState::Failed) => terminal,
        };
        self.state
    }

    /// Process frames until the frame source is exhausted or a fatal error occurs.
    pub fn run(&mut self) -> Result<PipelineSummary, PipelineError> {
        while !self.step().is_terminal() {}

        match self.failure.take() {
            Some(e) => Err(e),
            None => {
                log::info!(
                    target: "pipeline",
                    "{}: read {} frames, stored {}, dropped {}, skipped {}",
                    self.stream_name,
                    self.summary.frames_read,
                    self.summary.stored,
                    self.summary.dropped,
                    self.summary.skipped
                );
                Ok(self.summary)
            }
        }
    }

    fn read_next(&mut self) -> PipelineState {
        let frame_index = self.summary.frames_read + 1;
        let frame = match self.frames.next() {
            None => return PipelineState::Finished,
            Some(Err(e)) => {
                self.failure = Some(PipelineError::FrameSource {
                    frame_index,
                    stream_name: self.stream_name.clone(),
                    source: Box::new(e),
                });
                return PipelineState::Failed;
            }
            Some(Ok(frame)) => frame,
        };
        self.summary.frames_read = frame_index;

        let mask = self.background.apply(&frame);

        if !self.options.retention.should_retain(&mask) {
            log::trace!(target: "frame_retention", "{}: dropped frame {frame_index}", self.stream_name);
            self.summary.dropped += 1;
            return PipelineState::Dropped;
        }

        log::debug!(target: "frame_retention", "{}: retained frame {frame_index}", self.stream_name);
        self.summary.retained += 1;
        self.current = Some(RetainedFrame {
            frame,
            mask,
            id: FrameId::new(frame_index, self.stream_name.as_str()),
        });
        PipelineState::Retained
    }

    fn store_current(&mut self) -> PipelineState {
        let Some(RetainedFrame { frame, mask, id }) = self.current.take() else {
            return PipelineState::Reading;
        };

        let (frame, mask) = match &self.options.crop {
            None => (frame, mask),
            Some(strategy) => match strategy.apply(&frame, &mask) {
                Ok(cropped) => cropped,
                Err(e) => {
                    log::warn!(target: "pipeline", "skipping {id}: {e}");
                    self.summary.skipped += 1;
                    return PipelineState::Reading;
                }
            },
        };

        if let Err(e) = self.sink.store(&frame, &mask, &id) {
            self.failure = Some(PipelineError::Sink {
                frame_index: id.frame_index,
                stream_name: id.stream_name,
                source: e,
            });
            return PipelineState::Failed;
        }

        self.summary.stored += 1;
        PipelineState::Reading
    }
}
