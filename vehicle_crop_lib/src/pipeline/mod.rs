pub mod background;
mod frame_pipeline;
pub mod post_crop;
pub mod storage;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use frame_pipeline::{FramePipeline, PipelineOptions, PipelineState, PipelineSummary};

use storage::SinkError;

/// Identifies a frame within a run: the 1-based position of the frame in its stream
/// (counting every frame read, retained or not) and the name of the stream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameId {
    pub frame_index: u64,
    pub stream_name: String,
}

impl FrameId {
    pub fn new(frame_index: u64, stream_name: impl Into<String>) -> Self {
        Self {
            frame_index,
            stream_name: stream_name.into(),
        }
    }

    /// `<frame_index>_<stream_name>`, the storage key of the frame.
    pub fn key(&self) -> String {
        format!("{}_{}", self.frame_index, self.stream_name)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {} of {}", self.frame_index, self.stream_name)
    }
}

/// An error that stopped a pipeline run. `frame_index` is the index the failing
/// frame has (or would have had) in its stream.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read frame {frame_index} of {stream_name}: {source}")]
    FrameSource {
        frame_index: u64,
        stream_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Failed to store frame {frame_index} of {stream_name}: {source}")]
    Sink {
        frame_index: u64,
        stream_name: String,
        #[source]
        source: SinkError,
    },
}

impl PipelineError {
    pub fn frame_index(&self) -> u64 {
        match self {
            Self::FrameSource { frame_index, .. } | Self::Sink { frame_index, .. } => *frame_index,
        }
    }
}
