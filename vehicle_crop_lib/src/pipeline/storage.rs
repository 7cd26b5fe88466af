use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use image::{GrayImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::FrameId;

/// Failure to persist a retained frame. Always fatal to a pipeline run.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum SinkError {
    #[error("Failed to write {}: {msg}", .path.display())]
    Io { path: PathBuf, msg: String },

    #[error("Failed to encode {}: {msg}", .path.display())]
    Encode { path: PathBuf, msg: String },
}

/// Destination for retained (frame, mask) pairs.
pub trait StorageSink {
    fn store(&mut self, frame: &RgbImage, mask: &GrayImage, id: &FrameId) -> Result<(), SinkError>;
}

impl<K: StorageSink + ?Sized> StorageSink for &mut K {
    fn store(&mut self, frame: &RgbImage, mask: &GrayImage, id: &FrameId) -> Result<(), SinkError> {
        (**self).store(frame, mask, id)
    }
}

/// Keeps every stored pair in memory, in the order they were stored.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    items: Vec<(FrameId, RgbImage, GrayImage)>,
}

impl VecSink {
    pub fn items(&self) -> &[(FrameId, RgbImage, GrayImage)] {
        &self.items
    }

    pub fn ids(&self) -> Vec<&FrameId> {
        self.items.iter().map(|(id, _, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<(FrameId, RgbImage, GrayImage)> {
        self.items
    }
}

impl StorageSink for VecSink {
    fn store(&mut self, frame: &RgbImage, mask: &GrayImage, id: &FrameId) -> Result<(), SinkError> {
        self.items.push((id.clone(), frame.clone(), mask.clone()));
        Ok(())
    }
}

/// Encoding of the files written by [`DirectorySink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SinkFormat {
    /// Nested arrays: one array per row, one entry per pixel (an `[r, g, b]` triple
    /// for frames, a single value for masks).
    #[default]
    Json,
    /// Lossless PNG images.
    Png,
}

impl SinkFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Png => "png",
        }
    }
}

impl FromStr for SinkFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "png" => Ok(Self::Png),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

impl fmt::Display for SinkFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Writes each retained pair to `<root>/frame/<key>.<ext>` and `<root>/mask/<key>.<ext>`,
/// where the key is `<frame_index>_<stream_name>`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
    format: SinkFormat,
}

impl DirectorySink {
    pub const FRAME_DIR: &'static str = "frame";
    pub const MASK_DIR: &'static str = "mask";

    /// Create the `frame` and `mask` directories under `root` if they do not exist yet.
    pub fn new(root: impl AsRef<Path>, format: SinkFormat) -> Result<Self, SinkError> {
        let root = root.as_ref().to_path_buf();
        for dir in [Self::FRAME_DIR, Self::MASK_DIR] {
            let path = root.join(dir);
            std::fs::create_dir_all(&path).map_err(|e| SinkError::Io {
                path,
                msg: e.to_string(),
            })?;
        }
        Ok(Self { root, format })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> SinkFormat {
        self.format
    }

    pub fn frame_path(&self, id: &FrameId) -> PathBuf {
        self.item_path(Self::FRAME_DIR, id)
    }

    pub fn mask_path(&self, id: &FrameId) -> PathBuf {
        self.item_path(Self::MASK_DIR, id)
    }

    fn item_path(&self, dir: &str, id: &FrameId) -> PathBuf {
        self.root
            .join(dir)
            .join(format!("{}.{}", id.key(), self.format.extension()))
    }
}

impl StorageSink for DirectorySink {
    fn store(&mut self, frame: &RgbImage, mask: &GrayImage, id: &FrameId) -> Result<(), SinkError> {
        let frame_path = self.frame_path(id);
        let mask_path = self.mask_path(id);

        match self.format {
            SinkFormat::Json => {
                let frame_rows = frame
                    .rows()
                    .map(|row| row.map(|p| p.0).collect::<Vec<_>>())
                    .collect::<Vec<_>>();
                write_json(&frame_path, &frame_rows)?;

                let mask_rows = mask
                    .rows()
                    .map(|row| row.map(|p| p.0[0]).collect::<Vec<_>>())
                    .collect::<Vec<_>>();
                write_json(&mask_path, &mask_rows)?;
            }
            SinkFormat::Png => {
                write_png(&frame_path, |p| frame.save_with_format(p, ImageFormat::Png))?;
                write_png(&mask_path, |p| mask.save_with_format(p, ImageFormat::Png))?;
            }
        }

        log::trace!(target: "storage", "stored {}", id.key());
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SinkError> {
    let io_err = |e: std::io::Error| SinkError::Io {
        path: path.to_path_buf(),
        msg: e.to_string(),
    };

    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    serde_json::to_writer(&mut writer, value).map_err(|e| SinkError::Encode {
        path: path.to_path_buf(),
        msg: e.to_string(),
    })?;
    writer.flush().map_err(io_err)
}

fn write_png<F>(path: &Path, save: F) -> Result<(), SinkError>
where
    F: FnOnce(&Path) -> image::ImageResult<()>,
{
    save(path).map_err(|e| match e {
        image::ImageError::IoError(e) => SinkError::Io {
            path: path.to_path_buf(),
            msg: e.to_string(),
        },
        e => SinkError::Encode {
            path: path.to_path_buf(),
            msg: e.to_string(),
        },
    })
}
